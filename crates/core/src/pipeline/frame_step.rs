//! Per-frame work shared by all executors.

use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::detection::Detection;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::statistics::detection_stats::DetectionStats;

use super::pipeline_logger::PipelineLogger;

/// Filters by confidence, counts what survives, and draws it onto a copy of
/// `frame`. The returned frame is guaranteed to match the stream size.
pub(crate) fn aggregate_and_annotate(
    frame: &Frame,
    detections: Vec<Detection>,
    min_confidence: f64,
    stats: &mut DetectionStats,
    annotator: &dyn FrameAnnotator,
    metadata: &VideoMetadata,
    logger: &mut dyn PipelineLogger,
) -> Result<Frame, PipelineError> {
    let kept = Detection::retain_confident(detections, min_confidence);
    stats.record(&kept);
    logger.metric("detections", kept.len() as f64);

    let t0 = Instant::now();
    let annotated = annotator
        .annotate(frame, &kept)
        .map_err(|e| PipelineError::Annotation {
            index: frame.index(),
            reason: e.to_string(),
        })?;
    logger.timing("annotate", t0.elapsed().as_secs_f64() * 1000.0);

    check_dimensions(&annotated, metadata)?;
    Ok(annotated)
}

pub(crate) fn check_dimensions(frame: &Frame, metadata: &VideoMetadata) -> Result<(), PipelineError> {
    if frame.dimensions() == metadata.dimensions() {
        return Ok(());
    }
    Err(PipelineError::FrameDimensionMismatch {
        index: frame.index(),
        expected_width: metadata.width,
        expected_height: metadata.height,
        actual_width: frame.width(),
        actual_height: frame.height(),
    })
}

/// Keeps a typed error raised inside an adapter, otherwise wraps the message.
pub(crate) fn classify_write_error(index: usize, err: Box<dyn std::error::Error>) -> PipelineError {
    match err.downcast::<PipelineError>() {
        Ok(typed) => *typed,
        Err(other) => PipelineError::FrameWrite {
            index,
            reason: other.to_string(),
        },
    }
}

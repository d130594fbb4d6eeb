use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::pipeline::frame_step::{aggregate_and_annotate, classify_write_error};
use crate::pipeline::pipeline_executor::{
    PipelineExecutor, StreamContext, StreamFailure, StreamOutcome,
};
use crate::shared::error::PipelineError;
use crate::statistics::detection_stats::DetectionStats;

/// Runs the whole frame loop on the calling thread.
///
/// Each iteration reads one frame, detects, counts, annotates, writes, and
/// then checks the cancellation flag.
#[derive(Default)]
pub struct SequentialPipelineExecutor;

impl SequentialPipelineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineExecutor for SequentialPipelineExecutor {
    fn run(&self, ctx: StreamContext<'_>) -> Result<StreamOutcome, StreamFailure> {
        let StreamContext {
            reader,
            writer,
            detector,
            annotator,
            logger,
            metadata,
            config,
        } = ctx;

        let total = metadata.total_frames;
        let mut stats = DetectionStats::new();
        let mut processed = 0usize;
        let mut cancelled = false;

        for (position, frame_result) in reader.frames().enumerate() {
            let fail = |error| StreamFailure::new(processed, error);

            let frame = frame_result.map_err(|e| {
                fail(PipelineError::FrameRead {
                    index: position,
                    reason: e.to_string(),
                })
            })?;

            let t0 = Instant::now();
            let detections = detector.detect(&frame).map_err(|e| {
                fail(PipelineError::Detection {
                    index: frame.index(),
                    reason: e.to_string(),
                })
            })?;
            logger.timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

            let annotated = aggregate_and_annotate(
                &frame,
                detections,
                config.min_confidence,
                &mut stats,
                annotator,
                metadata,
                &mut *logger,
            )
            .map_err(fail)?;

            let t0 = Instant::now();
            writer
                .write(&annotated)
                .map_err(|e| fail(classify_write_error(annotated.index(), e)))?;
            logger.timing("write", t0.elapsed().as_secs_f64() * 1000.0);

            processed += 1;
            logger.progress(processed, total);

            // Checkpoint: the frame above is already in the output
            if config.cancelled.load(Ordering::Relaxed) {
                cancelled = !is_last_frame(processed, total);
                break;
            }
        }

        Ok(StreamOutcome {
            frames_processed: processed,
            stats,
            cancelled,
        })
    }
}

/// A stop request on the final frame is indistinguishable from completion.
pub(crate) fn is_last_frame(processed: usize, total: usize) -> bool {
    total > 0 && processed >= total
}

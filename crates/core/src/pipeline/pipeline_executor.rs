use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::constants::DEFAULT_CONFIDENCE;
use crate::shared::error::PipelineError;
use crate::shared::video_metadata::VideoMetadata;
use crate::statistics::detection_stats::DetectionStats;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_logger::PipelineLogger;

/// Configuration for a pipeline execution run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Detections scoring below this are dropped before counting and drawing.
    pub min_confidence: f64,
    /// Polled once per frame, after the frame has been written.
    pub cancelled: Arc<AtomicBool>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_CONFIDENCE,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Opened components handed to an executor for the streaming stage.
///
/// The reader and writer are already open; the executor neither opens nor
/// closes them.
pub struct StreamContext<'a> {
    pub reader: &'a mut dyn VideoReader,
    pub writer: &'a mut dyn VideoWriter,
    pub detector: &'a mut dyn ObjectDetector,
    pub annotator: &'a dyn FrameAnnotator,
    pub logger: &'a mut dyn PipelineLogger,
    pub metadata: &'a VideoMetadata,
    pub config: &'a PipelineConfig,
}

/// Result of a streaming stage that ended without error.
#[derive(Debug)]
pub struct StreamOutcome {
    /// Frames written to the sink. Every counted detection belongs to one of them.
    pub frames_processed: usize,
    pub stats: DetectionStats,
    /// The loop stopped at the checkpoint before end of stream.
    pub cancelled: bool,
}

/// A streaming stage that failed after `frames_processed` frames were written.
#[derive(Debug)]
pub struct StreamFailure {
    pub frames_processed: usize,
    pub error: PipelineError,
}

impl StreamFailure {
    pub fn new(frames_processed: usize, error: PipelineError) -> Self {
        Self {
            frames_processed,
            error,
        }
    }
}

/// Abstracts how the read → detect → annotate → write loop is executed.
///
/// This is a port (application-layer interface). Infrastructure provides
/// concrete implementations (sequential, threaded). Every implementation
/// makes one detector call per frame and writes frames in source order.
pub trait PipelineExecutor: Send {
    fn run(&self, ctx: StreamContext<'_>) -> Result<StreamOutcome, StreamFailure>;
}

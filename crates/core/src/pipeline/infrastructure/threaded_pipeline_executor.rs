use std::sync::atomic::Ordering;
use std::thread::ScopedJoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::pipeline::frame_step::{aggregate_and_annotate, classify_write_error};
use crate::pipeline::pipeline_executor::{
    PipelineConfig, PipelineExecutor, StreamContext, StreamFailure, StreamOutcome,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::statistics::detection_stats::DetectionStats;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::sequential_pipeline_executor::is_last_frame;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type FrameMsg = Result<Frame, PipelineError>;
type DetectedMsg = Result<(Frame, Vec<Detection>), PipelineError>;
/// Frames written, or frames written before the failure.
type WriterResult = Result<usize, (usize, PipelineError)>;

/// Executes the frame loop with dedicated threads for decode, detection and
/// encode.
///
/// Layout: `reader → detect → main [aggregate/annotate] → writer`
///
/// Channels are FIFO so output order equals source order. Only the main
/// thread polls the cancellation flag, once per frame after handing it to
/// the writer; the worker threads stop when their channels disconnect.
/// Frames decoded or detected ahead of that checkpoint are discarded
/// uncounted.
pub struct ThreadedPipelineExecutor {
    channel_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
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
        let cap = self.channel_capacity;

        std::thread::scope(|s| {
            let (frame_tx, frame_rx) = crossbeam_channel::bounded::<FrameMsg>(cap);
            let (detected_tx, detected_rx) = crossbeam_channel::bounded::<DetectedMsg>(cap);
            let (write_tx, write_rx) = crossbeam_channel::bounded::<Frame>(cap);

            let reader_handle = s.spawn(move || read_frames(reader, frame_tx));
            let detect_handle = s.spawn(move || detect_frames(detector, frame_rx, detected_tx));
            let writer_handle = s.spawn(move || write_frames(writer, write_rx));

            let main_result = run_main_loop(
                detected_rx,
                write_tx,
                annotator,
                logger,
                metadata,
                config,
            );

            join_threads(reader_handle, detect_handle, writer_handle, main_result)
        })
    }
}

fn read_frames(reader: &mut dyn VideoReader, frame_tx: Sender<FrameMsg>) {
    for (position, frame_result) in reader.frames().enumerate() {
        let msg = frame_result.map_err(|e| PipelineError::FrameRead {
            index: position,
            reason: e.to_string(),
        });
        let stop = msg.is_err();
        if frame_tx.send(msg).is_err() || stop {
            break;
        }
    }
}

fn detect_frames(
    detector: &mut dyn ObjectDetector,
    frame_rx: Receiver<FrameMsg>,
    detected_tx: Sender<DetectedMsg>,
) -> Vec<f64> {
    let mut timings = Vec::new();
    for frame_result in frame_rx {
        let result = frame_result.and_then(|frame| {
            let t0 = Instant::now();
            let detected = detector.detect(&frame);
            timings.push(t0.elapsed().as_secs_f64() * 1000.0);
            match detected {
                Ok(detections) => Ok((frame, detections)),
                Err(e) => Err(PipelineError::Detection {
                    index: frame.index(),
                    reason: e.to_string(),
                }),
            }
        });

        let stop = result.is_err();
        if detected_tx.send(result).is_err() || stop {
            break;
        }
    }
    timings
}

fn write_frames(writer: &mut dyn VideoWriter, write_rx: Receiver<Frame>) -> WriterResult {
    let mut written = 0usize;
    for frame in write_rx {
        writer
            .write(&frame)
            .map_err(|e| (written, classify_write_error(frame.index(), e)))?;
        written += 1;
    }
    Ok(written)
}

/// Main-thread part of the loop. Returns the number of frames handed to the
/// writer and whether the checkpoint stopped the run, or the first error.
fn run_main_loop(
    detected_rx: Receiver<DetectedMsg>,
    write_tx: Sender<Frame>,
    annotator: &dyn FrameAnnotator,
    logger: &mut dyn PipelineLogger,
    metadata: &VideoMetadata,
    config: &PipelineConfig,
) -> MainLoopResult {
    let total = metadata.total_frames;
    let mut stats = DetectionStats::new();
    let mut sent = 0usize;

    for detected in detected_rx {
        let annotated = detected.and_then(|(frame, detections)| {
            aggregate_and_annotate(
                &frame,
                detections,
                config.min_confidence,
                &mut stats,
                annotator,
                metadata,
                &mut *logger,
            )
        });
        let annotated = match annotated {
            Ok(frame) => frame,
            Err(e) => return MainLoopResult::failed(sent, stats, e),
        };

        if write_tx.send(annotated).is_err() {
            // Writer stopped; its own error explains why
            return MainLoopResult::writer_gone(sent, stats);
        }
        sent += 1;
        logger.progress(sent, total);

        if config.cancelled.load(Ordering::Relaxed) {
            let cancelled = !is_last_frame(sent, total);
            return MainLoopResult::finished(sent, stats, cancelled);
        }
    }

    MainLoopResult::finished(sent, stats, false)
}

struct MainLoopResult {
    sent: usize,
    stats: DetectionStats,
    cancelled: bool,
    error: Option<PipelineError>,
}

impl MainLoopResult {
    fn finished(sent: usize, stats: DetectionStats, cancelled: bool) -> Self {
        Self {
            sent,
            stats,
            cancelled,
            error: None,
        }
    }

    fn failed(sent: usize, stats: DetectionStats, error: PipelineError) -> Self {
        Self {
            sent,
            stats,
            cancelled: false,
            error: Some(error),
        }
    }

    fn writer_gone(sent: usize, stats: DetectionStats) -> Self {
        Self::failed(
            sent,
            stats,
            PipelineError::FrameWrite {
                index: sent,
                reason: "writer stopped unexpectedly".to_string(),
            },
        )
    }
}

/// Joins all pipeline threads and coalesces the first error encountered.
///
/// A writer failure takes precedence: it is the root cause whenever the
/// main loop saw a closed channel.
fn join_threads(
    reader_handle: ScopedJoinHandle<'_, ()>,
    detect_handle: ScopedJoinHandle<'_, Vec<f64>>,
    writer_handle: ScopedJoinHandle<'_, WriterResult>,
    main: MainLoopResult,
) -> Result<StreamOutcome, StreamFailure> {
    let mut panicked: Option<&str> = None;
    if reader_handle.join().is_err() {
        panicked = Some("reader");
    }
    match detect_handle.join() {
        Ok(timings) => log::debug!("Detection thread handled {} frames", timings.len()),
        Err(_) => panicked = panicked.or(Some("detection")),
    }

    let written = match writer_handle.join() {
        Ok(Ok(written)) => written,
        Ok(Err((written, error))) => return Err(StreamFailure::new(written, error)),
        Err(_) => {
            return Err(StreamFailure::new(
                main.sent,
                PipelineError::FrameWrite {
                    index: main.sent,
                    reason: "writer thread panicked".to_string(),
                },
            ))
        }
    };

    if let Some(error) = main.error {
        return Err(StreamFailure::new(written, error));
    }
    if let Some(stage) = panicked {
        return Err(StreamFailure::new(
            written,
            PipelineError::FrameRead {
                index: written,
                reason: format!("{stage} thread panicked"),
            },
        ));
    }

    Ok(StreamOutcome {
        frames_processed: written,
        stats: main.stats,
        cancelled: main.cancelled,
    })
}

use std::path::Path;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::object_detector::DetectorLoader;
use crate::shared::error::PipelineError;
use crate::statistics::run_summary::{absolute_path, Completion, RunSummary};
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_executor::{PipelineConfig, PipelineExecutor, StreamContext};
use super::pipeline_logger::PipelineLogger;
use super::pipeline_state::PipelineState;
use super::resource_session::{ReaderSession, WriterSession};

/// Orchestrates one road-damage detection run over a video file.
///
/// Loads the detector, opens the source and then the sink, delegates the
/// frame loop to a `PipelineExecutor`, releases both handles, and returns
/// the summary for the report. Single-use: a second `execute` fails with
/// `AlreadyExecuted`.
pub struct DetectDamageUseCase {
    loader: Box<dyn DetectorLoader>,
    reader: Option<Box<dyn VideoReader>>,
    writer: Option<Box<dyn VideoWriter>>,
    annotator: Box<dyn FrameAnnotator>,
    executor: Box<dyn PipelineExecutor>,
    logger: Box<dyn PipelineLogger>,
    config: PipelineConfig,
    state: PipelineState,
}

impl DetectDamageUseCase {
    pub fn new(
        loader: Box<dyn DetectorLoader>,
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        annotator: Box<dyn FrameAnnotator>,
        executor: Box<dyn PipelineExecutor>,
        logger: Box<dyn PipelineLogger>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            loader,
            reader: Some(reader),
            writer: Some(writer),
            annotator,
            executor,
            logger,
            config,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn execute(&mut self, input: &Path, output: &Path) -> Result<RunSummary, PipelineError> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::AlreadyExecuted);
        }
        let (Some(mut reader), Some(mut writer)) = (self.reader.take(), self.writer.take()) else {
            return Err(PipelineError::AlreadyExecuted);
        };

        let result = self.run(&mut *reader, &mut *writer, input, output);
        if let Err(e) = &result {
            self.transition(PipelineState::Aborted(e.kind()));
            log::debug!("Run aborted: {e}");
        }
        result
    }

    fn run(
        &mut self,
        reader: &mut dyn VideoReader,
        writer: &mut dyn VideoWriter,
        input: &Path,
        output: &Path,
    ) -> Result<RunSummary, PipelineError> {
        self.transition(PipelineState::Loading);

        let mut detector = self
            .loader
            .load()
            .map_err(|e| PipelineError::ModelUnavailable(e.to_string()))?;
        self.logger.info("Detector ready");

        let metadata = reader
            .open(input)
            .map_err(|e| PipelineError::SourceUnavailable {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })?;
        let mut reader_session = ReaderSession::new(reader);

        writer
            .open(output, &metadata)
            .map_err(|e| PipelineError::SinkUnwritable {
                path: output.to_path_buf(),
                reason: e.to_string(),
            })?;
        let mut writer_session = WriterSession::new(writer);

        self.transition(PipelineState::Streaming);
        self.logger.info(&format!(
            "Streaming {} ({}x{}, {:.2} fps, {} frames)",
            input.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames
        ));

        let streamed = self.executor.run(StreamContext {
            reader: reader_session.reader(),
            writer: writer_session.writer(),
            detector: &mut *detector,
            annotator: &*self.annotator,
            logger: &mut *self.logger,
            metadata: &metadata,
            config: &self.config,
        });

        self.transition(PipelineState::Draining);
        reader_session.finish();
        let finalized = writer_session.finish();

        let outcome = match streamed {
            Ok(outcome) => outcome,
            Err(failure) => {
                if let Err(e) = finalized {
                    log::warn!("Failed to finalize partial output: {e}");
                }
                return Err(PipelineError::Incomplete {
                    processed: failure.frames_processed,
                    total: metadata.total_frames,
                    output: output.to_path_buf(),
                    source: Box::new(failure.error),
                });
            }
        };
        finalized.map_err(|e| PipelineError::SinkUnwritable {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;

        self.transition(PipelineState::Reporting);
        let completion = if outcome.cancelled {
            self.logger.info(&format!(
                "Stopped by user after {} frames",
                outcome.frames_processed
            ));
            Completion::Cancelled
        } else {
            Completion::Finished
        };
        self.logger.summary();

        let summary = RunSummary {
            output_path: absolute_path(output),
            frames_processed: outcome.frames_processed,
            frames_total: metadata.total_frames,
            counts: outcome.stats.snapshot(),
            completion,
        };
        self.transition(PipelineState::Done);
        Ok(summary)
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {next:?}",
            self.state
        );
        log::debug!("Pipeline state {:?} -> {next:?}", self.state);
        self.state = next;
    }
}

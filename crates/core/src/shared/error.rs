use std::path::PathBuf;

use thiserror::Error;

/// Failures that end a pipeline run.
///
/// Adapters report `Box<dyn Error>`; the use case classifies them here at
/// each stage boundary so callers can tell which stage failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("detection model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("cannot open video {}: {reason}", .path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("cannot write output video {}: {reason}", .path.display())]
    SinkUnwritable { path: PathBuf, reason: String },

    #[error(
        "frame {index} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}"
    )]
    FrameDimensionMismatch {
        index: usize,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("failed to decode frame {index}: {reason}")]
    FrameRead { index: usize, reason: String },

    #[error("detector failed on frame {index}: {reason}")]
    Detection { index: usize, reason: String },

    #[error("failed to annotate frame {index}: {reason}")]
    Annotation { index: usize, reason: String },

    #[error("failed to write frame {index}: {reason}")]
    FrameWrite { index: usize, reason: String },

    #[error(
        "{source}; output incomplete after {processed}/{} frames: {}",
        total_label(.total),
        .output.display()
    )]
    Incomplete {
        processed: usize,
        total: usize,
        output: PathBuf,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("pipeline already executed")]
    AlreadyExecuted,
}

/// Coarse classification of a [`PipelineError`], cheap to copy into state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    ModelUnavailable,
    SourceUnavailable,
    SinkUnwritable,
    FrameDimensionMismatch,
    FrameRead,
    Detection,
    Annotation,
    FrameWrite,
    AlreadyExecuted,
}

impl PipelineError {
    /// Kind of the underlying failure; `Incomplete` reports its cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            PipelineError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            PipelineError::SinkUnwritable { .. } => ErrorKind::SinkUnwritable,
            PipelineError::FrameDimensionMismatch { .. } => ErrorKind::FrameDimensionMismatch,
            PipelineError::FrameRead { .. } => ErrorKind::FrameRead,
            PipelineError::Detection { .. } => ErrorKind::Detection,
            PipelineError::Annotation { .. } => ErrorKind::Annotation,
            PipelineError::FrameWrite { .. } => ErrorKind::FrameWrite,
            PipelineError::Incomplete { source, .. } => source.kind(),
            PipelineError::AlreadyExecuted => ErrorKind::AlreadyExecuted,
        }
    }
}

pub(crate) fn total_label(total: &usize) -> String {
    if *total == 0 {
        "?".to_string()
    } else {
        total.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_reports_progress_and_cause() {
        let err = PipelineError::Incomplete {
            processed: 12,
            total: 40,
            output: PathBuf::from("/out/clip_detected.mp4"),
            source: Box::new(PipelineError::FrameRead {
                index: 12,
                reason: "corrupt packet".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("failed to decode frame 12: corrupt packet"));
        assert!(msg.contains("12/40 frames"));
        assert!(msg.contains("/out/clip_detected.mp4"));
        assert_eq!(err.kind(), ErrorKind::FrameRead);
    }

    #[test]
    fn test_incomplete_with_unknown_total() {
        let err = PipelineError::Incomplete {
            processed: 3,
            total: 0,
            output: PathBuf::from("out.mp4"),
            source: Box::new(PipelineError::FrameWrite {
                index: 3,
                reason: "disk full".to_string(),
            }),
        };
        assert!(err.to_string().contains("3/? frames"));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = PipelineError::FrameDimensionMismatch {
            index: 4,
            expected_width: 640,
            expected_height: 480,
            actual_width: 320,
            actual_height: 240,
        };
        assert_eq!(
            err.to_string(),
            "frame 4 is 320x240, expected 640x480"
        );
        assert_eq!(err.kind(), ErrorKind::FrameDimensionMismatch);
    }
}

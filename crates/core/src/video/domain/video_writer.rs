use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sink for annotated frames.
///
/// The output stream takes its resolution and frame rate from `metadata`;
/// frames of any other size are rejected.
pub trait VideoWriter: Send {
    /// Creates the output container, including missing parent directories.
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Appends one frame after all previously written frames.
    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes and finalizes the container. A writer that is not open
    /// closes as a no-op.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

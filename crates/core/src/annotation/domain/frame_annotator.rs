use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Draws detections onto a copy of a frame.
///
/// Must not modify `frame`. The same inputs always produce the same pixels.
pub trait FrameAnnotator: Send {
    fn annotate(
        &self,
        frame: &Frame,
        detections: &[Detection],
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}

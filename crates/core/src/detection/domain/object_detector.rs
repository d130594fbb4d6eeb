use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for object detection.
///
/// One call per frame. Implementations may keep per-run state, hence
/// `&mut self`.
pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}

/// Turns configuration into a ready detector.
///
/// Kept separate from `ObjectDetector` so a missing or corrupt model
/// artifact is discovered before any video is opened.
pub trait DetectorLoader: Send {
    fn load(&self) -> Result<Box<dyn ObjectDetector>, Box<dyn std::error::Error>>;
}

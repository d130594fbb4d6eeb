//! Road damage detection over video files.
//!
//! Frames are decoded with ffmpeg, passed through an ONNX object detector,
//! annotated with bounding boxes, re-encoded, and tallied per damage class.

pub mod annotation;
pub mod detection;
pub mod pipeline;
pub mod shared;
pub mod statistics;
pub mod video;

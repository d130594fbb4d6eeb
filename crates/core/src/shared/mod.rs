pub mod constants;
pub mod error;
pub mod frame;
pub mod settings;
pub mod video_metadata;

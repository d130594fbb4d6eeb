pub const DEFAULT_MODEL_PATH: &str = "models/YOLOv8_Small_RDD.onnx";
pub const DEFAULT_OUTPUT_DIR: &str = "output_results";

/// Detections scoring below this are dropped before counting or drawing.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// Progress is printed every this many frames.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

pub const OUTPUT_SUFFIX: &str = "_detected";
pub const OUTPUT_EXTENSION: &str = "mp4";

/// MPEG-4 Part 2 bit rate; the encoder default (200 kbit/s) smears the boxes.
pub const DEFAULT_BIT_RATE: usize = 4_000_000;

pub const DEFAULT_BOX_THICKNESS: u32 = 2;

pub const APP_DIR_NAME: &str = "RoadScan";

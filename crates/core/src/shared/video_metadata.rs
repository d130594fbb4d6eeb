use std::path::PathBuf;

/// Fallback when the source reports no usable frame rate.
const FALLBACK_FRAME_RATE: (i32, i32) = (30, 1);

/// Stream properties read once when the source opens.
///
/// `total_frames` is 0 when the container does not report a frame count.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Exact rate as `(numerator, denominator)`, e.g. `(30000, 1001)` for
    /// NTSC. `(0, 1)` when unknown; `fps` is then the only hint.
    pub frame_rate: (i32, i32),
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frame rate as a reduced fraction for the encoder.
    ///
    /// Prefers `frame_rate`, then `fps` to millihertz precision, then 30/1.
    pub fn rate(&self) -> (i32, i32) {
        let (num, den) = self.frame_rate;
        if num > 0 && den > 0 {
            return reduce(num, den);
        }
        if self.fps.is_finite() && self.fps > 0.0 {
            let millis = (self.fps * 1000.0).round();
            if millis >= 1.0 && millis <= i32::MAX as f64 {
                return reduce(millis as i32, 1000);
            }
        }
        FALLBACK_FRAME_RATE
    }
}

fn reduce(num: i32, den: i32) -> (i32, i32) {
    let divisor = gcd(num, den);
    (num / divisor, den / divisor)
}

fn gcd(mut a: i32, mut b: i32) -> i32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

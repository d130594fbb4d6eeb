//! Bounding-box overlay drawn with `imageproc`.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::shared::constants::DEFAULT_BOX_THICKNESS;
use crate::shared::frame::Frame;

const LABEL_SCALE: f32 = 18.0;
const LABEL_PADDING: u32 = 3;
/// Height of the label tab when no font is available.
const BLANK_TAB_HEIGHT: u32 = 6;

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [52, 69, 147],
    [203, 56, 255],
];

/// Common system locations for a sans-serif TrueType font.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// How boxes and labels look.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationStyle {
    pub box_thickness: u32,
    pub show_confidence: bool,
    /// Font file for labels; common system fonts are tried when `None`.
    pub font_path: Option<PathBuf>,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            box_thickness: DEFAULT_BOX_THICKNESS,
            show_confidence: true,
            font_path: None,
        }
    }
}

/// Draws an outlined box and a filled label tab per detection.
pub struct BoxAnnotator {
    style: AnnotationStyle,
    font: Option<FontVec>,
}

impl BoxAnnotator {
    /// Loads the label font. A configured font that cannot be loaded is an
    /// error; if none is configured and no system font is found, labels are
    /// drawn as blank tabs.
    pub fn new(style: AnnotationStyle) -> Result<Self, Box<dyn std::error::Error>> {
        let font = match style.font_path.as_deref() {
            Some(path) => Some(load_font(path)?),
            None => {
                let found = SYSTEM_FONTS
                    .iter()
                    .map(Path::new)
                    .filter(|p| p.is_file())
                    .find_map(|p| load_font(p).ok());
                if found.is_none() {
                    log::warn!("No label font found; boxes will be drawn without text");
                }
                found
            }
        };
        Ok(Self::with_font(style, font))
    }

    pub fn with_font(style: AnnotationStyle, font: Option<FontVec>) -> Self {
        Self { style, font }
    }

    fn label_text(&self, detection: &Detection) -> String {
        if self.style.show_confidence {
            format!("{} {:.2}", detection.class_label, detection.confidence)
        } else {
            detection.class_label.clone()
        }
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        let (img_w, img_h) = canvas.dimensions();
        let Some(rect) = rect_from_bbox(&detection.bbox, img_w, img_h) else {
            return;
        };
        let color = Rgb(label_color(&detection.class_label));

        // Grow outward one pixel per extra unit of thickness
        for t in 0..self.style.box_thickness.max(1) {
            let grown = Rect::at(rect.left() - t as i32, rect.top() - t as i32)
                .of_size(rect.width() + 2 * t, rect.height() + 2 * t);
            draw_hollow_rect_mut(canvas, grown, color);
        }

        self.draw_label(canvas, &rect, detection, color);
    }

    fn draw_label(&self, canvas: &mut RgbImage, rect: &Rect, detection: &Detection, color: Rgb<u8>) {
        let scale = PxScale::from(LABEL_SCALE);
        let text = self.label_text(detection);

        let (tab_w, tab_h) = match &self.font {
            Some(font) => {
                let (w, h) = text_size(scale, font, &text);
                (w + 2 * LABEL_PADDING, h + 2 * LABEL_PADDING)
            }
            None => (rect.width(), BLANK_TAB_HEIGHT),
        };

        // Above the box when it fits, otherwise inside its top edge
        let tab_y = if rect.top() >= tab_h as i32 {
            rect.top() - tab_h as i32
        } else {
            rect.top()
        };
        let tab = Rect::at(rect.left(), tab_y).of_size(tab_w.max(1), tab_h.max(1));
        draw_filled_rect_mut(canvas, tab, color);

        if let Some(font) = &self.font {
            draw_text_mut(
                canvas,
                text_color(color),
                rect.left() + LABEL_PADDING as i32,
                tab_y + LABEL_PADDING as i32,
                scale,
                font,
                &text,
            );
        }
    }
}

impl FrameAnnotator for BoxAnnotator {
    fn annotate(
        &self,
        frame: &Frame,
        detections: &[Detection],
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        if detections.is_empty() {
            return Ok(frame.clone());
        }
        let mut canvas = frame
            .to_rgb_image()
            .ok_or_else(|| format!("cannot draw on a {}-channel frame", frame.channels()))?;
        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }
        Ok(Frame::from_rgb_image(canvas, frame.index()))
    }
}

fn load_font(path: &Path) -> Result<FontVec, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("cannot read font {}: {e}", path.display()))?;
    let font = FontVec::try_from_vec(bytes)
        .map_err(|e| format!("invalid font {}: {e}", path.display()))?;
    log::debug!("Using label font {}", path.display());
    Ok(font)
}

/// Box in integer pixel coordinates, or `None` when nothing of it is visible.
fn rect_from_bbox(bbox: &BoundingBox, img_w: u32, img_h: u32) -> Option<Rect> {
    if img_w == 0 || img_h == 0 {
        return None;
    }
    let max_x = (img_w - 1) as f64;
    let max_y = (img_h - 1) as f64;

    if bbox.right() < 0.0 || bbox.bottom() < 0.0 || bbox.x > max_x || bbox.y > max_y {
        return None;
    }

    let x1 = bbox.x.clamp(0.0, max_x);
    let y1 = bbox.y.clamp(0.0, max_y);
    let x2 = bbox.right().clamp(0.0, max_x);
    let y2 = bbox.bottom().clamp(0.0, max_y);

    let width = (x2 - x1).max(1.0).round() as u32;
    let height = (y2 - y1).max(1.0).round() as u32;

    Some(Rect::at(x1.round() as i32, y1.round() as i32).of_size(width, height))
}

/// Stable color per class label (FNV-1a over the label bytes).
fn label_color(label: &str) -> [u8; 3] {
    let hash = label
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
            (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
        });
    PALETTE[(hash % PALETTE.len() as u64) as usize]
}

fn text_color(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    if luma > 140.0 {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}

/// Multi-class YOLO detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, per-class NMS, and mapping
/// boxes back into source-frame coordinates.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::detection::domain::object_detector::{DetectorLoader, ObjectDetector};
use crate::shared::frame::Frame;

use super::class_names::ClassNames;
use super::execution_provider::preferred_execution_providers;
use super::model_resolver::{self, ProgressFn};

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold, applied within each class.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of box values preceding the class scores in each output row.
const BOX_VALUES: usize = 4;

/// YOLO detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    class_names: ClassNames,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// Class names come from `class_labels` when non-empty, else from the
    /// model's `names` metadata. The input resolution is read from the
    /// model's NCHW input shape, falling back to 640.
    pub fn new(
        model_path: &Path,
        class_labels: &[String],
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let class_names = if class_labels.is_empty() {
            read_class_names(&session).unwrap_or_else(|| {
                log::warn!("Model has no class names; labels will be class ids");
                ClassNames::default()
            })
        } else {
            ClassNames::new(class_labels.to_vec())
        };
        log::info!(
            "Loaded model {} ({} classes, input {input_size}px)",
            model_path.display(),
            class_names.len()
        );

        Ok(Self {
            session,
            class_names,
            confidence,
            input_size,
        })
    }
}

fn read_class_names(session: &ort::session::Session) -> Option<ClassNames> {
    let metadata = session.metadata().ok()?;
    let names = metadata.custom("names")?;
    ClassNames::parse_metadata(&names)
}

impl ObjectDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("expected an RGB frame, got {} channels", frame.channels()).into());
        }

        let (input_tensor, transform) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut candidates = decode_candidates(data, tensor.shape(), &transform, self.confidence)?;
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .filter_map(|c| {
                let bbox = c.bbox.clamp_to(frame.width(), frame.height())?;
                Some(Detection::new(
                    self.class_names.label(c.class_id),
                    c.confidence,
                    bbox,
                ))
            })
            .collect())
    }
}

/// Resolves the model artifact and builds an [`OnnxYoloDetector`].
pub struct OnnxYoloDetectorLoader {
    model_path: PathBuf,
    model_url: Option<String>,
    class_labels: Vec<String>,
    confidence: f64,
    progress: Option<Arc<dyn Fn(u64, u64) + Send + Sync>>,
}

impl OnnxYoloDetectorLoader {
    pub fn new(model_path: PathBuf, model_url: Option<String>, class_labels: Vec<String>, confidence: f64) -> Self {
        Self {
            model_path,
            model_url,
            class_labels,
            confidence,
            progress: None,
        }
    }

    /// Reports `(downloaded, total)` bytes if the model has to be fetched.
    pub fn with_download_progress(mut self, progress: Arc<dyn Fn(u64, u64) + Send + Sync>) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl DetectorLoader for OnnxYoloDetectorLoader {
    fn load(&self) -> Result<Box<dyn ObjectDetector>, Box<dyn std::error::Error>> {
        let progress = self.progress.clone().map(|cb| -> ProgressFn {
            Box::new(move |downloaded, total| cb(downloaded, total))
        });
        let path = model_resolver::resolve(&self.model_path, self.model_url.as_deref(), progress)?;
        let detector = OnnxYoloDetector::new(&path, &self.class_labels, self.confidence)?;
        Ok(Box::new(detector))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Maps letterboxed model coordinates back to the source frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LetterboxTransform {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl LetterboxTransform {
    fn to_source(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` x `target_size`, returning an
/// NCHW float32 tensor in `[0, 1]`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, LetterboxTransform) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, the YOLO training convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        LetterboxTransform {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Candidate {
    class_id: usize,
    confidence: f64,
    bbox: BoundingBox,
}

/// Parses raw YOLO output rows `[cx, cy, w, h, score_0, .., score_n]`.
///
/// Accepts `[1, features, candidates]` (the usual export layout) and
/// `[1, candidates, features]`.
fn decode_candidates(
    data: &[f32],
    shape: &[usize],
    transform: &LetterboxTransform,
    confidence: f64,
) -> Result<Vec<Candidate>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_candidates, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats <= BOX_VALUES {
        return Err(format!("YOLO output has no class scores: {shape:?}").into());
    }
    if data.len() < num_candidates * num_feats {
        return Err("YOLO output shorter than its shape".into());
    }

    let value = |i: usize, f: usize| -> f64 {
        if transposed {
            data[f * num_candidates + i] as f64
        } else {
            data[i * num_feats + f] as f64
        }
    };

    let mut candidates = Vec::new();
    for i in 0..num_candidates {
        let (class_id, score) = (BOX_VALUES..num_feats)
            .map(|f| (f - BOX_VALUES, value(i, f)))
            .fold((0, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < confidence {
            continue;
        }

        let cx = value(i, 0);
        let cy = value(i, 1);
        let w = value(i, 2);
        let h = value(i, 3);
        let (x1, y1) = transform.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = transform.to_source(cx + w / 2.0, cy + h / 2.0);

        candidates.push(Candidate {
            class_id,
            confidence: score,
            bbox: BoundingBox::from_corners(x1, y1, x2, y2),
        });
    }
    Ok(candidates)
}

/// Greedy per-class NMS: sort by confidence descending, suppress boxes of
/// the same class that overlap a kept box.
fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == c.class_id && k.bbox.iou(&c.bbox) > iou_thresh);
        if !suppressed {
            keep.push(c.clone());
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn identity() -> LetterboxTransform {
        LetterboxTransform {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        }
    }

    fn candidate(class_id: usize, confidence: f64, x: f64, y: f64, size: f64) -> Candidate {
        Candidate {
            class_id,
            confidence,
            bbox: BoundingBox::new(x, y, size, size),
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, new 640x320, pad_y 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, t) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(t.scale, 3.2, epsilon = 1e-9);
        assert_eq!((t.pad_x, t.pad_y), (0, 160));
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, t) = letterbox(&frame, 640);

        let y = t.pad_y as usize + 1;
        assert!((tensor[[0, 0, y, 1]] - 1.0).abs() < 0.01);
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 0.01);
    }

    #[test]
    fn test_transform_inverts_letterbox() {
        let t = LetterboxTransform {
            scale: 2.0,
            pad_x: 0,
            pad_y: 80,
        };
        let (x, y) = t.to_source(100.0, 180.0);
        assert_relative_eq!(x, 50.0);
        assert_relative_eq!(y, 50.0);
    }

    #[test]
    fn test_decode_transposed_layout_picks_best_class() {
        // 2 classes, 8 candidates, layout [1, 6, 8]; only the first two score
        let rows: [[f32; 6]; 2] = [
            [50.0, 50.0, 20.0, 20.0, 0.10, 0.80],
            [10.0, 10.0, 4.0, 4.0, 0.90, 0.10],
        ];
        let num_candidates = 8;
        let mut data = vec![0.0f32; 6 * num_candidates];
        for (i, row) in rows.iter().enumerate() {
            for (f, v) in row.iter().enumerate() {
                data[f * num_candidates + i] = *v;
            }
        }

        let cands = decode_candidates(&data, &[1, 6, 8], &identity(), 0.25).unwrap();
        assert_eq!(cands.len(), 2);

        assert_eq!(cands[0].class_id, 1);
        assert_relative_eq!(cands[0].confidence, 0.8, epsilon = 1e-6);
        assert_relative_eq!(cands[0].bbox.x, 40.0);
        assert_relative_eq!(cands[0].bbox.width, 20.0);

        assert_eq!(cands[1].class_id, 0);
        assert_relative_eq!(cands[1].bbox.x, 8.0);
    }

    #[test]
    fn test_decode_row_major_layout() {
        // 1 class, layout [1, candidates=6, features=5]
        let mut data = vec![0.0f32; 6 * 5];
        data[..5].copy_from_slice(&[30.0, 30.0, 10.0, 10.0, 0.7]);
        let cands = decode_candidates(&data, &[1, 6, 5], &identity(), 0.25).unwrap();
        assert_eq!(cands.len(), 1);
        assert_relative_eq!(cands[0].bbox.y, 25.0);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert!(decode_candidates(&[0.0; 8], &[2, 4], &identity(), 0.25).is_err());
        assert!(decode_candidates(&[0.0; 12], &[1, 4, 3], &identity(), 0.25).is_err());
        assert!(decode_candidates(&[0.0; 4], &[1, 5, 8], &identity(), 0.25).is_err());
    }

    #[test]
    fn test_nms_suppresses_same_class_overlap() {
        let mut cands = vec![
            candidate(0, 0.8, 5.0, 5.0, 100.0),
            candidate(0, 0.9, 0.0, 0.0, 100.0),
        ];
        let kept = nms(&mut cands, 0.45);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_overlap_across_classes() {
        let mut cands = vec![
            candidate(0, 0.9, 0.0, 0.0, 100.0),
            candidate(1, 0.8, 5.0, 5.0, 100.0),
        ];
        assert_eq!(nms(&mut cands, 0.45).len(), 2);
    }

    #[test]
    fn test_nms_empty_input() {
        let mut cands: Vec<Candidate> = Vec::new();
        assert!(nms(&mut cands, 0.45).is_empty());
    }

    #[test]
    fn test_loader_reports_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OnnxYoloDetectorLoader::new(
            dir.path().join("definitely_missing_model_9f3a.onnx"),
            None,
            Vec::new(),
            0.25,
        );
        assert!(loader.load().is_err());
    }
}

/// Axis-aligned box in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Intersection with a `frame_w` x `frame_h` frame, or `None` when the
    /// box lies entirely outside it.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Option<BoundingBox> {
        let x1 = self.x.clamp(0.0, frame_w as f64);
        let y1 = self.y.clamp(0.0, frame_h as f64);
        let x2 = self.right().clamp(0.0, frame_w as f64);
        let y2 = self.bottom().clamp(0.0, frame_h as f64);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox::from_corners(x1, y1, x2, y2))
    }
}

/// One recognized object in one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_label: String,
    /// Score in `[0, 1]`.
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            bbox,
        }
    }

    /// Drops detections scoring below `min_confidence`, keeping order.
    pub fn retain_confident(mut detections: Vec<Detection>, min_confidence: f64) -> Vec<Detection> {
        detections.retain(|d| d.confidence >= min_confidence);
        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn bbox(x: f64, y: f64, w: f64, h: f64) -> BoundingBox {
        BoundingBox::new(x, y, w, h)
    }

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical() {
        let a = bbox(10.0, 10.0, 100.0, 100.0);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 50*100 = 5000, union 15000
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        let b = bbox(50.0, 0.0, 100.0, 100.0);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[rstest]
    #[case::disjoint(bbox(0.0, 0.0, 50.0, 50.0), bbox(100.0, 100.0, 50.0, 50.0))]
    #[case::touching(bbox(0.0, 0.0, 50.0, 50.0), bbox(50.0, 0.0, 50.0, 50.0))]
    #[case::zero_width(bbox(0.0, 0.0, 0.0, 100.0), bbox(0.0, 0.0, 50.0, 50.0))]
    fn test_iou_zero(#[case] a: BoundingBox, #[case] b: BoundingBox) {
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    // ── Clamping ─────────────────────────────────────────────────────

    #[test]
    fn test_clamp_inside_is_unchanged() {
        let b = bbox(10.0, 20.0, 30.0, 40.0);
        assert_eq!(b.clamp_to(100, 100), Some(b));
    }

    #[test]
    fn test_clamp_crops_overhang() {
        let b = bbox(-10.0, 90.0, 30.0, 30.0);
        let clamped = b.clamp_to(100, 100).unwrap();
        assert_relative_eq!(clamped.x, 0.0);
        assert_relative_eq!(clamped.width, 20.0);
        assert_relative_eq!(clamped.y, 90.0);
        assert_relative_eq!(clamped.height, 10.0);
    }

    #[test]
    fn test_clamp_outside_is_none() {
        assert!(bbox(150.0, 150.0, 10.0, 10.0).clamp_to(100, 100).is_none());
    }

    // ── Confidence filter ────────────────────────────────────────────

    #[test]
    fn test_retain_confident_keeps_threshold_and_order() {
        let dets = vec![
            Detection::new("Crack", 0.9, bbox(0.0, 0.0, 1.0, 1.0)),
            Detection::new("Pothole", 0.1, bbox(0.0, 0.0, 1.0, 1.0)),
            Detection::new("Pothole", 0.25, bbox(0.0, 0.0, 1.0, 1.0)),
        ];
        let kept = Detection::retain_confident(dets, 0.25);
        let labels: Vec<_> = kept.iter().map(|d| d.class_label.as_str()).collect();
        assert_eq!(labels, vec!["Crack", "Pothole"]);
        assert_relative_eq!(kept[1].confidence, 0.25);
    }
}

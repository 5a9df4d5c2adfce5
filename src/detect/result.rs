use serde::{Deserialize, Serialize};

/// Axis-aligned box in photo pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Clamp the box into a `width` x `height` photo.
    pub fn clamp_to(&self, width: u32, height: u32) -> BoundingBox {
        let w = width as f32;
        let h = height as f32;
        BoundingBox {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// One damage region reported by a detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_label: String,
    /// Some exported models do not report a score.
    #[serde(default)]
    pub confidence: Option<f32>,
    pub bbox: BoundingBox,
}

impl Detection {
    /// A detection without a score always passes the threshold.
    pub fn meets_threshold(&self, threshold: f32) -> bool {
        self.confidence.map_or(true, |score| score >= threshold)
    }
}

/// Label for a class id, falling back to the id itself for unnamed classes.
pub fn class_label(class_names: &[String], class_id: u32) -> String {
    class_names
        .get(class_id as usize)
        .cloned()
        .unwrap_or_else(|| class_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox { x1, y1, x2, y2 }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn half_overlap() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn unnamed_class_uses_numeric_label() {
        let names = vec!["Dent".to_string()];
        assert_eq!(class_label(&names, 0), "Dent");
        assert_eq!(class_label(&names, 9), "9");
    }

    #[test]
    fn unscored_detection_passes_threshold() {
        let detection = Detection {
            class_id: 0,
            class_label: "Dent".to_string(),
            confidence: None,
            bbox: BoundingBox::default(),
        };
        assert!(detection.meets_threshold(0.9));
    }
}

use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// Axis-aligned face box in pixel coordinates, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Rejects non-finite coordinates and empty or negative extents.
    pub fn validate(&self) -> Result<(), TrackError> {
        let finite = [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite());
        if !finite || self.w <= 0.0 || self.h <= 0.0 {
            return Err(TrackError::InvalidBox {
                x: self.x,
                y: self.y,
                w: self.w,
                h: self.h,
            });
        }
        Ok(())
    }

    /// Intersection over union: 0 for disjoint boxes, 1 for identical ones.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_identical() {
        let b = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_disjoint() {
        let a = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
        let b = BoundingBox::new(300.0, 300.0, 50.0, 50.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_touching_edges() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_shifted() {
        // 45x45 overlap, union 2*2500 - 2025.
        let a = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
        let b = BoundingBox::new(105.0, 105.0, 50.0, 50.0);
        let want = 2025.0 / 2975.0;
        assert!((a.iou(&b) - want).abs() < 1e-5);
        assert!((b.iou(&a) - want).abs() < 1e-5);
    }

    #[test]
    fn iou_contained() {
        let outer = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let inner = BoundingBox::new(25.0, 25.0, 50.0, 50.0);
        assert!((outer.iou(&inner) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_bad_boxes() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).validate().is_ok());
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 1.0).validate().is_err());
        assert!(BoundingBox::new(0.0, 0.0, 1.0, -1.0).validate().is_err());
        assert!(BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0).validate().is_err());
        assert!(BoundingBox::new(0.0, f32::INFINITY, 1.0, 1.0).validate().is_err());
    }
}

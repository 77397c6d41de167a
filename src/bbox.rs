//! Axis-aligned bounding boxes and their overlap metric.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An axis-aligned rectangle in pixel coordinates.
///
/// `(x, y)` is the top-left corner. Negative widths or heights are accepted
/// but treated as zero for every area and overlap computation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "w")]
    pub width: f64,
    #[serde(rename = "h")]
    pub height: f64,
}

impl BoundingBox {
    /// Create a box from its top-left corner and size.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Width clamped to zero.
    #[inline]
    pub fn effective_width(&self) -> f64 {
        self.width.max(0.0)
    }

    /// Height clamped to zero.
    #[inline]
    pub fn effective_height(&self) -> f64 {
        self.height.max(0.0)
    }

    /// Area of the box (zero for degenerate boxes).
    #[inline]
    pub fn area(&self) -> f64 {
        self.effective_width() * self.effective_height()
    }

    /// Returns (x1, y1, x2, y2): top-left and bottom-right corners.
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (
            self.x,
            self.y,
            self.x + self.effective_width(),
            self.y + self.effective_height(),
        )
    }

    /// True when every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Intersection-over-Union with another box, in `[0, 1]`.
    ///
    /// Returns 0 when the union area is not positive, and when either box
    /// carries a non-finite coordinate.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        if !self.is_finite() || !other.is_finite() {
            return 0.0;
        }

        let (a_x1, a_y1, a_x2, a_y2) = self.corners();
        let (b_x1, b_y1, b_x2, b_y2) = other.corners();

        // Intersection
        let inter_w = (a_x2.min(b_x2) - a_x1.max(b_x1)).max(0.0);
        let inter_h = (a_y2.min(b_y2) - a_y1.max(b_y1)).max(0.0);
        let inter_area = inter_w * inter_h;

        // Union
        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// Reject any box carrying NaN or infinite coordinates.
pub fn validate_boxes(boxes: &[BoundingBox]) -> Result<()> {
    match boxes.iter().position(|b| !b.is_finite()) {
        Some(idx) => Err(Error::InvalidInput(format!(
            "box {} has non-finite coordinates: {:?}",
            idx, boxes[idx]
        ))),
        None => Ok(()),
    }
}

//! Axis-aligned box geometry
//!
//! All coordinates are rounded to [`PRECISION`] decimals as soon as they are
//! computed so that repeated runs compare equal. The area is the one derived
//! value that is not rounded.

use crate::error::BoxError;
use serde::{Deserialize, Serialize};

/// Number of decimals kept for coordinates and derived metrics
pub const PRECISION: i32 = 5;

/// Round a value to [`PRECISION`] decimals.
///
/// Rounds the exact binary value, ties to even, and returns the nearest
/// `f64` to the decimal result.
pub fn round5(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", PRECISION as usize, value)
        .parse()
        .unwrap_or(value)
}

/// Validated box with derived center and area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    #[serde(rename = "w")]
    pub width: f64,
    #[serde(rename = "h")]
    pub height: f64,
    pub xc: f64,
    pub yc: f64,
    pub area: f64,
}

impl Rect {
    /// Build a box from its bounds, rejecting degenerate or inverted input
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self, BoxError> {
        let (x0, y0, x1, y1) = (round5(x0), round5(y0), round5(x1), round5(y1));
        let width = round5(x1 - x0);
        let height = round5(y1 - y0);
        let area = width * height;
        let (xc, yc) = (round5((x0 + x1) / 2.0), round5((y0 + y1) / 2.0));

        // derived values overflow for huge finite input
        if ![x0, y0, x1, y1, width, height, area, xc, yc].iter().all(|v| v.is_finite()) {
            return Err(BoxError::NonFinite);
        }
        if width <= 0.0 {
            return Err(BoxError::NonPositiveWidth { width });
        }
        if height <= 0.0 {
            return Err(BoxError::NonPositiveHeight { height });
        }
        if area <= 0.0 {
            return Err(BoxError::NonPositiveArea { area });
        }

        Ok(Self {
            x0,
            y0,
            x1,
            y1,
            width,
            height,
            xc,
            yc,
            area,
        })
    }

    /// Bounds as `(x0, y0, x1, y1)`
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        (self.x0, self.y0, self.x1, self.y1)
    }

    /// Origin and size as `(x0, y0, w, h)`
    pub fn rect(&self) -> (f64, f64, f64, f64) {
        (self.x0, self.y0, self.width, self.height)
    }

    fn overlap_extent(&self, other: &Rect) -> (f64, f64) {
        let w = self.x1.min(other.x1) - self.x0.max(other.x0);
        let h = self.y1.min(other.y1) - self.y0.max(other.y0);
        (w, h)
    }

    /// True if the two boxes share a region of positive area
    pub fn intersects(&self, other: &Rect) -> bool {
        let (w, h) = self.overlap_extent(other);
        w > 0.0 && h > 0.0
    }

    /// True if this box lies within `other`, edges included
    pub fn is_inside(&self, other: &Rect) -> bool {
        self.x0 >= other.x0 && self.x1 <= other.x1 && self.y0 >= other.y0 && self.y1 <= other.y1
    }

    /// True if the center of this box lies strictly inside `other`
    pub fn center_is_inside(&self, other: &Rect) -> bool {
        self.xc > other.x0 && self.xc < other.x1 && self.yc > other.y0 && self.yc < other.y1
    }

    /// Area of the shared region, zero when the boxes do not overlap
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let (w, h) = self.overlap_extent(other);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        w * h
    }

    /// Intersection over union, rounded
    pub fn iou(&self, other: &Rect) -> f64 {
        iou(self.intersection_area(other), self.area, other.area)
    }

    /// Intersection over the smaller area, rounded
    pub fn iom(&self, other: &Rect) -> f64 {
        iom(self.intersection_area(other), self.area, other.area)
    }
}

/// Jaccard index from a precomputed intersection
pub fn iou(intersection: f64, area_a: f64, area_b: f64) -> f64 {
    round5(intersection / (area_a + area_b - intersection))
}

/// Intersection over minimum area from a precomputed intersection
pub fn iom(intersection: f64, area_a: f64, area_b: f64) -> f64 {
    round5(intersection / area_a.min(area_b))
}

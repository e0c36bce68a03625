//! Axis-aligned bounding boxes in XYXY pixel format.

use serde::{Deserialize, Serialize};

use super::coord::Point;

/// An axis-aligned bounding box in XYXY format (xmin, ymin, xmax, ymax).
///
/// Note: This type does NOT enforce that min < max in the constructor,
/// allowing "malformed" boxes to exist in the model. Validation reports
/// these rather than the editor refusing to hold them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from min and max corners.
    #[inline]
    pub fn new(min: Point, max: Point) -> Self {
        Self::from_xyxy(min.x, min.y, max.x, max.y)
    }

    /// Creates a new bounding box from explicit coordinates.
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Converts from XYWH format (x, y, width, height) where (x, y) is the top-left corner.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(x, y, x + width, y + height)
    }

    /// Returns the top-left corner.
    #[inline]
    pub fn min(&self) -> Point {
        Point::new(self.xmin, self.ymin)
    }

    /// Returns the bottom-right corner.
    #[inline]
    pub fn max(&self) -> Point {
        Point::new(self.xmax, self.ymax)
    }

    /// Returns the width of the bounding box.
    ///
    /// May be negative if the box is malformed (xmax < xmin).
    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Returns the height of the bounding box.
    ///
    /// May be negative if the box is malformed (ymax < ymin).
    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Returns true if all coordinates are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min().is_finite() && self.max().is_finite()
    }

    /// Returns true if the box is properly ordered (min <= max for both axes).
    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.xmin <= self.xmax && self.ymin <= self.ymax
    }

    /// Smallest box enclosing all `points`, or `None` for an empty slice.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self::new(*first, *first);
        Some(points[1..].iter().fold(init, |acc, p| {
            Self::from_xyxy(
                acc.xmin.min(p.x),
                acc.ymin.min(p.y),
                acc.xmax.max(p.x),
                acc.ymax.max(p.y),
            )
        }))
    }
}

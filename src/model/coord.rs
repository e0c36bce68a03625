//! Pixel-space points and coordinate rounding.

use serde::{Deserialize, Serialize};

/// A 2D point in image pixel coordinates.
///
/// Values are kept in double precision; only export formats that require
/// integers round them (see [`round_half_up`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new point with the given x and y values.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns true if both coordinates are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Rounds to the nearest integer, with ties going towards positive infinity.
///
/// `f64::round` rounds ties away from zero, which disagrees for negative
/// halves (`-2.5` -> `-3`); VOC output uses `-2.5` -> `-2`.
#[inline]
pub fn round_half_up(value: f64) -> f64 {
    // `(value + 0.5).floor()` is off by one when the sum itself rounds up.
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

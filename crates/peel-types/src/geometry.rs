//! 2D points for node placement and hull computation.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A position on the editor canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// The canvas origin.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Vector from `self` to `other`.
    pub fn to(self, other: Self) -> Self {
        Self {
            x: other.x - self.x,
            y: other.y - self.y,
        }
    }

    /// 2D cross product of the vectors `self→b` and `self→c`.
    ///
    /// Positive when `c` lies counter-clockwise of the ray `self→b`, zero
    /// when the three points are collinear.
    // Unfused on purpose: identical products must cancel to exactly zero.
    #[allow(clippy::suboptimal_flops)]
    pub fn cross(self, b: Self, c: Self) -> f64 {
        let u = self.to(b);
        let v = self.to(c);
        u.x * v.y - u.y * v.x
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_squared(self, other: Self) -> f64 {
        let d = self.to(other);
        d.x.mul_add(d.x, d.y * d.y)
    }

    /// Order by `x`, then by `y`, using the IEEE total order so NaN sorts
    /// deterministically instead of breaking the sort.
    pub fn lexicographic_cmp(&self, other: &Self) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

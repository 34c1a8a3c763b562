//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

use crate::vector::Vector;

/// Axis-aligned rectangle given by its lower-left corner and its extent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box containing all `points`. `None` for an empty slice.
    pub fn from_points(points: &[Vector]) -> Option<Self> {
        let first = points.first()?;
        let (mut min, mut max) = (*first, *first);
        for p in &points[1..] {
            min = Vector::new(min.x.min(p.x), min.y.min(p.y));
            max = Vector::new(max.x.max(p.x), max.y.max(p.y));
        }
        Some(Self::new(min.x, min.y, max.x - min.x, max.y - min.y))
    }

    pub fn position(&self) -> Vector {
        Vector::new(self.x, self.y)
    }

    pub fn x_left(&self) -> f64 {
        self.x
    }

    pub fn x_right(&self) -> f64 {
        self.x + self.width
    }

    pub fn y_bottom(&self) -> f64 {
        self.y
    }

    pub fn y_top(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Vector {
        Vector::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn move_by(&self, delta: Vector) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }

    pub fn at_position(&self, x: f64, y: f64) -> Self {
        Self::new(x, y, self.width, self.height)
    }

    /// Same size, centred on `point`.
    pub fn with_center(&self, point: Vector) -> Self {
        Self::new(
            point.x - self.width / 2.0,
            point.y - self.height / 2.0,
            self.width,
            self.height,
        )
    }

    /// Grows the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Smallest box containing both boxes.
    pub fn smallest_common(&self, other: &Bounds) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.x_right().max(other.x_right());
        let top = self.y_top().max(other.y_top());
        Self::new(x, y, right - x, top - y)
    }

    /// Edges count as inside.
    pub fn contains(&self, point: Vector) -> bool {
        point.x >= self.x
            && point.x <= self.x_right()
            && point.y >= self.y
            && point.y <= self.y_top()
    }

    pub fn contains_bounds(&self, inner: &Bounds) -> bool {
        inner.x >= self.x
            && inner.y >= self.y
            && inner.x_right() <= self.x_right()
            && inner.y_top() <= self.y_top()
    }

    /// True when the interiors overlap; touching edges do not count.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.x_right()
            && other.x < self.x_right()
            && self.y < other.y_top()
            && other.y < self.y_top()
    }

    /// Moves `point` onto the nearest location inside the box.
    pub fn clamp_point(&self, point: Vector) -> Vector {
        Vector::new(
            point.x.clamp(self.x, self.x_right().max(self.x)),
            point.y.clamp(self.y, self.y_top().max(self.y)),
        )
    }

    /// Corners, counter-clockwise from the lower-left one.
    pub fn points(&self) -> [Vector; 4] {
        [
            Vector::new(self.x, self.y),
            Vector::new(self.x_right(), self.y),
            Vector::new(self.x_right(), self.y_top()),
            Vector::new(self.x, self.y_top()),
        ]
    }
}

//! Immutable 2D vector.

use std::f64::consts::PI;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Immutable pair of coordinates. All operations return new values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const NULL: Vector = Vector::new(0.0, 0.0);
    pub const RIGHT: Vector = Vector::new(1.0, 0.0);
    pub const LEFT: Vector = Vector::new(-1.0, 0.0);
    pub const UP: Vector = Vector::new(0.0, 1.0);
    pub const DOWN: Vector = Vector::new(0.0, -1.0);

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Vector pointing from `start` to `end`.
    pub fn between(start: Vector, end: Vector) -> Self {
        end - start
    }

    /// Unit vector with the given angle in radians, measured from the x axis.
    pub fn from_angle(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin)
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn manhattan_length(self) -> f64 {
        self.x.abs() + self.y.abs()
    }

    pub fn distance(self, other: Vector) -> f64 {
        (other - self).length()
    }

    /// Returns the unit vector in the same direction.
    ///
    /// The null vector has no direction and normalizes to itself.
    pub fn normalize(self) -> Self {
        let length = self.length();
        if length == 0.0 {
            return self;
        }
        self / length
    }

    pub fn multiply(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    pub fn multiply_x(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y)
    }

    pub fn multiply_y(self, factor: f64) -> Self {
        Self::new(self.x, self.y * factor)
    }

    pub fn negate_x(self) -> Self {
        Self::new(-self.x, self.y)
    }

    pub fn negate_y(self) -> Self {
        Self::new(self.x, -self.y)
    }

    /// Counter-clockwise rotation by `angle` radians.
    pub fn rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Counter-clockwise perpendicular.
    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn dot(self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Scalar 2D cross product (z component of the 3D cross product).
    pub fn cross(self, other: Vector) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Angle to the x axis in radians, in `(-PI, PI]`.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Unsigned angle between two vectors in radians.
    pub fn angle_to(self, other: Vector) -> f64 {
        let denominator = self.length() * other.length();
        if denominator == 0.0 {
            return 0.0;
        }
        (self.dot(other) / denominator).clamp(-1.0, 1.0).acos()
    }

    /// Angle in degrees in `[0, 360)`.
    pub fn degrees(self) -> f64 {
        let degrees = self.angle() * 180.0 / PI;
        if degrees < 0.0 { degrees + 360.0 } else { degrees }
    }

    pub fn lerp(self, other: Vector, t: f64) -> Self {
        self + (other - self) * t
    }

    pub fn is_null(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn is_nan(self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn is_integral(self) -> bool {
        self.x.fract() == 0.0 && self.y.fract() == 0.0
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        self.multiply(rhs)
    }
}

impl Div<f64> for Vector {
    type Output = Vector;

    fn div(self, rhs: f64) -> Vector {
        Vector::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

impl From<(f64, f64)> for Vector {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}|{:.2})", self.x, self.y)
    }
}

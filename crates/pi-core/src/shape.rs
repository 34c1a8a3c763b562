//! Closed set of actor geometries.
//!
//! All coordinates are local to the actor: the actor's position is the
//! lower-left corner of [`Shape::local_bounds`] and rotation pivots about
//! [`Shape::centroid`].

use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::resources::ImageHandle;
use crate::vector::Vector;

/// Visual geometry of an actor, also the source of its collision shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle {
        radius: f64,
    },
    Rectangle {
        width: f64,
        height: f64,
    },
    /// Points are taken as given; collision uses their convex hull.
    Polygon {
        points: Vec<Vector>,
    },
    /// Frame animation drawn into a `width` × `height` box.
    Sprite {
        frames: Vec<ImageHandle>,
        width: f64,
        height: f64,
        frame_duration: f64,
    },
}

impl Shape {
    pub fn circle(radius: f64) -> Self {
        Self::Circle { radius }
    }

    pub fn rectangle(width: f64, height: f64) -> Self {
        Self::Rectangle { width, height }
    }

    /// Polygon shifted so its bounding box starts at the local origin.
    pub fn polygon(points: Vec<Vector>) -> Self {
        let offset = Bounds::from_points(&points)
            .map(|b| b.position())
            .unwrap_or_default();
        Self::Polygon {
            points: points.into_iter().map(|p| p - offset).collect(),
        }
    }

    pub fn triangle(a: Vector, b: Vector, c: Vector) -> Self {
        Self::polygon(vec![a, b, c])
    }

    pub fn sprite(frames: Vec<ImageHandle>, width: f64, height: f64, frame_duration: f64) -> Self {
        Self::Sprite {
            frames,
            width,
            height,
            frame_duration,
        }
    }

    pub fn local_bounds(&self) -> Bounds {
        match self {
            Self::Circle { radius } => Bounds::new(0.0, 0.0, 2.0 * radius, 2.0 * radius),
            Self::Rectangle { width, height } | Self::Sprite { width, height, .. } => {
                Bounds::new(0.0, 0.0, *width, *height)
            }
            Self::Polygon { points } => Bounds::from_points(points).unwrap_or_default(),
        }
    }

    /// Outline vertices, counter-clockwise. Empty for circles.
    pub fn outline(&self) -> Vec<Vector> {
        match self {
            Self::Circle { .. } => Vec::new(),
            Self::Rectangle { .. } | Self::Sprite { .. } => self.local_bounds().points().to_vec(),
            Self::Polygon { points } => {
                let mut points = points.clone();
                if signed_area(&points) < 0.0 {
                    points.reverse();
                }
                points
            }
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Self::Circle { radius } => std::f64::consts::PI * radius * radius,
            Self::Rectangle { width, height } | Self::Sprite { width, height, .. } => {
                width * height
            }
            Self::Polygon { points } => signed_area(points).abs(),
        }
    }

    /// Geometric centre in local coordinates.
    pub fn centroid(&self) -> Vector {
        match self {
            Self::Polygon { points } => polygon_centroid(points),
            _ => self.local_bounds().center(),
        }
    }

    /// Second moment of area about the centroid, per unit density.
    pub fn unit_inertia(&self) -> f64 {
        match self {
            Self::Circle { radius } => {
                let r2 = radius * radius;
                std::f64::consts::PI * r2 * r2 / 2.0
            }
            Self::Rectangle { width, height } | Self::Sprite { width, height, .. } => {
                width * height * (width * width + height * height) / 12.0
            }
            Self::Polygon { points } => polygon_inertia(points),
        }
    }

    pub fn contains_local(&self, point: Vector) -> bool {
        match self {
            Self::Circle { radius } => {
                point.distance(Vector::new(*radius, *radius)) <= *radius
            }
            Self::Rectangle { .. } | Self::Sprite { .. } => self.local_bounds().contains(point),
            Self::Polygon { points } => polygon_contains(points, point),
        }
    }
}

pub(crate) fn signed_area(points: &[Vector]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        sum += p.cross(q);
    }
    sum / 2.0
}

fn polygon_centroid(points: &[Vector]) -> Vector {
    let area = signed_area(points);
    if area == 0.0 {
        let n = points.len().max(1);
        #[allow(clippy::cast_precision_loss)]
        let n = n as f64;
        return points.iter().fold(Vector::NULL, |acc, p| acc + *p) / n;
    }
    let mut c = Vector::NULL;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        c = c + (*p + q) * p.cross(q);
    }
    c / (6.0 * area)
}

fn polygon_inertia(points: &[Vector]) -> f64 {
    let centroid = polygon_centroid(points);
    let mut numerator = 0.0;
    for (i, p) in points.iter().enumerate() {
        let a = *p - centroid;
        let b = points[(i + 1) % points.len()] - centroid;
        let cross = a.cross(b);
        numerator += cross * (a.dot(a) + a.dot(b) + b.dot(b));
    }
    (numerator / 12.0).abs()
}

fn polygon_contains(points: &[Vector], point: Vector) -> bool {
    // Even-odd rule, valid for concave outlines too.
    let mut inside = false;
    let n = points.len();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + n - 1) % n];
        if (a.y > point.y) != (b.y > point.y) {
            let x = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

//! Collision geometry: actor shapes as rapier colliders.
//!
//! A collider is centred on its shape's centroid, which is also the origin
//! of the actor's rigid body.

#![allow(clippy::cast_possible_truncation)]

use rapier2d::parry::query;
use rapier2d::prelude::{
    ActiveEvents, CoefficientCombineRule, Collider, ColliderBuilder, SharedShape,
    Vector as RapierVector,
};

use crate::actor::ActorInner;
use crate::physics::body::PhysicsBody;
use crate::shape::Shape;
use crate::vector::Vector;

/// Half extent used for shapes without area, so rapier never sees an empty box.
const MIN_HALF_EXTENT: f32 = 1e-3;

pub(crate) fn to_rapier(v: Vector) -> RapierVector {
    RapierVector::new(v.x as f32, v.y as f32)
}

pub(crate) fn from_rapier(v: RapierVector) -> Vector {
    Vector::new(f64::from(v.x), f64::from(v.y))
}

/// Shapes that can take part in collision detection.
pub trait Collidable {
    /// Collision shape relative to the centroid.
    fn collision_shape(&self) -> SharedShape;
}

impl Collidable for Shape {
    fn collision_shape(&self) -> SharedShape {
        match self {
            Shape::Circle { radius } => SharedShape::ball((*radius as f32).max(MIN_HALF_EXTENT)),
            Shape::Rectangle { .. } | Shape::Sprite { .. } => bounds_box(self),
            Shape::Polygon { points } => {
                let centroid = self.centroid();
                let local: Vec<RapierVector> = points.iter().map(|p| to_rapier(*p - centroid)).collect();
                SharedShape::convex_hull(&local).unwrap_or_else(|| bounds_box(self))
            }
        }
    }
}

fn bounds_box(shape: &Shape) -> SharedShape {
    let bounds = shape.local_bounds();
    SharedShape::cuboid(
        (bounds.width as f32 / 2.0).max(MIN_HALF_EXTENT),
        (bounds.height as f32 / 2.0).max(MIN_HALF_EXTENT),
    )
}

/// Collider for a registered body, carrying the body's material.
pub(crate) fn body_collider(shape: &Shape, body: &PhysicsBody) -> Collider {
    ColliderBuilder::new(shape.collision_shape())
        .density(body.density().max(0.0) as f32)
        .friction(body.friction() as f32)
        .restitution(body.restitution() as f32)
        .restitution_combine_rule(CoefficientCombineRule::Max)
        .sensor(body.is_sensor())
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build()
}

/// Free-standing collider at the actor's current pose, for queries outside
/// the simulation.
pub(crate) fn placed_collider(state: &ActorInner) -> Collider {
    let pose = state.pose();
    ColliderBuilder::new(state.shape.collision_shape())
        .translation(to_rapier(pose.position + pose.pivot))
        .rotation(pose.rotation as f32)
        .build()
}

/// Axis-aligned box collider covering `min` to `max`.
pub(crate) fn box_collider(min: Vector, max: Vector) -> Collider {
    let half = (max - min) / 2.0;
    ColliderBuilder::cuboid(
        (half.x as f32).max(MIN_HALF_EXTENT),
        (half.y as f32).max(MIN_HALF_EXTENT),
    )
    .translation(to_rapier(min + half))
    .build()
}

/// Whether two colliders overlap or touch.
pub(crate) fn intersects(a: &Collider, b: &Collider) -> bool {
    query::intersection_test(a.position(), a.shape(), b.position(), b.shape()).unwrap_or(false)
}

/// Placement of an actor's shape in the world. `pivot` is the local rotation
/// centre, `position` the world location of the local origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Pose {
    pub position: Vector,
    pub rotation: f64,
    pub pivot: Vector,
}

impl Pose {
    pub fn to_world(&self, local: Vector) -> Vector {
        self.position + self.pivot + (local - self.pivot).rotate(self.rotation)
    }

    /// Inverse of [`Pose::to_world`].
    pub fn to_local(&self, world: Vector) -> Vector {
        self.pivot + (world - self.position - self.pivot).rotate(-self.rotation)
    }
}

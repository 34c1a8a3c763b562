//! Rigid body simulation: bodies, collision detection, joints and the world
//! that steps them.

pub mod body;
pub mod collision;
pub mod joint;
pub mod world;

pub use body::{BodyType, PhysicsBody};
pub use collision::Collidable;
pub use joint::{Joint, JointId, JointKind};
pub use world::{ContactEvent, ContactPhase, PHYSICS_DT, PhysicsWorld, WorldSettings};

//! Engine Pi core
//!
//! A small 2D engine for teaching: actors with shapes and rigid bodies live
//! in scenes, react to input, frame and collision events through closures,
//! and are drawn through a camera by a host-provided renderer.
//!
//! World coordinates are in meters with y pointing up. A scene owns its
//! physics world, camera and scene-wide listeners; a [`GameLoop`] drives one
//! scene at a time.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod actor;
pub mod bounds;
pub mod camera;
pub mod config;
pub mod error;
pub mod event;
pub mod game_loop;
pub mod listener;
pub mod physics;
pub mod render;
pub mod resources;
pub mod scene;
pub mod shape;
pub mod task;
pub mod vector;

#[cfg(test)]
mod test_utils;

pub use actor::{Actor, ActorId, ActorSnapshot, WeakActor};
pub use bounds::Bounds;
pub use camera::{Camera, ScreenTransform};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use event::{
    CollisionEvent, EventQueue, InputEvent, Key, KeyEvent, MouseAction, MouseButton, MouseEvent,
};
pub use game_loop::{GameLoop, Host};
pub use listener::ListenerId;
pub use physics::{BodyType, Joint, JointKind, PhysicsBody, PhysicsWorld};
pub use render::{DrawCommand, Renderable, Renderer};
pub use resources::{Color, ResourceRegistry};
pub use scene::{Scene, SceneId, SceneSnapshot};
pub use shape::Shape;
pub use task::PeriodicTask;
pub use vector::Vector;

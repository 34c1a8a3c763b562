//! Per-actor physical state.

use serde::{Deserialize, Serialize};

use crate::vector::Vector;

pub const DEFAULT_DENSITY: f64 = 10.0;
pub const DEFAULT_FRICTION: f64 = 0.0;
pub const DEFAULT_RESTITUTION: f64 = 0.5;

/// How a body takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves. Infinite mass in collisions.
    #[default]
    Static,
    /// Moves with its velocity, ignores forces and collisions.
    Kinematic,
    /// Fully simulated.
    Dynamic,
}

/// Physical representation of one actor.
///
/// The body lives inside its actor and is only simulated while the actor is
/// live in a scene. A fresh body is a static sensor: it reports overlaps but
/// never pushes anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBody {
    body_type: BodyType,
    sensor: bool,
    density: f64,
    friction: f64,
    restitution: f64,
    gravity_scale: f64,
    linear_damping: f64,
    angular_damping: f64,
    rotation_locked: bool,
    velocity: Vector,
    angular_velocity: f64,
    force: Vector,
    torque: f64,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            sensor: true,
            density: DEFAULT_DENSITY,
            friction: DEFAULT_FRICTION,
            restitution: DEFAULT_RESTITUTION,
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            rotation_locked: false,
            velocity: Vector::NULL,
            angular_velocity: 0.0,
            force: Vector::NULL,
            torque: 0.0,
        }
    }
}

impl PhysicsBody {
    pub fn new(body_type: BodyType) -> Self {
        let mut body = Self::default();
        body.set_body_type(body_type);
        body
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Always legal. A collision-capable body type clears the sensor flag,
    /// switching to [`BodyType::Static`] also stops all motion.
    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.body_type = body_type;
        self.sensor = false;
        if body_type == BodyType::Static {
            self.velocity = Vector::NULL;
            self.angular_velocity = 0.0;
            self.clear_forces();
        }
        if body_type == BodyType::Kinematic {
            self.clear_forces();
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    /// Sensors report contacts but are never pushed and never push.
    pub fn set_sensor(&mut self, sensor: bool) {
        self.sensor = sensor;
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    /// Non-positive densities are accepted here and rejected when a dynamic
    /// body is registered with a physics world.
    pub fn set_density(&mut self, density: f64) {
        self.density = density;
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f64) {
        self.friction = friction.max(0.0);
    }

    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f64) {
        self.restitution = restitution.clamp(0.0, 1.0);
    }

    pub fn gravity_scale(&self) -> f64 {
        self.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: f64) {
        self.gravity_scale = scale;
    }

    pub fn linear_damping(&self) -> f64 {
        self.linear_damping
    }

    pub fn set_linear_damping(&mut self, damping: f64) {
        self.linear_damping = damping.max(0.0);
    }

    pub fn angular_damping(&self) -> f64 {
        self.angular_damping
    }

    pub fn set_angular_damping(&mut self, damping: f64) {
        self.angular_damping = damping.max(0.0);
    }

    pub fn is_rotation_locked(&self) -> bool {
        self.rotation_locked
    }

    pub fn set_rotation_locked(&mut self, locked: bool) {
        self.rotation_locked = locked;
        if locked {
            self.angular_velocity = 0.0;
            self.torque = 0.0;
        }
    }

    pub fn velocity(&self) -> Vector {
        self.velocity
    }

    /// Permitted for every body type; kinematic bodies are driven this way.
    /// A static body keeps the value but does not move.
    pub fn set_velocity(&mut self, velocity: Vector) {
        self.velocity = velocity;
    }

    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: f64) {
        if !self.rotation_locked {
            self.angular_velocity = angular_velocity;
        }
    }

    /// Accumulated force for the next step.
    pub fn force(&self) -> Vector {
        self.force
    }

    pub fn torque(&self) -> f64 {
        self.torque
    }

    /// Adds to the force buffer. Silently ignored unless dynamic.
    pub fn apply_force(&mut self, force: Vector) {
        if self.is_dynamic() {
            self.force = self.force + force;
        }
    }

    /// Adds to the torque buffer. Silently ignored unless dynamic.
    pub fn apply_torque(&mut self, torque: f64) {
        if self.is_dynamic() && !self.rotation_locked {
            self.torque += torque;
        }
    }

    /// Immediate velocity change of `impulse / mass`. Silently ignored unless
    /// dynamic with positive mass.
    pub fn apply_impulse(&mut self, impulse: Vector, mass: f64) {
        if self.is_dynamic() && mass > 0.0 {
            self.velocity = self.velocity + impulse / mass;
        }
    }

    pub fn apply_angular_impulse(&mut self, impulse: f64, inertia: f64) {
        if self.is_dynamic() && !self.rotation_locked && inertia > 0.0 {
            self.angular_velocity += impulse / inertia;
        }
    }

    pub fn clear_forces(&mut self) {
        self.force = Vector::NULL;
        self.torque = 0.0;
    }

    /// Stops all motion and drops pending forces.
    pub fn reset_movement(&mut self) {
        self.velocity = Vector::NULL;
        self.angular_velocity = 0.0;
        self.clear_forces();
    }
}

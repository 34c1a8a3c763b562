//! Deterministic fixed-step physics for the actors of one scene, using
//! `Rapier2D`.

#![allow(clippy::cast_possible_truncation)]

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use rapier2d::prelude::{
    CCDSolver, ColliderHandle, ColliderSet, ContactPair, DefaultBroadPhase, EventHandler,
    FixedJointBuilder, GenericJoint, ImpulseJointHandle, ImpulseJointSet, IntegrationParameters,
    IslandManager, JointAxis, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    PrismaticJointBuilder, RevoluteJointBuilder, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
    RigidBodyType, RopeJointBuilder, Rotation,
};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorId, ActorInner};
use crate::error::{EngineError, Result};
use crate::physics::body::{BodyType, PhysicsBody};
use crate::physics::collision::{
    body_collider, box_collider, from_rapier, intersects, placed_collider, to_rapier,
};
use crate::physics::joint::{Joint, JointId, JointKind};
use crate::vector::Vector;

/// Fixed timestep of one physics step (125 Hz).
pub const PHYSICS_DT: f64 = 0.008;

/// Distance below an actor's bounds still counted as standing on something.
const GROUND_TOLERANCE: f64 = 0.01;

/// Solver parameters of a world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    pub step: f64,
    /// Solver substeps per step.
    pub substeps: usize,
    /// Upper bound for the linear speed of any body.
    pub max_speed: f64,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            step: PHYSICS_DT,
            substeps: 4,
            max_speed: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactPhase {
    Begin,
    End,
}

/// Change in the touching state of two registered actors. For
/// [`ContactPhase::Begin`] the normal points from `a` towards `b`; for
/// [`ContactPhase::End`] and for sensors it is null.
#[derive(Debug, Clone)]
pub struct ContactEvent {
    pub a: Actor,
    pub b: Actor,
    pub phase: ContactPhase,
    pub normal: Vector,
    pub depth: f64,
}

/// Body properties whose change makes rapier recompute mass data.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Material {
    density: f64,
    sensor: bool,
    rotation_locked: bool,
}

impl Material {
    fn of(body: &PhysicsBody) -> Self {
        Self {
            density: body.density(),
            sensor: body.is_sensor(),
            rotation_locked: body.is_rotation_locked(),
        }
    }
}

struct Registration {
    id: ActorId,
    actor: Actor,
    body: RigidBodyHandle,
    collider: ColliderHandle,
    /// Pose last exchanged with rapier; a different actor pose is a teleport.
    synced: Option<(Vector, f64)>,
    last_finite: (Vector, f64),
    material: Option<Material>,
    massless_warned: bool,
}

struct RawContact {
    a: u64,
    b: u64,
    started: bool,
    normal: Vector,
    depth: f64,
}

/// Collects rapier's collision events of one step, already mapped to
/// registration keys. Colliders removed since the last step are skipped.
#[derive(Default)]
struct ContactCollector {
    raw: Mutex<Vec<RawContact>>,
}

impl ContactCollector {
    fn into_raw(self) -> Vec<RawContact> {
        self.raw.into_inner()
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: rapier2d::prelude::CollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        let (h1, h2, started) = match event {
            rapier2d::prelude::CollisionEvent::Started(h1, h2, _flags) => (h1, h2, true),
            rapier2d::prelude::CollisionEvent::Stopped(h1, h2, _flags) => (h1, h2, false),
        };
        let (Some(a), Some(b)) = (
            collider_key(bodies, colliders, h1),
            collider_key(bodies, colliders, h2),
        ) else {
            return;
        };
        let (normal, depth) = match contact_pair {
            Some(pair) if started => contact_geometry(pair, h1),
            _ => (Vector::NULL, 0.0),
        };
        self.raw.lock().push(RawContact {
            a,
            b,
            started,
            normal,
            depth,
        });
    }

    fn handle_contact_force_event(
        &self,
        _dt: f32,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: f32,
    ) {
    }
}

/// Maps a collider to the registration key stored in its parent body.
fn collider_key(bodies: &RigidBodySet, colliders: &ColliderSet, handle: ColliderHandle) -> Option<u64> {
    let parent = colliders.get(handle)?.parent()?;
    let key = u64::try_from(bodies.get(parent)?.user_data).ok()?;
    (key != 0).then_some(key)
}

/// Normal from `first` towards the other collider, and the deepest
/// penetration of the pair.
fn contact_geometry(pair: &ContactPair, first: ColliderHandle) -> (Vector, f64) {
    let Some(manifold) = pair
        .manifolds
        .iter()
        .find(|m| !m.points.is_empty())
        .or_else(|| pair.manifolds.first())
    else {
        return (Vector::NULL, 0.0);
    };
    let normal = from_rapier(manifold.data.normal);
    let normal = if pair.collider1 == first { normal } else { -normal };
    let depth = manifold
        .points
        .iter()
        .map(|point| f64::from(-point.dist))
        .fold(0.0, f64::max);
    (normal, depth)
}

/// The physics simulation of one scene.
///
/// Bodies live inside their actors. Every registered actor owns one rapier
/// body and collider; before each step the actor state is pushed into
/// rapier, afterwards the integrated state is written back.
pub struct PhysicsWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    entries: BTreeMap<u64, Registration>,
    keys: HashMap<ActorId, u64>,
    next_key: u64,
    joints: Vec<(Joint, ImpulseJointHandle)>,
    touching: BTreeSet<(u64, u64)>,
    gravity: Vector,
    settings: WorldSettings,
    accumulator: f64,
    paused: bool,
    frame: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("frame", &self.frame)
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .field("joint_count", &self.joints.len())
            .field("gravity", &self.gravity)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Creates a world without gravity.
    pub fn new() -> Self {
        Self::with_settings(Vector::NULL, WorldSettings::default())
    }

    pub fn with_gravity(gravity: Vector) -> Self {
        Self::with_settings(gravity, WorldSettings::default())
    }

    pub fn with_settings(gravity: Vector, settings: WorldSettings) -> Self {
        let mut integration_parameters = IntegrationParameters {
            dt: settings.step as f32,
            ..Default::default()
        };
        if let Ok(substeps) = settings.substeps.try_into() {
            integration_parameters.num_solver_iterations = substeps;
        }

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            entries: BTreeMap::new(),
            keys: HashMap::new(),
            next_key: 1,
            joints: Vec::new(),
            touching: BTreeSet::new(),
            gravity,
            settings,
            accumulator: 0.0,
            paused: false,
            frame: 0,
        }
    }

    pub fn gravity(&self) -> Vector {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector) {
        self.gravity = gravity;
    }

    pub fn settings(&self) -> WorldSettings {
        self.settings
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// A paused world ignores [`PhysicsWorld::advance`]; explicit steps
    /// still run.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.accumulator = 0.0;
    }

    /// Registers the actor's body. Registering twice is a no-op.
    ///
    /// Fails for a dynamic body without positive mass.
    pub fn register(&mut self, actor: &Actor) -> Result<()> {
        let id = actor.id();
        if self.is_registered(id) {
            return Ok(());
        }
        let key = self.next_key;
        let (rigid_body, collider, pose) = {
            let state = actor.state();
            let mass = state.mass();
            if state.body.is_dynamic() && !(mass > 0.0 && mass.is_finite()) {
                return Err(EngineError::ZeroMass {
                    actor: id,
                    density: state.body.density(),
                    area: state.shape.area(),
                });
            }
            let pose = (state.position, state.rotation);
            let rigid_body = RigidBodyBuilder::fixed()
                .translation(to_rapier(state.position + state.shape.centroid()))
                .rotation(state.rotation as f32)
                .can_sleep(false)
                .user_data(u128::from(key))
                .build();
            (rigid_body, body_collider(&state.shape, &state.body), pose)
        };

        let body = self.rigid_body_set.insert(rigid_body);
        let collider = self
            .collider_set
            .insert_with_parent(collider, body, &mut self.rigid_body_set);
        let finite = pose.0.is_finite() && pose.1.is_finite();
        let mut entry = Registration {
            id,
            actor: actor.clone(),
            body,
            collider,
            synced: Some(pose),
            last_finite: if finite { pose } else { (Vector::NULL, 0.0) },
            material: None,
            massless_warned: false,
        };
        push_entry(
            &mut entry,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            self.settings.max_speed,
            self.frame,
        );
        self.entries.insert(key, entry);
        self.keys.insert(id, key);
        self.next_key += 1;
        tracing::debug!("[physics] registered body of actor {id}");
        Ok(())
    }

    /// Returns `false` when the actor was not registered. Contacts of the
    /// removed body end silently.
    pub fn unregister(&mut self, id: ActorId) -> bool {
        let Some(key) = self.keys.remove(&id) else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.rigid_body_set.remove(
                entry.body,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
        }
        self.touching.retain(|&(a, b)| a != key && b != key);
        tracing::debug!("[physics] unregistered body of actor {id}");
        true
    }

    pub fn is_registered(&self, id: ActorId) -> bool {
        self.keys.contains_key(&id)
    }

    pub fn body_count(&self) -> usize {
        self.entries.len()
    }

    /// Registered actors in registration order.
    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.entries.values().map(|e| &e.actor)
    }

    /// Whether the two actors are currently in contact.
    pub fn are_touching(&self, a: ActorId, b: ActorId) -> bool {
        match (self.keys.get(&a), self.keys.get(&b)) {
            (Some(&a), Some(&b)) => self.touching.contains(&(a.min(b), a.max(b))),
            _ => false,
        }
    }

    /// Whether a dynamic actor stands on a static, non-sensor actor: some
    /// static collider reaches into a thin strip along its lower edge.
    pub fn is_grounded(&self, id: ActorId) -> Result<bool> {
        let key = *self.keys.get(&id).ok_or(EngineError::ActorNotInScene(id))?;
        let entry = self.entries.get(&key).ok_or(EngineError::ActorNotInScene(id))?;
        if !entry.actor.with_body(PhysicsBody::is_dynamic) {
            return Err(EngineError::NotDynamic(id));
        }
        let bounds = entry.actor.bounds();
        let strip = box_collider(
            Vector::new(bounds.x_left(), bounds.y_bottom() - GROUND_TOLERANCE),
            Vector::new(bounds.x_right(), bounds.y_bottom() + GROUND_TOLERANCE),
        );
        Ok(self.entries.values().any(|other| {
            if other.id == id {
                return false;
            }
            let state = other.actor.state();
            state.body.is_static()
                && !state.body.is_sensor()
                && intersects(&strip, &placed_collider(&state))
        }))
    }

    /// Attaches the joint between its two registered actors.
    pub(crate) fn add_joint(&mut self, joint: Joint) -> Result<()> {
        let (a, b) = joint.actor_ids();
        let (Some(&key_a), Some(&key_b)) = (self.keys.get(&a), self.keys.get(&b)) else {
            return Err(EngineError::JointActorsNotColocated);
        };
        for key in [key_a, key_b] {
            if let Some(entry) = self.entries.get_mut(&key) {
                push_entry(
                    entry,
                    &mut self.rigid_body_set,
                    &mut self.collider_set,
                    self.settings.max_speed,
                    self.frame,
                );
            }
        }
        let (Some(entry_a), Some(entry_b)) = (self.entries.get(&key_a), self.entries.get(&key_b)) else {
            return Err(EngineError::JointActorsNotColocated);
        };
        let (anchor_a, anchor_b) = joint.anchors();
        let data = self
            .joint_data(joint.kind(), entry_a, anchor_a, entry_b, anchor_b)
            .ok_or(EngineError::JointActorsNotColocated)?;
        let (body_a, body_b) = (entry_a.body, entry_b.body);
        let handle = self.impulse_joint_set.insert(body_a, body_b, data, true);
        self.joints.push((joint, handle));
        Ok(())
    }

    /// Rapier joint data. Rapier anchors are relative to the body origins,
    /// which sit on the actors' pivots.
    fn joint_data(
        &self,
        kind: JointKind,
        a: &Registration,
        anchor_a: Vector,
        b: &Registration,
        anchor_b: Vector,
    ) -> Option<GenericJoint> {
        let (state_a, state_b) = (a.actor.state(), b.actor.state());
        let local_a = to_rapier(anchor_a - state_a.shape.centroid());
        let local_b = to_rapier(anchor_b - state_b.shape.centroid());

        let data = match kind {
            JointKind::Revolute => RevoluteJointBuilder::new()
                .local_anchor1(local_a)
                .local_anchor2(local_b)
                .build()
                .into(),
            JointKind::Distance { length } => {
                let length = length as f32;
                let mut rope = RopeJointBuilder::new(length)
                    .local_anchor1(local_a)
                    .local_anchor2(local_b)
                    .build();
                rope.data.set_limits(JointAxis::LinX, [length, length]);
                rope.into()
            }
            JointKind::Rope { max_length } => RopeJointBuilder::new(max_length as f32)
                .local_anchor1(local_a)
                .local_anchor2(local_b)
                .build()
                .into(),
            JointKind::Prismatic { axis, limits } => {
                let axis = axis.normalize();
                let mut builder = PrismaticJointBuilder::new(to_rapier(axis.rotate(-state_a.rotation)))
                    .local_axis2(to_rapier(axis.rotate(-state_b.rotation)))
                    .local_anchor1(local_a)
                    .local_anchor2(local_b);
                if let Some((min, max)) = limits {
                    builder = builder.limits([min as f32, max as f32]);
                }
                builder.build().into()
            }
            JointKind::Weld => {
                let body_a = self.rigid_body_set.get(a.body)?;
                let body_b = self.rigid_body_set.get(b.body)?;
                // Keeps the relative rotation the actors have right now.
                FixedJointBuilder::new()
                    .local_frame1(body_a.position().inverse() * *body_b.position())
                    .local_frame2(body_b.position().inverse() * *body_b.position())
                    .local_anchor1(local_a)
                    .local_anchor2(local_b)
                    .build()
                    .into()
            }
        };
        Some(data)
    }

    /// Joints not yet released.
    pub fn joints(&self) -> impl Iterator<Item = &Joint> {
        self.joints
            .iter()
            .map(|(joint, _)| joint)
            .filter(|j| !j.is_released())
    }

    pub(crate) fn take_joint(&mut self, id: JointId) -> Option<Joint> {
        let index = self.joints.iter().position(|(j, _)| j.id() == id)?;
        let (joint, handle) = self.joints.remove(index);
        self.impulse_joint_set.remove(handle, true);
        Some(joint)
    }

    /// Detaches every joint connected to the actor.
    pub(crate) fn take_joints_of(&mut self, id: ActorId) -> Vec<Joint> {
        self.take_joints_where(|joint| joint.connects(id))
    }

    pub(crate) fn take_all_joints(&mut self) -> Vec<Joint> {
        self.take_joints_where(|_| true)
    }

    fn take_joints_where(&mut self, pred: impl Fn(&Joint) -> bool) -> Vec<Joint> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.joints)
            .into_iter()
            .partition(|(joint, _)| pred(joint));
        self.joints = kept;
        taken
            .into_iter()
            .map(|(joint, handle)| {
                self.impulse_joint_set.remove(handle, true);
                joint
            })
            .collect()
    }

    /// Adds `elapsed` seconds to the accumulator and returns how many fixed
    /// steps are now due. Always zero while paused.
    pub fn accumulate(&mut self, elapsed: f64) -> u32 {
        if self.paused || elapsed.is_nan() || elapsed <= 0.0 {
            return 0;
        }
        self.accumulator += elapsed;
        let mut steps = 0;
        while self.accumulator >= self.settings.step {
            self.accumulator -= self.settings.step;
            steps += 1;
        }
        steps
    }

    /// Runs as many fixed steps as `elapsed` seconds cover and returns their
    /// contact events in order.
    pub fn advance(&mut self, elapsed: f64) -> Vec<ContactEvent> {
        let steps = self.accumulate(elapsed);
        self.step_n(steps)
    }

    pub fn step_n(&mut self, n: u32) -> Vec<ContactEvent> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(self.step());
        }
        events
    }

    /// Advances the simulation by one fixed timestep.
    pub fn step(&mut self) -> Vec<ContactEvent> {
        for joint in self.take_joints_where(Joint::is_released) {
            tracing::debug!("[physics] dropping released joint {}", joint.id());
        }

        let (max_speed, frame) = (self.settings.max_speed, self.frame);
        for entry in self.entries.values_mut() {
            push_entry(
                entry,
                &mut self.rigid_body_set,
                &mut self.collider_set,
                max_speed,
                frame,
            );
        }

        let collector = ContactCollector::default();
        self.physics_pipeline.step(
            to_rapier(self.gravity),
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &collector,
        );

        for entry in self.entries.values_mut() {
            pull_entry(entry, &self.rigid_body_set, max_speed, frame);
        }
        self.frame += 1;
        self.contact_events(collector.into_raw())
    }

    /// Turns raw rapier events into begin/end events, ends first, each
    /// group ordered by registration.
    fn contact_events(&mut self, raw: Vec<RawContact>) -> Vec<ContactEvent> {
        let mut ends = Vec::new();
        let mut begins = Vec::new();
        for contact in raw {
            let (pair, normal) = if contact.a <= contact.b {
                ((contact.a, contact.b), contact.normal)
            } else {
                ((contact.b, contact.a), -contact.normal)
            };
            if contact.started {
                if self.touching.insert(pair) {
                    begins.push((pair, normal, contact.depth));
                }
            } else if self.touching.remove(&pair) {
                ends.push(pair);
            }
        }
        ends.sort_unstable();
        begins.sort_by_key(|(pair, _, _)| *pair);

        let actor = |key: u64| self.entries.get(&key).map(|e| e.actor.clone());
        let mut events = Vec::with_capacity(ends.len() + begins.len());
        for (a, b) in ends {
            if let (Some(a), Some(b)) = (actor(a), actor(b)) {
                events.push(ContactEvent {
                    a,
                    b,
                    phase: ContactPhase::End,
                    normal: Vector::NULL,
                    depth: 0.0,
                });
            }
        }
        for ((a, b), normal, depth) in begins {
            if let (Some(a), Some(b)) = (actor(a), actor(b)) {
                events.push(ContactEvent {
                    a,
                    b,
                    phase: ContactPhase::Begin,
                    normal,
                    depth,
                });
            }
        }
        events
    }

    /// Computes a deterministic hash of the current physics state.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.frame.hash(&mut hasher);

        for (handle, body) in self.rigid_body_set.iter() {
            let (index, generation) = handle.into_raw_parts();
            index.hash(&mut hasher);
            generation.hash(&mut hasher);

            let pos = body.translation();
            hash_f32(pos.x, &mut hasher);
            hash_f32(pos.y, &mut hasher);
            hash_f32(body.rotation().angle(), &mut hasher);

            let linvel = body.linvel();
            hash_f32(linvel.x, &mut hasher);
            hash_f32(linvel.y, &mut hasher);
            hash_f32(body.angvel(), &mut hasher);
        }

        hasher.finish()
    }

    /// Returns the number of steps simulated so far.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }
}

fn hash_f32(value: f32, hasher: &mut impl Hasher) {
    value.to_bits().hash(hasher);
}

fn is_finite(state: &ActorInner) -> bool {
    let body = &state.body;
    state.position.is_finite()
        && state.rotation.is_finite()
        && body.velocity().is_finite()
        && body.angular_velocity().is_finite()
        && body.force().is_finite()
        && body.torque().is_finite()
}

fn clamped(velocity: Vector, max_speed: f64) -> Vector {
    let speed = velocity.length();
    if speed > max_speed {
        velocity * (max_speed / speed)
    } else {
        velocity
    }
}

/// Copies the actor's state into its rapier body and collider.
fn push_entry(
    entry: &mut Registration,
    bodies: &mut RigidBodySet,
    colliders: &mut ColliderSet,
    max_speed: f64,
    frame: u64,
) {
    let mut state = entry.actor.state_mut();
    if !is_finite(&state) {
        tracing::warn!(
            "[physics] actor {} has a non-finite state at frame {frame}, restoring {}",
            entry.id,
            entry.last_finite.0
        );
        (state.position, state.rotation) = entry.last_finite;
        state.body.reset_movement();
    }
    let velocity = clamped(state.body.velocity(), max_speed);
    state.body.set_velocity(velocity);

    let mass = state.mass();
    let massless = state.body.is_dynamic() && !(mass > 0.0 && mass.is_finite());
    if massless && !entry.massless_warned {
        tracing::warn!("[physics] dynamic actor {} has no mass, holding it in place", entry.id);
    }
    entry.massless_warned = massless;
    let body_type = match state.body.body_type() {
        BodyType::Dynamic if !massless => RigidBodyType::Dynamic,
        BodyType::Kinematic => RigidBodyType::KinematicVelocityBased,
        _ => RigidBodyType::Fixed,
    };

    let pose = (state.position, state.rotation);
    let pivot = state.shape.centroid();
    let body = &state.body;
    let material = Material::of(body);

    if let Some(collider) = colliders.get_mut(entry.collider) {
        if entry.material != Some(material) {
            collider.set_density(material.density.max(0.0) as f32);
            collider.set_sensor(material.sensor);
        }
        collider.set_friction(body.friction() as f32);
        collider.set_restitution(body.restitution() as f32);
    }
    let Some(rigid_body) = bodies.get_mut(entry.body) else {
        return;
    };
    if entry.material != Some(material) {
        rigid_body.lock_rotations(material.rotation_locked, true);
        entry.material = Some(material);
    }
    if rigid_body.body_type() != body_type {
        rigid_body.set_body_type(body_type, true);
    }
    if entry.synced != Some(pose) {
        rigid_body.set_translation(to_rapier(pose.0 + pivot), true);
        rigid_body.set_rotation(Rotation::from_angle(pose.1 as f32), true);
        entry.synced = Some(pose);
    }

    rigid_body.set_gravity_scale(body.gravity_scale() as f32, true);
    rigid_body.set_linear_damping(body.linear_damping() as f32);
    rigid_body.set_angular_damping(body.angular_damping() as f32);
    rigid_body.reset_forces(false);
    rigid_body.reset_torques(false);
    if body_type == RigidBodyType::Fixed {
        return;
    }
    rigid_body.set_linvel(to_rapier(velocity), true);
    rigid_body.set_angvel(body.angular_velocity() as f32, true);
    if body_type == RigidBodyType::Dynamic {
        rigid_body.add_force(to_rapier(body.force()), true);
        rigid_body.add_torque(body.torque() as f32, true);
    }
}

/// Writes the integrated state back into the actor, restoring the last
/// finite pose if the step produced garbage.
fn pull_entry(entry: &mut Registration, bodies: &RigidBodySet, max_speed: f64, frame: u64) {
    let mut state = entry.actor.state_mut();
    state.body.clear_forces();
    let Some(rigid_body) = bodies.get(entry.body) else {
        return;
    };
    if rigid_body.body_type() == RigidBodyType::Fixed {
        return;
    }

    let translation = rigid_body.translation();
    let center = Vector::new(f64::from(translation.x), f64::from(translation.y));
    let position = center - state.shape.centroid();
    let rotation = f64::from(rigid_body.rotation().angle());
    let linvel = rigid_body.linvel();
    let velocity = Vector::new(f64::from(linvel.x), f64::from(linvel.y));
    let angular_velocity = f64::from(rigid_body.angvel());

    let finite = position.is_finite()
        && rotation.is_finite()
        && velocity.is_finite()
        && angular_velocity.is_finite();
    if finite {
        state.position = position;
        state.rotation = rotation;
        state.body.set_velocity(clamped(velocity, max_speed));
        state.body.set_angular_velocity(angular_velocity);
        entry.synced = Some((position, rotation));
        entry.last_finite = (position, rotation);
    } else {
        tracing::warn!(
            "[physics] actor {} became unstable at frame {frame}, restoring {}",
            entry.id,
            entry.last_finite.0
        );
        (state.position, state.rotation) = entry.last_finite;
        state.body.reset_movement();
        entry.synced = None;
    }
}

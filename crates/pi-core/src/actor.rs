//! Actors: positioned, layered, renderable entities with a physics body.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bounds::Bounds;
use crate::event::{CollisionEvent, KeyEvent, MouseEvent};
use crate::listener::{
    CollisionListener, FrameUpdateListener, KeyListener, ListenerId, Listeners, MountListener,
    MouseListener, SeparationListener,
};
use crate::physics::body::{BodyType, PhysicsBody};
use crate::physics::collision::{Pose, intersects, placed_collider};
use crate::resources::Color;
use crate::scene::{Scene, SceneId};
use crate::shape::Shape;
use crate::vector::Vector;

/// Stable identity of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
pub(crate) struct ActorListeners {
    pub key: Listeners<KeyListener>,
    pub mouse: Listeners<MouseListener>,
    pub frame_update: Listeners<FrameUpdateListener>,
    pub collision: Listeners<CollisionListener>,
    pub collision_end: Listeners<SeparationListener>,
    pub mount: Listeners<MountListener>,
    pub unmount: Listeners<MountListener>,
}

impl ActorListeners {
    fn remove(&mut self, id: ListenerId) -> bool {
        self.key.remove(id)
            || self.mouse.remove(id)
            || self.frame_update.remove(id)
            || self.collision.remove(id)
            || self.collision_end.remove(id)
            || self.mount.remove(id)
            || self.unmount.remove(id)
    }
}

pub(crate) struct ActorInner {
    pub id: ActorId,
    pub name: Option<String>,
    pub shape: Shape,
    pub position: Vector,
    pub rotation: f64,
    pub layer: i32,
    pub visible: bool,
    pub opacity: f64,
    pub color: Color,
    pub body: PhysicsBody,
    pub scene: Option<SceneId>,
    pub animation_time: f64,
    pub listeners: ActorListeners,
}

impl ActorInner {
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            rotation: self.rotation,
            pivot: self.shape.centroid(),
        }
    }

    pub fn mass(&self) -> f64 {
        self.body.density() * self.shape.area()
    }

    pub fn inertia(&self) -> f64 {
        self.body.density() * self.shape.unit_inertia()
    }
}

/// Shared handle to an actor.
///
/// Cloning the handle does not clone the actor. An actor starts detached,
/// becomes live when added to a scene and can be live in at most one scene
/// at a time. It keeps its own listeners across removal and re-adding.
#[derive(Clone)]
pub struct Actor {
    inner: Rc<RefCell<ActorInner>>,
}

/// Non-owning actor reference, used by joints and the camera.
#[derive(Clone)]
pub struct WeakActor {
    id: ActorId,
    inner: Weak<RefCell<ActorInner>>,
}

impl WeakActor {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Actor> {
        self.inner.upgrade().map(|inner| Actor { inner })
    }
}

impl fmt::Debug for WeakActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakActor").field(&self.id).finish()
    }
}

impl PartialEq for Actor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Actor {}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Actor")
                .field("id", &inner.id)
                .field("name", &inner.name)
                .field("position", &inner.position)
                .field("layer", &inner.layer)
                .field("body_type", &inner.body.body_type())
                .finish_non_exhaustive(),
            Err(_) => f.write_str("Actor { <borrowed> }"),
        }
    }
}

/// Read-only copy of an actor's observable state, for debug tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub name: Option<String>,
    pub shape: Shape,
    pub position: Vector,
    pub center: Vector,
    pub rotation: f64,
    pub layer: i32,
    pub visible: bool,
    pub opacity: f64,
    pub color: Color,
    pub body_type: BodyType,
    pub velocity: Vector,
}

impl Actor {
    pub fn new(shape: Shape) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ActorInner {
                id: ActorId::new(),
                name: None,
                shape,
                position: Vector::NULL,
                rotation: 0.0,
                layer: 0,
                visible: true,
                opacity: 1.0,
                color: Color::default(),
                body: PhysicsBody::default(),
                scene: None,
                animation_time: 0.0,
                listeners: ActorListeners::default(),
            })),
        }
    }

    pub fn circle(radius: f64) -> Self {
        Self::new(Shape::circle(radius))
    }

    pub fn rectangle(width: f64, height: f64) -> Self {
        Self::new(Shape::rectangle(width, height))
    }

    pub fn polygon(points: Vec<Vector>) -> Self {
        Self::new(Shape::polygon(points))
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.inner.borrow_mut().name = Some(name.into());
        self
    }

    pub fn with_position(self, x: f64, y: f64) -> Self {
        self.set_position(Vector::new(x, y));
        self
    }

    pub fn with_body_type(self, body_type: BodyType) -> Self {
        self.set_body_type(body_type);
        self
    }

    pub(crate) fn state(&self) -> Ref<'_, ActorInner> {
        self.inner.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, ActorInner> {
        self.inner.borrow_mut()
    }

    pub fn id(&self) -> ActorId {
        self.inner.borrow().id
    }

    pub fn name(&self) -> Option<String> {
        self.inner.borrow().name.clone()
    }

    pub fn downgrade(&self) -> WeakActor {
        WeakActor {
            id: self.id(),
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn shape(&self) -> Shape {
        self.inner.borrow().shape.clone()
    }

    // Position, rotation and layer.

    /// Lower-left corner of the shape's local bounds, in world coordinates.
    pub fn position(&self) -> Vector {
        self.inner.borrow().position
    }

    pub fn set_position(&self, position: Vector) {
        self.inner.borrow_mut().position = position;
    }

    pub fn move_by(&self, delta: Vector) {
        let mut inner = self.inner.borrow_mut();
        inner.position = inner.position + delta;
    }

    /// World position of the shape's centroid, which is also its pivot.
    pub fn center(&self) -> Vector {
        let inner = self.inner.borrow();
        inner.position + inner.shape.centroid()
    }

    pub fn set_center(&self, center: Vector) {
        let mut inner = self.inner.borrow_mut();
        inner.position = center - inner.shape.centroid();
    }

    /// Rotation in radians, counter-clockwise.
    pub fn rotation(&self) -> f64 {
        self.inner.borrow().rotation
    }

    pub fn set_rotation(&self, rotation: f64) {
        self.inner.borrow_mut().rotation = rotation;
    }

    pub fn rotate_by(&self, angle: f64) {
        self.inner.borrow_mut().rotation += angle;
    }

    pub fn layer(&self) -> i32 {
        self.inner.borrow().layer
    }

    /// Lower layers are drawn first and receive events first.
    pub fn set_layer(&self, layer: i32) {
        self.inner.borrow_mut().layer = layer;
    }

    // Appearance.

    pub fn is_visible(&self) -> bool {
        self.inner.borrow().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.inner.borrow_mut().visible = visible;
    }

    pub fn opacity(&self) -> f64 {
        self.inner.borrow().opacity
    }

    /// Clamped to `[0, 1]`.
    pub fn set_opacity(&self, opacity: f64) {
        let opacity = if opacity.is_nan() { 0.0 } else { opacity.clamp(0.0, 1.0) };
        self.inner.borrow_mut().opacity = opacity;
    }

    pub fn color(&self) -> Color {
        self.inner.borrow().color
    }

    pub fn set_color(&self, color: Color) {
        self.inner.borrow_mut().color = color;
    }

    // Geometry queries.

    /// World-space axis-aligned bounds, taking rotation into account.
    pub fn bounds(&self) -> Bounds {
        let inner = self.inner.borrow();
        let local = inner.shape.local_bounds();
        if inner.rotation == 0.0 || matches!(inner.shape, Shape::Circle { .. }) {
            return local.move_by(inner.position);
        }
        let pose = inner.pose();
        let corners: Vec<Vector> = match &inner.shape {
            Shape::Polygon { points } => points.iter().map(|p| pose.to_world(*p)).collect(),
            _ => local.points().iter().map(|p| pose.to_world(*p)).collect(),
        };
        Bounds::from_points(&corners).unwrap_or_else(|| local.move_by(inner.position))
    }

    /// Whether the world point lies inside the shape.
    pub fn contains(&self, point: Vector) -> bool {
        let inner = self.inner.borrow();
        inner.shape.contains_local(inner.pose().to_local(point))
    }

    /// Whether the collision geometries of both actors overlap.
    pub fn overlaps(&self, other: &Actor) -> bool {
        if self == other {
            return true;
        }
        intersects(
            &placed_collider(&self.inner.borrow()),
            &placed_collider(&other.inner.borrow()),
        )
    }

    // Scene membership.

    /// Whether the actor is live in a scene.
    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().scene.is_some()
    }

    pub fn scene_id(&self) -> Option<SceneId> {
        self.inner.borrow().scene
    }

    pub(crate) fn is_live_in(&self, scene: SceneId) -> bool {
        self.inner.borrow().scene == Some(scene)
    }

    /// Clears the scene membership if it still points at `scene`. Skipped
    /// while the actor is borrowed elsewhere.
    pub(crate) fn detach_from(&self, scene: SceneId) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            if inner.scene == Some(scene) {
                inner.scene = None;
            }
        }
    }

    // Physics body.

    /// Runs `f` on a copy of the body, so the closure may use this actor
    /// freely.
    pub fn with_body<R>(&self, f: impl FnOnce(&PhysicsBody) -> R) -> R {
        let body = self.inner.borrow().body.clone();
        f(&body)
    }

    /// Mutable access to the body. Any change is legal at any time; the
    /// collision shape itself stays fixed while the actor is live.
    ///
    /// `f` works on a copy that is written back afterwards, so body changes
    /// made through this actor inside `f` are overwritten.
    pub fn with_body_mut<R>(&self, f: impl FnOnce(&mut PhysicsBody) -> R) -> R {
        let mut body = self.inner.borrow().body.clone();
        let result = f(&mut body);
        self.inner.borrow_mut().body = body;
        result
    }

    pub fn body_type(&self) -> BodyType {
        self.with_body(PhysicsBody::body_type)
    }

    pub fn set_body_type(&self, body_type: BodyType) {
        self.with_body_mut(|body| body.set_body_type(body_type));
    }

    pub fn make_dynamic(&self) {
        self.set_body_type(BodyType::Dynamic);
    }

    pub fn make_static(&self) {
        self.set_body_type(BodyType::Static);
    }

    pub fn make_kinematic(&self) {
        self.set_body_type(BodyType::Kinematic);
    }

    /// Turns the body into a non-colliding sensor that still reports contacts.
    pub fn make_sensor(&self) {
        self.with_body_mut(|body| body.set_sensor(true));
    }

    /// Density times area.
    pub fn mass(&self) -> f64 {
        self.inner.borrow().mass()
    }

    pub fn velocity(&self) -> Vector {
        self.with_body(PhysicsBody::velocity)
    }

    pub fn set_velocity(&self, velocity: Vector) {
        self.with_body_mut(|body| body.set_velocity(velocity));
    }

    pub fn angular_velocity(&self) -> f64 {
        self.with_body(PhysicsBody::angular_velocity)
    }

    pub fn set_angular_velocity(&self, angular_velocity: f64) {
        self.with_body_mut(|body| body.set_angular_velocity(angular_velocity));
    }

    pub fn apply_force(&self, force: Vector) {
        self.with_body_mut(|body| body.apply_force(force));
    }

    pub fn apply_torque(&self, torque: f64) {
        self.with_body_mut(|body| body.apply_torque(torque));
    }

    pub fn apply_impulse(&self, impulse: Vector) {
        let mut inner = self.inner.borrow_mut();
        let mass = inner.mass();
        inner.body.apply_impulse(impulse, mass);
    }

    /// Changes the angular velocity by `impulse` over the body's moment of
    /// inertia.
    pub fn apply_angular_impulse(&self, impulse: f64) {
        let mut inner = self.inner.borrow_mut();
        let inertia = inner.inertia();
        inner.body.apply_angular_impulse(impulse, inertia);
    }

    pub fn set_density(&self, density: f64) {
        self.with_body_mut(|body| body.set_density(density));
    }

    pub fn set_friction(&self, friction: f64) {
        self.with_body_mut(|body| body.set_friction(friction));
    }

    pub fn set_restitution(&self, restitution: f64) {
        self.with_body_mut(|body| body.set_restitution(restitution));
    }

    pub fn set_gravity_scale(&self, scale: f64) {
        self.with_body_mut(|body| body.set_gravity_scale(scale));
    }

    pub fn set_rotation_locked(&self, locked: bool) {
        self.with_body_mut(|body| body.set_rotation_locked(locked));
    }

    /// Stops all motion and drops pending forces.
    pub fn reset_movement(&self) {
        self.with_body_mut(PhysicsBody::reset_movement);
    }

    // Listeners.

    pub fn on_key(
        &self,
        listener: impl FnMut(&mut Scene, &KeyEvent) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.inner.borrow_mut().listeners.key.add(Box::new(listener))
    }

    pub fn on_mouse(
        &self,
        listener: impl FnMut(&mut Scene, &MouseEvent) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.inner.borrow_mut().listeners.mouse.add(Box::new(listener))
    }

    pub fn on_frame_update(
        &self,
        listener: impl FnMut(&mut Scene, f64) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.inner
            .borrow_mut()
            .listeners
            .frame_update
            .add(Box::new(listener))
    }

    /// Called once at the start of every contact with another actor.
    pub fn on_collision(
        &self,
        listener: impl FnMut(&mut Scene, &CollisionEvent) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.inner
            .borrow_mut()
            .listeners
            .collision
            .add(Box::new(listener))
    }

    /// Like [`Actor::on_collision`], restricted to contacts with `other`.
    pub fn on_collision_with(
        &self,
        other: &Actor,
        mut listener: impl FnMut(&mut Scene, &CollisionEvent) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        let other = other.id();
        self.on_collision(move |scene, event| {
            if event.other.id() == other {
                listener(scene, event)
            } else {
                Ok(())
            }
        })
    }

    /// Called once when a contact with another actor ends.
    pub fn on_collision_end(
        &self,
        listener: impl FnMut(&mut Scene, &Actor) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.inner
            .borrow_mut()
            .listeners
            .collision_end
            .add(Box::new(listener))
    }

    /// Called after the actor was added to a scene.
    pub fn on_mount(
        &self,
        listener: impl FnMut(&mut Scene) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.inner.borrow_mut().listeners.mount.add(Box::new(listener))
    }

    /// Called after the actor was removed from a scene.
    pub fn on_unmount(
        &self,
        listener: impl FnMut(&mut Scene) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.inner
            .borrow_mut()
            .listeners
            .unmount
            .add(Box::new(listener))
    }

    /// Returns `false` when no listener with this id belongs to the actor.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.remove(id)
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        let inner = self.inner.borrow();
        ActorSnapshot {
            id: inner.id,
            name: inner.name.clone(),
            shape: inner.shape.clone(),
            position: inner.position,
            center: inner.position + inner.shape.centroid(),
            rotation: inner.rotation,
            layer: inner.layer,
            visible: inner.visible,
            opacity: inner.opacity,
            color: inner.color,
            body_type: inner.body.body_type(),
            velocity: inner.body.velocity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn test_new_actor_is_detached_static_sensor() {
        let actor = Actor::rectangle(2.0, 1.0);
        assert!(!actor.is_mounted());
        assert_eq!(actor.body_type(), BodyType::Static);
        assert!(actor.with_body(PhysicsBody::is_sensor));
        assert!(actor.is_visible());
        assert_eq!(actor.opacity(), 1.0);
    }

    #[test]
    fn test_handles_share_state() {
        let actor = Actor::circle(1.0);
        let alias = actor.clone();
        alias.set_position(Vector::new(3.0, 4.0));
        assert_eq!(actor.position(), Vector::new(3.0, 4.0));
        assert_eq!(actor, alias);
        assert_ne!(actor, Actor::circle(1.0));
    }

    #[test]
    fn test_circle_center_is_offset_by_radius() {
        let ball = Actor::circle(0.5).with_position(1.0, 1.0);
        assert_eq!(ball.center(), Vector::new(1.5, 1.5));
        ball.set_center(Vector::new(0.0, 10.0));
        assert_eq!(ball.position(), Vector::new(-0.5, 9.5));
    }

    #[test]
    fn test_opacity_is_clamped() {
        let actor = Actor::circle(1.0);
        actor.set_opacity(1.5);
        assert_eq!(actor.opacity(), 1.0);
        actor.set_opacity(-0.5);
        assert_eq!(actor.opacity(), 0.0);
    }

    #[test]
    fn test_rotated_bounds_and_contains() {
        let bar = Actor::rectangle(4.0, 2.0);
        bar.set_rotation(FRAC_PI_2);
        let bounds = bar.bounds();
        assert!((bounds.width - 2.0).abs() < 1e-12);
        assert!((bounds.height - 4.0).abs() < 1e-12);
        assert!(bounds.center().distance(Vector::new(2.0, 1.0)) < 1e-12);
        assert!(bar.contains(Vector::new(2.0, 2.8)));
        assert!(!bar.contains(Vector::new(3.5, 1.0)));
    }

    #[test]
    fn test_overlaps() {
        let a = Actor::rectangle(1.0, 1.0);
        let b = Actor::circle(0.5).with_position(0.8, 0.0);
        let c = Actor::circle(0.5).with_position(5.0, 0.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_impulse_uses_mass() {
        let block = Actor::rectangle(1.0, 1.0).with_body_type(BodyType::Dynamic);
        block.set_density(2.0);
        block.apply_impulse(Vector::new(4.0, 0.0));
        assert_eq!(block.velocity(), Vector::new(2.0, 0.0));
    }

    #[test]
    fn test_remove_listener_from_any_set() {
        let actor = Actor::circle(1.0);
        let key = actor.on_key(|_, _| Ok(()));
        let unmount = actor.on_unmount(|_| Ok(()));
        assert!(actor.remove_listener(unmount));
        assert!(actor.remove_listener(key));
        assert!(!actor.remove_listener(key));
    }

    #[test]
    fn test_body_closure_may_query_its_actor() {
        let ball = Actor::circle(1.0).with_body_type(BodyType::Dynamic);
        let alias = ball.clone();
        let area = ball.with_body(|body| alias.mass() / body.density());
        assert!((area - std::f64::consts::PI).abs() < 1e-12);

        ball.with_body_mut(|body| {
            body.set_velocity(alias.center());
            alias.set_position(Vector::new(2.0, 0.0));
        });
        assert_eq!(ball.velocity(), Vector::new(1.0, 1.0));
        assert_eq!(ball.position(), Vector::new(2.0, 0.0));
    }

    #[test]
    fn test_detach_only_from_own_scene() {
        let actor = Actor::circle(1.0);
        let (home, other) = (SceneId::new(), SceneId::new());
        actor.state_mut().scene = Some(home);
        actor.detach_from(other);
        assert!(actor.is_live_in(home));
        actor.detach_from(home);
        assert!(!actor.is_mounted());
    }

    #[test]
    fn test_snapshot_serializes() {
        let actor = Actor::circle(1.0).with_name("ball").with_position(2.0, 3.0);
        let json = serde_json::to_string(&actor.snapshot()).unwrap();
        let back: ActorSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name.as_deref(), Some("ball"));
        assert_eq!(back.center, Vector::new(3.0, 4.0));
    }
}

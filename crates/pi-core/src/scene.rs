//! Scenes: the actor collection, its physics world, camera and listeners.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{Actor, ActorListeners, ActorSnapshot};
use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::event::{CollisionEvent, InputEvent, Key, KeyEvent, MouseAction, MouseEvent};
use crate::listener::{
    FrameUpdateListener, KeyListener, ListenerId, Listeners, MouseListener, invoke,
};
use crate::physics::{ContactEvent, ContactPhase, Joint, JointKind, PhysicsWorld};
use crate::render::{Renderable, Renderer};
use crate::resources::{Color, ResourceRegistry};
use crate::shape::Shape;
use crate::task::{self, PeriodicTask};
use crate::vector::Vector;

/// Gravity of the real world, for [`Scene::enable_gravity`].
pub const EARTH_GRAVITY: Vector = Vector::new(0.0, -9.81);

/// Stable identity of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId(Uuid);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of a scene for debug tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub id: SceneId,
    pub frame: u64,
    pub gravity: Vector,
    pub focus: Vector,
    pub meter: f64,
    pub background: Color,
    pub actors: Vec<ActorSnapshot>,
}

/// A self-contained world of actors.
///
/// The actor list and the physics registrations always change together:
/// every live actor has exactly one registered body and nothing else is
/// registered.
pub struct Scene {
    id: SceneId,
    actors: Vec<Actor>,
    world: PhysicsWorld,
    camera: Camera,
    key_listeners: Listeners<KeyListener>,
    mouse_listeners: Listeners<MouseListener>,
    frame_update_listeners: Listeners<FrameUpdateListener>,
    pressed_keys: BTreeSet<Key>,
    mouse_position: Vector,
    viewport: (f64, f64),
    background: Color,
    resources: Rc<ResourceRegistry>,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("actor_count", &self.actors.len())
            .field("world", &self.world)
            .field("camera", &self.camera)
            .finish_non_exhaustive()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Rc::new(ResourceRegistry::new()))
    }
}

impl Scene {
    pub fn new(resources: Rc<ResourceRegistry>) -> Self {
        let config = EngineConfig::default();
        Self {
            id: SceneId::new(),
            actors: Vec::new(),
            world: PhysicsWorld::with_settings(config.gravity, config.world_settings()),
            camera: Camera::new(),
            key_listeners: Listeners::default(),
            mouse_listeners: Listeners::default(),
            frame_update_listeners: Listeners::default(),
            pressed_keys: BTreeSet::new(),
            mouse_position: Vector::NULL,
            viewport: config.viewport,
            background: config.background,
            resources,
        }
    }

    pub fn with_config(config: &EngineConfig, resources: Rc<ResourceRegistry>) -> Result<Self> {
        config.validate()?;
        let mut scene = Self::new(resources);
        scene.world = PhysicsWorld::with_settings(config.gravity, config.world_settings());
        scene.camera.set_meter(config.meter)?;
        scene.viewport = config.viewport;
        scene.background = config.background;
        Ok(scene)
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn gravity(&self) -> Vector {
        self.world.gravity()
    }

    pub fn set_gravity(&mut self, gravity: Vector) {
        self.world.set_gravity(gravity);
    }

    pub fn enable_gravity(&mut self) {
        self.set_gravity(EARTH_GRAVITY);
    }

    pub fn is_physics_paused(&self) -> bool {
        self.world.is_paused()
    }

    pub fn set_physics_paused(&mut self, paused: bool) {
        self.world.set_paused(paused);
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Viewport size in pixels used for coordinate conversion.
    pub fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: (f64, f64)) {
        self.viewport = viewport;
    }

    // Actors.

    /// Makes the actor live in this scene.
    ///
    /// Fails without changing anything when the actor is already live in a
    /// scene or when its dynamic body has no mass.
    pub fn add(&mut self, actor: &Actor) -> Result<()> {
        let id = actor.id();
        if let Some(owner) = actor.scene_id() {
            tracing::warn!("[scene] actor {id} is already live in scene {owner}");
            return Err(EngineError::ActorAlreadyInScene(id));
        }
        self.world.register(actor)?;
        actor.state_mut().scene = Some(self.id);
        self.actors.push(actor.clone());
        tracing::debug!("[scene] added actor {id} to scene {}", self.id);

        self.dispatch_actor("mount listener", actor, |l| &l.mount, |f, scene| f(scene));
        Ok(())
    }

    pub fn add_all<'a>(&mut self, actors: impl IntoIterator<Item = &'a Actor>) -> Result<()> {
        for actor in actors {
            self.add(actor)?;
        }
        Ok(())
    }

    /// Takes the actor out of the scene. Its joints are released, the camera
    /// stops following it and it receives no further events from this scene.
    /// The actor keeps its own listeners.
    pub fn remove(&mut self, actor: &Actor) -> Result<()> {
        let id = actor.id();
        if !actor.is_live_in(self.id) {
            return Err(EngineError::ActorNotInScene(id));
        }
        let joints = self.world.take_joints_of(id);
        self.world.unregister(id);
        self.actors.retain(|a| a != actor);
        actor.state_mut().scene = None;
        if self.camera.is_following(actor) {
            self.camera.unfollow();
        }
        tracing::debug!("[scene] removed actor {id} from scene {}", self.id);

        for joint in joints {
            joint.release();
        }

        let snapshot = actor.state().listeners.unmount.snapshot();
        for (listener_id, listener) in snapshot {
            if actor.state().listeners.unmount.contains(listener_id) {
                invoke("unmount listener", listener_id, &listener, |f| f(self));
            }
        }
        Ok(())
    }

    /// Removes every actor.
    pub fn clear(&mut self) {
        for actor in self.actors() {
            // Listeners may have removed it already.
            if actor.is_live_in(self.id) {
                let _ = self.remove(&actor);
            }
        }
    }

    pub fn contains(&self, actor: &Actor) -> bool {
        actor.is_live_in(self.id)
    }

    /// Live actors, lowest layer first, ties in insertion order.
    pub fn actors(&self) -> Vec<Actor> {
        let mut ordered: Vec<(i32, Actor)> =
            self.actors.iter().map(|a| (a.layer(), a.clone())).collect();
        ordered.sort_by_key(|(layer, _)| *layer);
        ordered.into_iter().map(|(_, actor)| actor).collect()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn actor_named(&self, name: &str) -> Option<Actor> {
        self.actors
            .iter()
            .find(|a| a.name().as_deref() == Some(name))
            .cloned()
    }

    /// Actors whose shape contains the world point, topmost layer first.
    pub fn actors_at(&self, point: Vector) -> Vec<Actor> {
        let mut hits: Vec<Actor> = self.actors().into_iter().filter(|a| a.contains(point)).collect();
        hits.reverse();
        hits
    }

    /// Whether the dynamic actor stands on a static, solid actor of this
    /// scene.
    pub fn is_grounded(&self, actor: &Actor) -> Result<bool> {
        if !actor.is_live_in(self.id) {
            return Err(EngineError::ActorNotInScene(actor.id()));
        }
        self.world.is_grounded(actor.id())
    }

    // Joints.

    fn check_joint(&self, a: &Actor, b: &Actor) -> Result<()> {
        if a == b {
            return Err(EngineError::JointSelfReference);
        }
        if !(a.is_live_in(self.id) && b.is_live_in(self.id)) {
            return Err(EngineError::JointActorsNotColocated);
        }
        Ok(())
    }

    fn attach(&mut self, joint: Joint) -> Result<Joint> {
        self.world.add_joint(joint.clone())?;
        tracing::debug!("[scene] created {:?} joint {}", joint.kind(), joint.id());
        Ok(joint)
    }

    /// Pins both actors together at the world point `anchor`.
    pub fn create_revolute_joint(&mut self, a: &Actor, b: &Actor, anchor: Vector) -> Result<Joint> {
        self.check_joint(a, b)?;
        let joint = Joint::new(
            JointKind::Revolute,
            a,
            world_to_local(a, anchor),
            b,
            world_to_local(b, anchor),
        );
        self.attach(joint)
    }

    /// Keeps the anchors, given in each actor's local coordinates, at their
    /// current distance.
    pub fn create_distance_joint(
        &mut self,
        a: &Actor,
        anchor_a: Vector,
        b: &Actor,
        anchor_b: Vector,
    ) -> Result<Joint> {
        self.check_joint(a, b)?;
        let length = local_to_world(a, anchor_a).distance(local_to_world(b, anchor_b));
        let joint = Joint::new(JointKind::Distance { length }, a, anchor_a, b, anchor_b);
        self.attach(joint)
    }

    /// Limits the distance between the anchors to `max_length`.
    pub fn create_rope_joint(
        &mut self,
        a: &Actor,
        anchor_a: Vector,
        b: &Actor,
        anchor_b: Vector,
        max_length: f64,
    ) -> Result<Joint> {
        self.check_joint(a, b)?;
        if !(max_length.is_finite() && max_length >= 0.0) {
            return Err(EngineError::InvalidConfiguration(format!(
                "rope length {max_length} must be non-negative"
            )));
        }
        let joint = Joint::new(JointKind::Rope { max_length }, a, anchor_a, b, anchor_b);
        self.attach(joint)
    }

    /// Lets `b` slide relative to `a` along the world direction `axis`
    /// through the world point `anchor`. `limits` bound the travel along the
    /// axis, measured from the starting offset of the anchors.
    pub fn create_prismatic_joint(
        &mut self,
        a: &Actor,
        b: &Actor,
        anchor: Vector,
        axis: Vector,
        limits: Option<(f64, f64)>,
    ) -> Result<Joint> {
        self.check_joint(a, b)?;
        if !(axis.is_finite() && axis.length() > 0.0) {
            return Err(EngineError::InvalidJointAxis);
        }
        if let Some((min, max)) = limits {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "prismatic limits ({min}, {max}) must be finite and ordered"
                )));
            }
        }
        let joint = Joint::new(
            JointKind::Prismatic { axis, limits },
            a,
            world_to_local(a, anchor),
            b,
            world_to_local(b, anchor),
        );
        self.attach(joint)
    }

    /// Glues both actors together at the world point `anchor`, keeping
    /// their current relative rotation.
    pub fn create_weld_joint(&mut self, a: &Actor, b: &Actor, anchor: Vector) -> Result<Joint> {
        self.check_joint(a, b)?;
        let joint = Joint::new(
            JointKind::Weld,
            a,
            world_to_local(a, anchor),
            b,
            world_to_local(b, anchor),
        );
        self.attach(joint)
    }

    /// Releases the joint. Returns `false` when it did not belong to this scene.
    pub fn remove_joint(&mut self, joint: &Joint) -> bool {
        match self.world.take_joint(joint.id()) {
            Some(joint) => {
                joint.release();
                true
            }
            None => false,
        }
    }

    pub fn joints(&self) -> Vec<Joint> {
        self.world.joints().cloned().collect()
    }

    // Scene-wide listeners.

    pub fn on_key(
        &mut self,
        listener: impl FnMut(&mut Scene, &KeyEvent) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.key_listeners.add(Box::new(listener))
    }

    pub fn on_mouse(
        &mut self,
        listener: impl FnMut(&mut Scene, &MouseEvent) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.mouse_listeners.add(Box::new(listener))
    }

    pub fn on_frame_update(
        &mut self,
        listener: impl FnMut(&mut Scene, f64) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.frame_update_listeners.add(Box::new(listener))
    }

    // Periodic tasks.

    /// Runs `task` every `interval` seconds of frame time until cancelled.
    /// The task receives how often it has run, starting at 1.
    pub fn repeat(
        &mut self,
        interval: f64,
        task: impl FnMut(&mut Scene, u32) -> anyhow::Result<()> + 'static,
    ) -> Result<PeriodicTask> {
        task::schedule(self, interval, None, Box::new(task), None)
    }

    /// Runs `task` `repetitions` times, then unregisters it.
    pub fn repeat_times(
        &mut self,
        interval: f64,
        repetitions: u32,
        task: impl FnMut(&mut Scene, u32) -> anyhow::Result<()> + 'static,
    ) -> Result<PeriodicTask> {
        task::schedule(self, interval, Some(repetitions), Box::new(task), None)
    }

    /// Like [`Scene::repeat_times`], with `final_task` taking the place of
    /// the last run.
    pub fn repeat_with_final(
        &mut self,
        interval: f64,
        repetitions: u32,
        task: impl FnMut(&mut Scene, u32) -> anyhow::Result<()> + 'static,
        final_task: impl FnMut(&mut Scene, u32) -> anyhow::Result<()> + 'static,
    ) -> Result<PeriodicTask> {
        task::schedule(
            self,
            interval,
            Some(repetitions),
            Box::new(task),
            Some(Box::new(final_task)),
        )
    }

    /// Runs `task` once after `seconds` of frame time.
    pub fn delay(
        &mut self,
        seconds: f64,
        task: impl FnOnce(&mut Scene) -> anyhow::Result<()> + 'static,
    ) -> Result<PeriodicTask> {
        let mut task = Some(task);
        self.repeat_times(seconds, 1, move |scene, _| match task.take() {
            Some(task) => task(scene),
            None => Ok(()),
        })
    }

    /// Stops the task for good. Returns `false` when it had already finished
    /// or belongs to another scene.
    pub fn cancel_task(&mut self, task: &PeriodicTask) -> bool {
        let removed = task
            .listener_id()
            .is_some_and(|id| self.frame_update_listeners.remove(id));
        if removed {
            task.finish();
        }
        removed
    }

    /// Removes a scene-wide listener. Returns `false` when the id is unknown.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.key_listeners.remove(id)
            || self.mouse_listeners.remove(id)
            || self.frame_update_listeners.remove(id)
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.pressed_keys.iter().copied()
    }

    /// Last known mouse position in world coordinates.
    pub fn mouse_position(&self) -> Vector {
        self.mouse_position
    }

    // Dispatch.

    /// Delivers one input event: scene-wide listeners first, then actors
    /// from the lowest layer up.
    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.pressed_keys.insert(key);
                self.dispatch_key(KeyEvent { key, pressed: true });
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(&key);
                self.dispatch_key(KeyEvent {
                    key,
                    pressed: false,
                });
            }
            InputEvent::MouseDown { button, screen } => {
                self.dispatch_mouse(MouseAction::Down(button), screen);
            }
            InputEvent::MouseUp { button, screen } => {
                self.dispatch_mouse(MouseAction::Up(button), screen);
            }
            InputEvent::MouseMove { screen } => self.dispatch_mouse(MouseAction::Move, screen),
            InputEvent::MouseWheel { screen, delta } => {
                self.dispatch_mouse(MouseAction::Wheel(delta), screen);
            }
        }
    }

    fn dispatch_key(&mut self, event: KeyEvent) {
        self.dispatch_scene("key listener", |s| &s.key_listeners, |f, scene| f(scene, &event));
        for actor in self.actors() {
            self.dispatch_actor("key listener", &actor, |l| &l.key, |f, scene| f(scene, &event));
        }
    }

    fn dispatch_mouse(&mut self, action: MouseAction, screen: Vector) {
        let position = self.camera.screen_to_world(screen, self.viewport);
        self.mouse_position = position;
        let event = MouseEvent {
            action,
            position,
            screen,
        };
        self.dispatch_scene("mouse listener", |s| &s.mouse_listeners, |f, scene| f(scene, &event));
        for actor in self.actors() {
            self.dispatch_actor("mouse listener", &actor, |l| &l.mouse, |f, scene| f(scene, &event));
        }
    }

    /// Runs the frame-update listeners, scene-wide first, and advances sprite
    /// animations.
    pub fn update(&mut self, elapsed: f64) {
        for actor in &self.actors {
            let mut state = actor.state_mut();
            if matches!(state.shape, Shape::Sprite { .. }) {
                state.animation_time += elapsed;
            }
        }
        self.dispatch_scene(
            "frame update listener",
            |s| &s.frame_update_listeners,
            |f, scene| f(scene, elapsed),
        );
        for actor in self.actors() {
            self.dispatch_actor(
                "frame update listener",
                &actor,
                |l| &l.frame_update,
                |f, scene| f(scene, elapsed),
            );
        }
    }

    /// Runs the physics steps `elapsed` seconds cover, delivering collision
    /// events after each step.
    pub fn advance_physics(&mut self, elapsed: f64) {
        let steps = self.world.accumulate(elapsed);
        for _ in 0..steps {
            self.step_physics();
        }
    }

    /// One fixed physics step followed by its collision events.
    pub fn step_physics(&mut self) {
        let events = self.world.step();
        self.dispatch_contacts(events);
    }

    fn dispatch_contacts(&mut self, events: Vec<ContactEvent>) {
        for event in events {
            match event.phase {
                ContactPhase::Begin => {
                    self.deliver_collision(&event.a, &event.b, event.normal, event.depth);
                    self.deliver_collision(&event.b, &event.a, -event.normal, event.depth);
                }
                ContactPhase::End => {
                    self.deliver_separation(&event.a, &event.b);
                    self.deliver_separation(&event.b, &event.a);
                }
            }
        }
    }

    fn deliver_collision(&mut self, actor: &Actor, other: &Actor, normal: Vector, depth: f64) {
        if !other.is_live_in(self.id) {
            return;
        }
        let event = CollisionEvent {
            other: other.clone(),
            normal,
            depth,
        };
        self.dispatch_actor("collision listener", actor, |l| &l.collision, |f, scene| {
            if event.other.is_live_in(scene.id) {
                f(scene, &event)
            } else {
                Ok(())
            }
        });
    }

    fn deliver_separation(&mut self, actor: &Actor, other: &Actor) {
        if !other.is_live_in(self.id) {
            return;
        }
        self.dispatch_actor("collision end listener", actor, |l| &l.collision_end, |f, scene| {
            if other.is_live_in(scene.id) {
                f(scene, other)
            } else {
                Ok(())
            }
        });
    }

    /// Moves the camera towards its focus actor.
    pub fn update_camera(&mut self) {
        self.camera.update();
    }

    /// Draws every visible actor in layer order.
    pub fn render(&self, renderer: &mut dyn Renderer) {
        let transform = self.camera.transform(self.viewport);
        renderer.clear(self.background);
        for actor in self.actors() {
            for command in actor.draw_commands(&transform) {
                renderer.draw(command);
            }
        }
        renderer.finish();
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            id: self.id,
            frame: self.world.current_frame(),
            gravity: self.world.gravity(),
            focus: self.camera.focus(),
            meter: self.camera.meter(),
            background: self.background,
            actors: self.actors().iter().map(Actor::snapshot).collect(),
        }
    }

    fn dispatch_scene<F: ?Sized>(
        &mut self,
        kind: &str,
        select: impl Fn(&Scene) -> &Listeners<F>,
        mut call: impl FnMut(&mut F, &mut Scene) -> anyhow::Result<()>,
    ) {
        let snapshot = select(self).snapshot();
        for (id, listener) in snapshot {
            if select(self).contains(id) {
                invoke(kind, id, &listener, |f| call(f, self));
            }
        }
    }

    /// Runs the actor's listeners of one kind while it stays live here.
    fn dispatch_actor<F: ?Sized>(
        &mut self,
        kind: &str,
        actor: &Actor,
        select: impl Fn(&ActorListeners) -> &Listeners<F>,
        mut call: impl FnMut(&mut F, &mut Scene) -> anyhow::Result<()>,
    ) {
        let snapshot = select(&actor.state().listeners).snapshot();
        for (id, listener) in snapshot {
            let current = actor.is_live_in(self.id) && select(&actor.state().listeners).contains(id);
            if current {
                invoke(kind, id, &listener, |f| call(f, self));
            }
        }
    }
}

fn local_to_world(actor: &Actor, local: Vector) -> Vector {
    actor.state().pose().to_world(local)
}

fn world_to_local(actor: &Actor, world: Vector) -> Vector {
    actor.state().pose().to_local(world)
}

impl Drop for Scene {
    /// Actors outlive their scene: they become detached and can be added
    /// elsewhere. Joints are released; unmount listeners do not run.
    fn drop(&mut self) {
        for joint in self.world.take_all_joints() {
            joint.release();
        }
        for actor in &self.actors {
            actor.detach_from(self.id);
        }
        if !self.actors.is_empty() {
            tracing::debug!(
                "[scene] dropped scene {} with {} actors",
                self.id,
                self.actors.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::event::MouseButton;
    use crate::physics::BodyType;
    use crate::test_utils::{RecordingRenderer, init_tracing};

    fn scene() -> Scene {
        init_tracing();
        Scene::default()
    }

    fn log() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn dynamic_circle(radius: f64, x: f64, y: f64) -> Actor {
        Actor::circle(radius)
            .with_body_type(BodyType::Dynamic)
            .with_position(x, y)
    }

    #[test]
    fn test_add_registers_once() {
        let mut scene = scene();
        let actor = Actor::rectangle(1.0, 1.0);
        scene.add(&actor).unwrap();

        let matches = scene.actors().iter().filter(|a| **a == actor).count();
        assert_eq!(matches, 1);
        assert!(scene.world().is_registered(actor.id()));
        assert!(scene.contains(&actor));
        assert_eq!(actor.scene_id(), Some(scene.id()));

        assert!(matches!(
            scene.add(&actor),
            Err(EngineError::ActorAlreadyInScene(_))
        ));
        assert_eq!(scene.actor_count(), 1);
        assert_eq!(scene.world().body_count(), 1);
    }

    #[test]
    fn test_second_scene_add_leaves_first_untouched() {
        let mut first = scene();
        let mut second = scene();
        let actor = Actor::circle(1.0);
        first.add(&actor).unwrap();

        let result = second.add(&actor);
        assert!(matches!(result, Err(EngineError::ActorAlreadyInScene(_))));
        assert_eq!(first.actor_count(), 1);
        assert!(first.world().is_registered(actor.id()));
        assert!(first.contains(&actor));
        assert_eq!(second.actor_count(), 0);
        assert_eq!(second.world().body_count(), 0);
        assert_eq!(actor.scene_id(), Some(first.id()));
    }

    #[test]
    fn test_zero_mass_add_changes_nothing() {
        let mut scene = scene();
        let ghost = Actor::rectangle(1.0, 1.0).with_body_type(BodyType::Dynamic);
        ghost.set_density(0.0);
        assert!(matches!(scene.add(&ghost), Err(EngineError::ZeroMass { .. })));
        assert!(!ghost.is_mounted());
        assert_eq!(scene.actor_count(), 0);
    }

    #[test]
    fn test_remove_keeps_listeners_and_allows_readd() {
        let mut first = scene();
        let mut second = scene();
        let actor = Actor::circle(1.0);
        let listener = actor.on_key(|_, _| Ok(()));
        first.add(&actor).unwrap();
        first.remove(&actor).unwrap();

        assert!(!actor.is_mounted());
        assert!(!first.world().is_registered(actor.id()));
        assert_eq!(first.actor_count(), 0);
        assert!(matches!(
            first.remove(&actor),
            Err(EngineError::ActorNotInScene(_))
        ));

        second.add(&actor).unwrap();
        assert!(actor.remove_listener(listener));
    }

    #[test]
    fn test_actors_are_layer_ordered_and_stable() {
        let mut scene = scene();
        let top = Actor::circle(1.0).with_name("top");
        top.set_layer(5);
        let first = Actor::circle(1.0).with_name("first");
        let second = Actor::circle(1.0).with_name("second");
        let bottom = Actor::circle(1.0).with_name("bottom");
        bottom.set_layer(-1);
        scene.add_all([&top, &first, &second, &bottom]).unwrap();

        let names: Vec<_> = scene.actors().iter().filter_map(Actor::name).collect();
        assert_eq!(names, ["bottom", "first", "second", "top"]);
        assert_eq!(scene.actor_named("second"), Some(second));
    }

    #[test]
    fn test_key_dispatch_order() {
        let mut scene = scene();
        let calls = log();
        let high = Actor::circle(1.0);
        high.set_layer(2);
        let low = Actor::circle(1.0);
        low.set_layer(1);
        for (actor, name) in [(&high, "high"), (&low, "low")] {
            let calls = calls.clone();
            actor.on_key(move |_, _| {
                calls.borrow_mut().push(name.to_string());
                Ok(())
            });
        }
        let scene_calls = calls.clone();
        scene.on_key(move |_, event| {
            scene_calls.borrow_mut().push(format!("scene {}", event.pressed));
            Ok(())
        });
        scene.add_all([&high, &low]).unwrap();

        scene.handle_input(InputEvent::KeyDown(Key::Space));
        assert_eq!(*calls.borrow(), ["scene true", "low", "high"]);
        assert!(scene.is_key_pressed(Key::Space));

        scene.handle_input(InputEvent::KeyUp(Key::Space));
        assert!(!scene.is_key_pressed(Key::Space));
    }

    #[test]
    fn test_mouse_dispatch_order() {
        let mut scene = scene();
        let calls = log();
        let high = Actor::circle(1.0);
        high.set_layer(2);
        let low = Actor::circle(1.0);
        low.set_layer(1);
        for (actor, name) in [(&high, "high"), (&low, "low")] {
            let calls = calls.clone();
            actor.on_mouse(move |_, event| {
                let action = match event.action {
                    MouseAction::Down(_) => "down",
                    MouseAction::Wheel(_) => "wheel",
                    _ => "other",
                };
                calls
                    .borrow_mut()
                    .push(format!("{name} {action} {}", event.position));
                Ok(())
            });
        }
        let scene_calls = calls.clone();
        scene.on_mouse(move |_, event| {
            scene_calls.borrow_mut().push(format!("scene {}", event.position));
            Ok(())
        });
        scene.add_all([&high, &low]).unwrap();

        let screen = Vector::new(432.0, 268.0);
        let at = Vector::new(1.0, 1.0);
        scene.handle_input(InputEvent::MouseDown {
            button: MouseButton::Left,
            screen,
        });
        assert_eq!(
            *calls.borrow(),
            [
                format!("scene {at}"),
                format!("low down {at}"),
                format!("high down {at}"),
            ]
        );

        calls.borrow_mut().clear();
        scene.handle_input(InputEvent::MouseWheel { screen, delta: -1.0 });
        assert_eq!(
            *calls.borrow(),
            [
                format!("scene {at}"),
                format!("low wheel {at}"),
                format!("high wheel {at}"),
            ]
        );
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        let mut scene = scene();
        let calls = log();
        scene.on_key(|_, _| -> anyhow::Result<()> { panic!("listener bug") });
        let after = calls.clone();
        scene.on_key(move |_, event| {
            after.borrow_mut().push(format!("after {}", event.pressed));
            Ok(())
        });

        scene.handle_input(InputEvent::KeyDown(Key::Space));
        scene.handle_input(InputEvent::KeyUp(Key::Space));
        assert_eq!(*calls.borrow(), ["after true", "after false"]);
        assert!(!scene.is_key_pressed(Key::Space));
    }

    #[test]
    fn test_listener_removed_mid_pass_is_skipped() {
        let mut scene = scene();
        let calls = log();
        let victim: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let target = victim.clone();
        scene.on_key(move |scene, _| {
            if let Some(id) = target.get() {
                scene.remove_listener(id);
            }
            Ok(())
        });
        let victim_calls = calls.clone();
        victim.set(Some(scene.on_key(move |_, _| {
            victim_calls.borrow_mut().push("victim".to_string());
            Ok(())
        })));

        scene.handle_input(InputEvent::KeyDown(Key::char('a')));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_failing_listener_does_not_stop_dispatch() {
        let mut scene = scene();
        let calls = log();
        let actor = Actor::circle(1.0);
        actor.on_key(|_, _| anyhow::bail!("broken listener"));
        let after = calls.clone();
        actor.on_key(move |_, _| {
            after.borrow_mut().push("after".to_string());
            Ok(())
        });
        scene.add(&actor).unwrap();
        scene.handle_input(InputEvent::KeyDown(Key::Enter));
        assert_eq!(*calls.borrow(), ["after"]);
    }

    #[test]
    fn test_removed_actor_gets_no_more_events() {
        let mut scene = scene();
        let calls = log();
        let first = Actor::circle(1.0);
        let second = Actor::circle(1.0);
        second.set_layer(1);
        let doomed = second.clone();
        first.on_key(move |scene, _| {
            scene.remove(&doomed)?;
            Ok(())
        });
        let second_calls = calls.clone();
        second.on_key(move |_, _| {
            second_calls.borrow_mut().push("second".to_string());
            Ok(())
        });
        scene.add_all([&first, &second]).unwrap();

        scene.handle_input(InputEvent::KeyDown(Key::Escape));
        assert!(calls.borrow().is_empty());
        assert!(!second.is_mounted());
    }

    #[test]
    fn test_mouse_position_in_world_coordinates() {
        let mut scene = scene();
        let seen = Rc::new(Cell::new(Vector::NULL));
        let sink = seen.clone();
        scene.on_mouse(move |_, event| {
            sink.set(event.position);
            Ok(())
        });
        scene.handle_input(InputEvent::MouseDown {
            button: MouseButton::Left,
            screen: Vector::new(432.0, 268.0),
        });
        assert_eq!(seen.get(), Vector::new(1.0, 1.0));
        assert_eq!(scene.mouse_position(), Vector::new(1.0, 1.0));
    }

    #[test]
    fn test_frame_update_order_and_elapsed() {
        let mut scene = scene();
        let calls = log();
        let actor = Actor::circle(1.0);
        let actor_calls = calls.clone();
        actor.on_frame_update(move |_, dt| {
            actor_calls.borrow_mut().push(format!("actor {dt}"));
            Ok(())
        });
        let scene_calls = calls.clone();
        scene.on_frame_update(move |_, dt| {
            scene_calls.borrow_mut().push(format!("scene {dt}"));
            Ok(())
        });
        scene.add(&actor).unwrap();
        scene.update(0.5);
        assert_eq!(*calls.borrow(), ["scene 0.5", "actor 0.5"]);
    }

    #[test]
    fn test_free_fall_scenario() {
        init_tracing();
        let config = EngineConfig {
            physics_step: 0.1,
            gravity: Vector::new(0.0, -10.0),
            substeps: 1,
            ..EngineConfig::default()
        };
        let mut scene = Scene::with_config(&config, Rc::new(ResourceRegistry::new())).unwrap();
        let ball = dynamic_circle(0.5, 0.0, 10.0);
        scene.add(&ball).unwrap();
        for _ in 0..10 {
            scene.step_physics();
        }
        assert!((ball.position().y - 4.5).abs() < 1e-3);
        assert!((ball.velocity().y + 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_static_actor_stays_put() {
        let mut scene = scene();
        scene.enable_gravity();
        let wall = Actor::rectangle(1.0, 3.0)
            .with_body_type(BodyType::Static)
            .with_position(4.0, -2.0);
        scene.add(&wall).unwrap();
        for _ in 0..20 {
            wall.apply_force(Vector::new(-50.0, 500.0));
            scene.step_physics();
        }
        assert_eq!(wall.position(), Vector::new(4.0, -2.0));
    }

    #[test]
    fn test_single_collision_callback_per_episode() {
        let mut scene = scene();
        let hits = Rc::new(Cell::new(0));
        let ends = Rc::new(Cell::new(0));
        let left = dynamic_circle(0.5, 0.0, 0.0);
        let right = dynamic_circle(0.5, 1.5, 0.0);
        for (ball, vx) in [(&left, 5.0), (&right, -5.0)] {
            ball.set_velocity(Vector::new(vx, 0.0));
            ball.set_restitution(1.0);
        }
        let counter = hits.clone();
        left.on_collision_with(&right, move |_, event| {
            assert!(event.normal.x > 0.0);
            counter.set(counter.get() + 1);
            Ok(())
        });
        let counter = ends.clone();
        left.on_collision_end(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        scene.add_all([&left, &right]).unwrap();

        for _ in 0..60 {
            scene.step_physics();
        }
        assert_eq!(hits.get(), 1);
        assert_eq!(ends.get(), 1);
    }

    #[test]
    fn test_remove_during_collision_callback() {
        let mut scene = scene();
        let calls = log();
        let a = dynamic_circle(0.5, 0.0, 0.0);
        let b = dynamic_circle(0.5, 0.5, 0.0);
        let doomed = b.clone();
        a.on_collision(move |scene, _| {
            scene.remove(&doomed)?;
            Ok(())
        });
        let b_calls = calls.clone();
        b.on_collision(move |_, _| {
            b_calls.borrow_mut().push("b collision".to_string());
            Ok(())
        });
        let b_frame = calls.clone();
        b.on_frame_update(move |_, _| {
            b_frame.borrow_mut().push("b frame".to_string());
            Ok(())
        });
        scene.add_all([&a, &b]).unwrap();

        scene.step_physics();
        scene.update(0.016);
        scene.step_physics();

        assert!(calls.borrow().is_empty());
        assert!(!b.is_mounted());
        assert_eq!(scene.actor_count(), 1);
        assert_eq!(scene.world().body_count(), 1);
    }

    #[test]
    fn test_joint_release_fires_once() {
        let mut scene = scene();
        scene.enable_gravity();
        let anchor = Actor::rectangle(1.0, 1.0).with_body_type(BodyType::Static);
        let bob = dynamic_circle(0.25, 2.0, 0.0);
        scene.add_all([&anchor, &bob]).unwrap();

        let joint = scene
            .create_distance_joint(&anchor, Vector::new(0.5, 0.5), &bob, Vector::new(0.25, 0.25))
            .unwrap();
        let released = Rc::new(Cell::new(0));
        let counter = released.clone();
        joint.on_release(move || counter.set(counter.get() + 1));

        for _ in 0..100 {
            scene.step_physics();
        }
        assert_eq!(released.get(), 0);
        assert_eq!(scene.joints().len(), 1);

        scene.remove(&bob).unwrap();
        assert_eq!(released.get(), 1);
        scene.remove(&anchor).unwrap();
        assert_eq!(released.get(), 1);
        assert!(joint.is_released());
        assert!(scene.joints().is_empty());
    }

    #[test]
    fn test_joint_requires_colocated_actors() {
        let mut scene = scene();
        let live = Actor::circle(1.0);
        let detached = Actor::circle(1.0);
        scene.add(&live).unwrap();
        assert!(matches!(
            scene.create_revolute_joint(&live, &detached, Vector::NULL),
            Err(EngineError::JointActorsNotColocated)
        ));
        assert!(matches!(
            scene.create_revolute_joint(&live, &live, Vector::NULL),
            Err(EngineError::JointSelfReference)
        ));

        let mut other = Scene::default();
        other.add(&detached).unwrap();
        assert!(matches!(
            scene.create_rope_joint(&live, Vector::NULL, &detached, Vector::NULL, 1.0),
            Err(EngineError::JointActorsNotColocated)
        ));
    }

    #[test]
    fn test_revolute_anchor_is_shared() {
        let mut scene = scene();
        let a = Actor::rectangle(2.0, 2.0).with_position(0.0, 0.0);
        let b = Actor::rectangle(2.0, 2.0).with_position(2.0, 0.0);
        scene.add_all([&a, &b]).unwrap();
        let joint = scene
            .create_revolute_joint(&a, &b, Vector::new(2.0, 1.0))
            .unwrap();
        assert_eq!(joint.anchors(), (Vector::new(2.0, 1.0), Vector::new(0.0, 1.0)));
        assert!(scene.remove_joint(&joint));
        assert!(!scene.remove_joint(&joint));
        assert!(joint.is_released());
    }

    #[test]
    fn test_prismatic_and_weld_joints() {
        let mut scene = scene();
        let a = Actor::rectangle(2.0, 2.0);
        let b = Actor::rectangle(2.0, 2.0).with_position(2.0, 0.0);
        scene.add_all([&a, &b]).unwrap();

        let slide = scene
            .create_prismatic_joint(&a, &b, Vector::new(2.0, 1.0), Vector::RIGHT, Some((-1.0, 1.0)))
            .unwrap();
        assert_eq!(slide.anchors(), (Vector::new(2.0, 1.0), Vector::new(0.0, 1.0)));
        let weld = scene.create_weld_joint(&a, &b, Vector::new(2.0, 0.0)).unwrap();
        assert_eq!(weld.kind(), JointKind::Weld);
        assert_eq!(scene.joints().len(), 2);

        assert!(matches!(
            scene.create_prismatic_joint(&a, &b, Vector::NULL, Vector::NULL, None),
            Err(EngineError::InvalidJointAxis)
        ));
        assert!(matches!(
            scene.create_prismatic_joint(&a, &b, Vector::NULL, Vector::UP, Some((1.0, -1.0))),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert_eq!(scene.joints().len(), 2);
    }

    #[test]
    fn test_weld_carries_actor_along() {
        let mut scene = scene();
        let cart = dynamic_circle(0.5, 0.0, 0.0);
        let trailer = Actor::rectangle(1.0, 0.2)
            .with_body_type(BodyType::Dynamic)
            .with_position(1.0, 0.4);
        scene.add_all([&cart, &trailer]).unwrap();
        scene.create_weld_joint(&cart, &trailer, Vector::new(1.0, 0.5)).unwrap();

        cart.set_velocity(Vector::new(2.0, 0.0));
        for _ in 0..100 {
            scene.step_physics();
        }
        let offset = trailer.position() - cart.position();
        assert!(offset.distance(Vector::new(1.0, 0.4)) < 0.05, "offset {offset}");
        assert!(cart.position().x > 0.5);
    }

    #[test]
    fn test_is_grounded_needs_live_dynamic_actor() {
        let mut scene = scene();
        scene.enable_gravity();
        let ground = Actor::rectangle(10.0, 1.0)
            .with_body_type(BodyType::Static)
            .with_position(-5.0, -1.0);
        let player = Actor::rectangle(1.0, 1.0)
            .with_body_type(BodyType::Dynamic)
            .with_position(0.0, 0.5);
        scene.add_all([&ground, &player]).unwrap();

        assert!(!scene.is_grounded(&player).unwrap());
        for _ in 0..200 {
            scene.step_physics();
        }
        assert!(scene.is_grounded(&player).unwrap());
        assert!(matches!(
            scene.is_grounded(&ground),
            Err(EngineError::NotDynamic(_))
        ));
        assert!(matches!(
            scene.is_grounded(&Actor::circle(1.0)),
            Err(EngineError::ActorNotInScene(_))
        ));
    }

    #[test]
    fn test_dropped_scene_releases_actors_and_joints() {
        let actor = Actor::circle(1.0);
        let unmounted = Rc::new(Cell::new(false));
        let flag = unmounted.clone();
        actor.on_unmount(move |_| {
            flag.set(true);
            Ok(())
        });
        let joint = {
            let mut scene = scene();
            let partner = Actor::circle(1.0).with_position(3.0, 0.0);
            scene.add_all([&actor, &partner]).unwrap();
            scene.create_revolute_joint(&actor, &partner, Vector::new(2.5, 1.0)).unwrap()
        };

        assert!(!actor.is_mounted());
        assert!(joint.is_released());
        assert!(!unmounted.get());
        Scene::default().add(&actor).unwrap();
    }

    #[test]
    fn test_dropped_scene_leaves_other_scenes_alone() {
        let mut kept = scene();
        let actor = Actor::circle(1.0);
        kept.add(&actor).unwrap();
        drop(scene());
        assert!(kept.contains(&actor));
    }

    #[test]
    fn test_remove_clears_camera_focus() {
        let mut scene = scene();
        let hero = Actor::circle(1.0);
        scene.add(&hero).unwrap();
        scene.camera_mut().follow(&hero);
        scene.remove(&hero).unwrap();
        assert!(!scene.camera().has_focus_actor());
    }

    #[test]
    fn test_mount_and_unmount_listeners() {
        let mut scene = scene();
        let calls = log();
        let actor = Actor::circle(1.0);
        let mounted = calls.clone();
        actor.on_mount(move |_| {
            mounted.borrow_mut().push("mount".to_string());
            Ok(())
        });
        let unmounted = calls.clone();
        actor.on_unmount(move |_| {
            unmounted.borrow_mut().push("unmount".to_string());
            Ok(())
        });
        scene.add(&actor).unwrap();
        scene.remove(&actor).unwrap();
        assert_eq!(*calls.borrow(), ["mount", "unmount"]);
    }

    #[test]
    fn test_render_in_layer_order() {
        let mut scene = scene();
        let front = Actor::circle(1.0);
        front.set_layer(3);
        let back = Actor::rectangle(1.0, 1.0);
        let hidden = Actor::circle(1.0);
        hidden.set_visible(false);
        scene.add_all([&front, &back, &hidden]).unwrap();

        let mut renderer = RecordingRenderer::default();
        scene.render(&mut renderer);
        assert_eq!(renderer.cleared, vec![Color::BLACK]);
        assert_eq!(renderer.commands.len(), 2);
        assert!(matches!(renderer.commands[0], crate::render::DrawCommand::Polygon { .. }));
        assert!(matches!(renderer.commands[1], crate::render::DrawCommand::Circle { .. }));
        assert_eq!(renderer.finished, 1);
    }

    #[test]
    fn test_snapshot_is_serializable() {
        let mut scene = scene();
        scene.add(&Actor::circle(1.0).with_name("ball")).unwrap();
        let json = serde_json::to_string(&scene.snapshot()).unwrap();
        let back: SceneSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.actors.len(), 1);
        assert_eq!(back.id, scene.id());
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut scene = scene();
        let a = dynamic_circle(0.5, 0.0, 0.0);
        let b = dynamic_circle(0.5, 3.0, 0.0);
        scene.add_all([&a, &b]).unwrap();
        scene.create_rope_joint(&a, Vector::NULL, &b, Vector::NULL, 4.0).unwrap();
        scene.clear();
        assert_eq!(scene.actor_count(), 0);
        assert_eq!(scene.world().body_count(), 0);
        assert!(scene.joints().is_empty());
    }

    #[test]
    fn test_actors_at_point() {
        let mut scene = scene();
        let below = Actor::rectangle(4.0, 4.0);
        let above = Actor::circle(1.0);
        above.set_layer(1);
        scene.add_all([&below, &above]).unwrap();
        assert_eq!(scene.actors_at(Vector::new(1.0, 1.0)), vec![above, below.clone()]);
        assert_eq!(scene.actors_at(Vector::new(3.5, 3.5)), vec![below]);
    }
}

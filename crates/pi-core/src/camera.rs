//! Camera: maps world coordinates to screen pixels.
//!
//! World y grows upwards, screen y grows downwards. The camera focus is
//! drawn at the centre of the viewport.

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, WeakActor};
use crate::bounds::Bounds;
use crate::error::{EngineError, Result};
use crate::vector::Vector;

/// Pixels per world unit of a fresh camera.
pub const DEFAULT_METER: f64 = 32.0;

/// Relative meter change of one zoom step.
pub const DEFAULT_ZOOM_FACTOR: f64 = 0.05;

/// Frozen camera state for one frame, used to convert between world and
/// screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenTransform {
    pub focus: Vector,
    pub meter: f64,
    pub rotation: f64,
    /// Viewport size in pixels.
    pub viewport: (f64, f64),
}

impl ScreenTransform {
    pub fn to_screen(&self, world: Vector) -> Vector {
        let relative = (world - self.focus).rotate(-self.rotation) * self.meter;
        Vector::new(
            self.viewport.0 / 2.0 + relative.x,
            self.viewport.1 / 2.0 - relative.y,
        )
    }

    pub fn to_world(&self, screen: Vector) -> Vector {
        let relative = Vector::new(
            screen.x - self.viewport.0 / 2.0,
            self.viewport.1 / 2.0 - screen.y,
        ) / self.meter;
        self.focus + relative.rotate(self.rotation)
    }

    /// Converts a world length into pixels.
    pub fn scale(&self, length: f64) -> f64 {
        length * self.meter
    }

    /// World area currently visible, ignoring rotation.
    pub fn visible_area(&self) -> Bounds {
        Bounds::new(0.0, 0.0, self.viewport.0 / self.meter, self.viewport.1 / self.meter)
            .with_center(self.focus)
    }
}

/// Viewpoint of a scene.
#[derive(Debug, Clone)]
pub struct Camera {
    focus: Vector,
    offset: Vector,
    bounds: Option<Bounds>,
    meter: f64,
    rotation: f64,
    /// Interpolation factor towards the target per frame (0.0 = instant).
    smoothing: f64,
    focus_actor: Option<WeakActor>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        Self {
            focus: Vector::NULL,
            offset: Vector::NULL,
            bounds: None,
            meter: DEFAULT_METER,
            rotation: 0.0,
            smoothing: 0.0,
            focus_actor: None,
        }
    }

    pub fn with_meter(meter: f64) -> Result<Self> {
        let mut camera = Self::new();
        camera.set_meter(meter)?;
        Ok(camera)
    }

    /// Effective focus: the focus point plus offset, moved into the bounds.
    pub fn focus(&self) -> Vector {
        self.clamp(self.focus + self.offset)
    }

    /// Sets a fixed focus point and stops following an actor.
    pub fn set_focus(&mut self, focus: Vector) {
        self.focus = focus;
        self.focus_actor = None;
    }

    pub fn move_focus(&mut self, delta: Vector) {
        self.focus = self.focus + delta;
    }

    /// Follows the actor's centre on every frame.
    pub fn follow(&mut self, actor: &Actor) {
        self.focus_actor = Some(actor.downgrade());
    }

    pub fn unfollow(&mut self) {
        self.focus_actor = None;
    }

    pub fn focus_actor(&self) -> Option<Actor> {
        self.focus_actor.as_ref()?.upgrade()
    }

    pub fn has_focus_actor(&self) -> bool {
        self.focus_actor.is_some()
    }

    pub(crate) fn is_following(&self, actor: &Actor) -> bool {
        self.focus_actor
            .as_ref()
            .is_some_and(|weak| weak.id() == actor.id())
    }

    pub fn offset(&self) -> Vector {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Vector) {
        self.offset = offset;
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Restricts the focus to `bounds`; `None` lifts the restriction.
    pub fn set_bounds(&mut self, bounds: Option<Bounds>) {
        self.bounds = bounds;
    }

    /// Pixels per world unit.
    pub fn meter(&self) -> f64 {
        self.meter
    }

    pub fn set_meter(&mut self, meter: f64) -> Result<()> {
        if !(meter.is_finite() && meter > 0.0) {
            return Err(EngineError::InvalidConfiguration(format!(
                "camera meter must be positive, got {meter}"
            )));
        }
        self.meter = meter;
        Ok(())
    }

    pub fn zoom_in(&mut self, factor: f64) {
        self.meter += self.meter * factor;
    }

    /// Zooming out never lets the meter reach zero.
    pub fn zoom_out(&mut self, factor: f64) {
        let meter = self.meter - self.meter * factor;
        if meter > 0.0 {
            self.meter = meter;
        }
    }

    /// Rotation of the view in radians.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = rotation % std::f64::consts::TAU;
    }

    pub fn rotate_by(&mut self, angle: f64) {
        self.set_rotation(self.rotation + angle);
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f64) {
        self.smoothing = smoothing.clamp(0.0, 0.99);
    }

    /// Moves the focus towards the followed actor and into the bounds.
    pub fn update(&mut self) {
        if let Some(target) = self.focus_actor().map(|actor| actor.center()) {
            self.focus = if self.smoothing > 0.0 {
                self.focus.lerp(target, 1.0 - self.smoothing)
            } else {
                target
            };
        } else if self.focus_actor.take().is_some() {
            tracing::debug!("[scene] camera focus actor dropped, keeping last focus");
        }
        self.focus = self.clamp(self.focus);
    }

    pub fn transform(&self, viewport: (f64, f64)) -> ScreenTransform {
        ScreenTransform {
            focus: self.focus(),
            meter: self.meter,
            rotation: self.rotation,
            viewport,
        }
    }

    pub fn world_to_screen(&self, world: Vector, viewport: (f64, f64)) -> Vector {
        self.transform(viewport).to_screen(world)
    }

    pub fn screen_to_world(&self, screen: Vector, viewport: (f64, f64)) -> Vector {
        self.transform(viewport).to_world(screen)
    }

    fn clamp(&self, point: Vector) -> Vector {
        match &self.bounds {
            Some(bounds) => bounds.clamp_point(point),
            None => point,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    const VIEWPORT: (f64, f64) = (800.0, 600.0);

    #[test]
    fn test_focus_is_viewport_center() {
        let mut camera = Camera::new();
        camera.set_focus(Vector::new(10.0, 5.0));
        assert_eq!(
            camera.world_to_screen(Vector::new(10.0, 5.0), VIEWPORT),
            Vector::new(400.0, 300.0)
        );
        // One unit up is one meter of pixels towards the top of the screen.
        assert_eq!(
            camera.world_to_screen(Vector::new(11.0, 6.0), VIEWPORT),
            Vector::new(432.0, 268.0)
        );
    }

    #[test]
    fn test_screen_world_inverse() {
        let mut camera = Camera::with_meter(20.0).unwrap();
        camera.set_focus(Vector::new(-3.0, 7.5));
        camera.set_rotation(0.3);
        let world = Vector::new(1.25, -2.0);
        let back = camera.screen_to_world(camera.world_to_screen(world, VIEWPORT), VIEWPORT);
        assert!(back.distance(world) < 1e-9);
    }

    #[test]
    fn test_rotation_turns_view() {
        let mut camera = Camera::new();
        camera.set_rotation(FRAC_PI_2);
        let screen = camera.world_to_screen(Vector::new(0.0, 1.0), VIEWPORT);
        assert!((screen.x - 432.0).abs() < 1e-9);
        assert!((screen.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_meter_must_be_positive() {
        let mut camera = Camera::new();
        assert!(camera.set_meter(0.0).is_err());
        assert!(camera.set_meter(-1.0).is_err());
        assert_eq!(camera.meter(), DEFAULT_METER);
        camera.zoom_in(0.5);
        assert_eq!(camera.meter(), 48.0);
        camera.zoom_out(1.0);
        assert_eq!(camera.meter(), 48.0);
    }

    #[test]
    fn test_bounds_clamp_focus_and_offset() {
        let mut camera = Camera::new();
        camera.set_bounds(Some(Bounds::new(0.0, 0.0, 10.0, 10.0)));
        camera.set_focus(Vector::new(8.0, 5.0));
        camera.set_offset(Vector::new(5.0, 0.0));
        assert_eq!(camera.focus(), Vector::new(10.0, 5.0));
        camera.set_focus(Vector::new(-4.0, 20.0));
        camera.update();
        assert_eq!(camera.focus(), Vector::new(5.0, 10.0));
    }

    #[test]
    fn test_follows_actor_center() {
        let mut camera = Camera::new();
        let actor = Actor::circle(1.0).with_position(4.0, 4.0);
        camera.follow(&actor);
        camera.update();
        assert_eq!(camera.focus(), Vector::new(5.0, 5.0));

        camera.set_smoothing(0.5);
        actor.set_position(Vector::new(6.0, 4.0));
        camera.update();
        assert_eq!(camera.focus(), Vector::new(6.0, 5.0));
    }

    #[test]
    fn test_dropped_actor_releases_focus() {
        let mut camera = Camera::new();
        {
            let actor = Actor::circle(1.0);
            camera.follow(&actor);
        }
        camera.update();
        assert!(!camera.has_focus_actor());
    }
}

//! Screen-space draw commands and the renderer seam to the host.

use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::camera::ScreenTransform;
use crate::resources::{Color, ImageHandle};
use crate::shape::Shape;
use crate::vector::Vector;

/// One primitive in screen pixels, y pointing down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Circle {
        center: Vector,
        radius: f64,
        color: Color,
    },
    Polygon {
        points: Vec<Vector>,
        color: Color,
    },
    /// Image stretched into the quad given by its four corners,
    /// counter-clockwise from the image's lower-left corner.
    Image {
        image: ImageHandle,
        corners: [Vector; 4],
        opacity: f64,
    },
}

/// Implemented by the host window. The core calls it once per frame with a
/// cleared background followed by the draw commands in layer order.
pub trait Renderer {
    fn clear(&mut self, background: Color);

    fn draw(&mut self, command: DrawCommand);

    /// Called after the last command of a frame.
    fn finish(&mut self) {}
}

/// Anything that can describe itself as draw commands.
pub trait Renderable {
    fn draw_commands(&self, transform: &ScreenTransform) -> Vec<DrawCommand>;
}

impl Renderable for Actor {
    fn draw_commands(&self, transform: &ScreenTransform) -> Vec<DrawCommand> {
        let state = self.state();
        if !state.visible || state.opacity <= 0.0 {
            return Vec::new();
        }
        let pose = state.pose();
        let color = state.color.with_opacity(state.opacity);

        let command = match &state.shape {
            Shape::Circle { radius } => DrawCommand::Circle {
                center: transform.to_screen(pose.to_world(Vector::new(*radius, *radius))),
                radius: transform.scale(*radius),
                color,
            },
            Shape::Rectangle { .. } | Shape::Polygon { .. } => DrawCommand::Polygon {
                points: state
                    .shape
                    .outline()
                    .into_iter()
                    .map(|p| transform.to_screen(pose.to_world(p)))
                    .collect(),
                color,
            },
            Shape::Sprite {
                frames,
                frame_duration,
                ..
            } => {
                let Some(image) = current_frame(frames, *frame_duration, state.animation_time)
                else {
                    return Vec::new();
                };
                let local = state.shape.local_bounds().points();
                DrawCommand::Image {
                    image,
                    corners: local.map(|p| transform.to_screen(pose.to_world(p))),
                    opacity: state.opacity,
                }
            }
        };
        vec![command]
    }
}

/// Frame shown after `elapsed` seconds of a looping animation.
pub(crate) fn current_frame(
    frames: &[ImageHandle],
    frame_duration: f64,
    elapsed: f64,
) -> Option<ImageHandle> {
    if frames.is_empty() {
        return None;
    }
    if frame_duration.is_nan() || frame_duration <= 0.0 || !elapsed.is_finite() {
        return frames.first().copied();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = (elapsed.max(0.0) / frame_duration).floor() as usize % frames.len();
    frames.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> ScreenTransform {
        ScreenTransform {
            focus: Vector::NULL,
            meter: 10.0,
            rotation: 0.0,
            viewport: (200.0, 100.0),
        }
    }

    #[test]
    fn test_circle_command() {
        let ball = Actor::circle(1.0).with_position(-1.0, -1.0);
        let commands = ball.draw_commands(&transform());
        assert_eq!(
            commands,
            vec![DrawCommand::Circle {
                center: Vector::new(100.0, 50.0),
                radius: 10.0,
                color: Color::default(),
            }]
        );
    }

    #[test]
    fn test_rectangle_flips_y() {
        let block = Actor::rectangle(2.0, 1.0);
        let commands = block.draw_commands(&transform());
        let DrawCommand::Polygon { points, .. } = &commands[0] else {
            panic!("polygon expected");
        };
        assert_eq!(points[0], Vector::new(100.0, 50.0));
        assert_eq!(points[2], Vector::new(120.0, 40.0));
    }

    #[test]
    fn test_invisible_actor_draws_nothing() {
        let block = Actor::rectangle(2.0, 1.0);
        block.set_visible(false);
        assert!(block.draw_commands(&transform()).is_empty());
        block.set_visible(true);
        block.set_opacity(0.0);
        assert!(block.draw_commands(&transform()).is_empty());
    }

    #[test]
    fn test_sprite_frames_loop() {
        let frames = [ImageHandle(1), ImageHandle(2), ImageHandle(3)];
        assert_eq!(current_frame(&frames, 0.1, 0.0), Some(ImageHandle(1)));
        assert_eq!(current_frame(&frames, 0.1, 0.25), Some(ImageHandle(3)));
        assert_eq!(current_frame(&frames, 0.1, 0.35), Some(ImageHandle(1)));
        assert_eq!(current_frame(&[], 0.1, 0.35), None);
        assert_eq!(current_frame(&frames, 0.0, 5.0), Some(ImageHandle(1)));
    }
}

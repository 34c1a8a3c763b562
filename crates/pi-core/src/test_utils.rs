//! Shared fixtures for unit tests.

use std::collections::VecDeque;

use tracing_subscriber::EnvFilter;

use crate::event::InputEvent;
use crate::game_loop::Host;
use crate::render::{DrawCommand, Renderer};
use crate::resources::Color;

/// Routes log output through the test harness. Safe to call from every test.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Keeps everything it is asked to draw.
#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    pub cleared: Vec<Color>,
    pub commands: Vec<DrawCommand>,
    pub finished: usize,
}

impl Renderer for RecordingRenderer {
    fn clear(&mut self, background: Color) {
        self.cleared.push(background);
    }

    fn draw(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    fn finish(&mut self) {
        self.finished += 1;
    }
}

/// Host that feeds pre-recorded input, one batch per frame.
#[derive(Debug)]
pub(crate) struct ScriptedHost {
    pub input: VecDeque<Vec<InputEvent>>,
    pub viewport: (f64, f64),
    pub renderer: RecordingRenderer,
    pub presented: usize,
    pub close_after: Option<usize>,
}

impl ScriptedHost {
    pub fn new(input: Vec<Vec<InputEvent>>) -> Self {
        Self {
            input: input.into(),
            viewport: (800.0, 600.0),
            renderer: RecordingRenderer::default(),
            presented: 0,
            close_after: None,
        }
    }

    pub fn closing_after(mut self, frames: usize) -> Self {
        self.close_after = Some(frames);
        self
    }
}

impl Host for ScriptedHost {
    fn poll_input(&mut self) -> Vec<InputEvent> {
        self.input.pop_front().unwrap_or_default()
    }

    fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    fn renderer(&mut self) -> &mut dyn Renderer {
        &mut self.renderer
    }

    fn present(&mut self) {
        self.presented += 1;
    }

    fn should_close(&self) -> bool {
        self.close_after.is_some_and(|n| self.presented >= n)
    }
}

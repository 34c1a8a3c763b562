//! The frame loop driving one scene at a time.
//!
//! Per frame: queued input, frame-update listeners (loop-wide, scene-wide,
//! then actors), physics, camera follow and rendering.

use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::event::{EventQueue, InputEvent};
use crate::listener::{FrameUpdateListener, ListenerId, Listeners, invoke};
use crate::render::Renderer;
use crate::resources::ResourceRegistry;
use crate::scene::Scene;

/// The window or test harness the loop runs in.
pub trait Host {
    /// Input collected since the previous frame, oldest first.
    fn poll_input(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }

    /// Current viewport size in pixels.
    fn viewport(&self) -> (f64, f64);

    fn renderer(&mut self) -> &mut dyn Renderer;

    /// Shows the frame that was just rendered.
    fn present(&mut self) {}

    fn should_close(&self) -> bool;
}

pub struct GameLoop {
    config: EngineConfig,
    resources: Rc<ResourceRegistry>,
    scene: Scene,
    queue: EventQueue,
    frame_update_listeners: Listeners<FrameUpdateListener>,
    frame: u64,
}

impl GameLoop {
    pub fn new(config: EngineConfig, resources: Rc<ResourceRegistry>) -> Result<Self> {
        let scene = Scene::with_config(&config, resources.clone())?;
        Ok(Self {
            config,
            resources,
            scene,
            queue: EventQueue::new(),
            frame_update_listeners: Listeners::default(),
            frame: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A fresh scene set up from the loop's configuration and resources.
    pub fn new_scene(&self) -> Result<Scene> {
        Scene::with_config(&self.config, self.resources.clone())
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Replaces the running scene, returning the previous one. Keys held
    /// down are not replayed into the new scene.
    pub fn set_scene(&mut self, scene: Scene) -> Scene {
        tracing::info!("[loop] switching scene {} -> {}", self.scene.id(), scene.id());
        std::mem::replace(&mut self.scene, scene)
    }

    /// Handle for pushing input from other threads.
    pub fn event_queue(&self) -> EventQueue {
        self.queue.clone()
    }

    /// Frames completed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Registers a listener that runs every frame before the scene's own,
    /// whichever scene is active.
    pub fn on_frame_update(
        &mut self,
        listener: impl FnMut(&mut Scene, f64) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.frame_update_listeners.add(Box::new(listener))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.frame_update_listeners.remove(id)
    }

    /// Runs one frame that covers `elapsed` seconds.
    pub fn frame(&mut self, elapsed: f64, host: &mut dyn Host) {
        let elapsed = self.cap_elapsed(elapsed);
        self.scene.set_viewport(host.viewport());

        self.queue.extend(host.poll_input());
        for event in self.queue.drain() {
            self.scene.handle_input(event);
        }

        for (id, listener) in self.frame_update_listeners.snapshot() {
            if self.frame_update_listeners.contains(id) {
                let scene = &mut self.scene;
                invoke("frame update listener", id, &listener, |f| f(scene, elapsed));
            }
        }
        self.scene.update(elapsed);
        self.scene.advance_physics(elapsed);
        self.scene.update_camera();

        self.scene.render(host.renderer());
        host.present();
        self.frame += 1;
    }

    /// Runs frames until the host asks to close, sleeping off whatever is left
    /// of each frame's time slot.
    pub fn run(&mut self, host: &mut dyn Host) {
        let frame_duration = Duration::from_secs_f64(self.config.frame_duration());
        tracing::info!("[loop] running at {} fps", self.config.framerate);

        let mut last = Instant::now();
        while !host.should_close() {
            let start = Instant::now();
            let elapsed = start.duration_since(last).as_secs_f64();
            last = start;

            self.frame(elapsed, host);

            let spent = start.elapsed();
            if self.config.debug {
                tracing::debug!("[loop] frame {} took {:?}", self.frame, spent);
            }
            if let Some(rest) = frame_duration.checked_sub(spent) {
                std::thread::sleep(rest);
            }
        }
        tracing::info!("[loop] stopped after {} frames", self.frame);
    }

    /// Keeps a stalled frame from being simulated as one huge step.
    fn cap_elapsed(&self, elapsed: f64) -> f64 {
        let max = 2.0 * self.config.frame_duration();
        if !elapsed.is_finite() || elapsed < 0.0 {
            tracing::warn!("[loop] ignoring invalid frame time {elapsed}");
            return 0.0;
        }
        if elapsed > max {
            tracing::debug!("[loop] frame time {elapsed:.4}s capped to {max:.4}s");
            return max;
        }
        elapsed
    }
}

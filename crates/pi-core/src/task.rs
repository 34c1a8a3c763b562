//! Periodic tasks: closures run at a fixed interval of frame time.
//!
//! A task rides on a scene-wide frame-update listener. It only advances
//! while the scene receives frame updates, so a paused game loop pauses its
//! tasks too.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{EngineError, Result};
use crate::listener::ListenerId;
use crate::scene::Scene;

/// Receives how often the task has run, including this run.
pub type TaskListener = dyn FnMut(&mut Scene, u32) -> anyhow::Result<()>;

#[derive(Debug)]
struct TaskState {
    interval: f64,
    countdown: f64,
    counter: u32,
    remaining: Option<u32>,
    paused: bool,
    finished: bool,
    listener: Option<ListenerId>,
}

/// Shared handle to a scheduled task.
#[derive(Clone)]
pub struct PeriodicTask {
    state: Rc<RefCell<TaskState>>,
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("PeriodicTask")
            .field("interval", &state.interval)
            .field("counter", &state.counter)
            .field("remaining", &state.remaining)
            .field("paused", &state.paused)
            .field("finished", &state.finished)
            .finish_non_exhaustive()
    }
}

fn check_interval(interval: f64) -> Result<()> {
    if interval.is_finite() && interval > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidTask(format!(
            "interval {interval} must be positive"
        )))
    }
}

impl PeriodicTask {
    fn new(interval: f64, repetitions: Option<u32>) -> Result<Self> {
        check_interval(interval)?;
        if repetitions == Some(0) {
            return Err(EngineError::InvalidTask(
                "repetitions must be positive".to_string(),
            ));
        }
        Ok(Self {
            state: Rc::new(RefCell::new(TaskState {
                interval,
                countdown: interval,
                counter: 0,
                remaining: repetitions,
                paused: false,
                finished: false,
                listener: None,
            })),
        })
    }

    pub fn interval(&self) -> f64 {
        self.state.borrow().interval
    }

    /// Changes the interval and restarts the countdown.
    pub fn set_interval(&self, interval: f64) -> Result<()> {
        check_interval(interval)?;
        let mut state = self.state.borrow_mut();
        state.interval = interval;
        state.countdown = interval;
        Ok(())
    }

    /// How often the task has run so far.
    pub fn counter(&self) -> u32 {
        self.state.borrow().counter
    }

    /// Runs left, `None` for a task that repeats until cancelled.
    pub fn remaining(&self) -> Option<u32> {
        self.state.borrow().remaining
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    /// A paused task keeps its countdown and ignores frame time.
    pub fn pause(&self) {
        self.state.borrow_mut().paused = true;
    }

    pub fn resume(&self) {
        self.state.borrow_mut().paused = false;
    }

    pub fn toggle(&self) {
        let mut state = self.state.borrow_mut();
        state.paused = !state.paused;
    }

    /// Whether the task ran its last repetition or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    pub(crate) fn listener_id(&self) -> Option<ListenerId> {
        let state = self.state.borrow();
        if state.finished { None } else { state.listener }
    }

    pub(crate) fn finish(&self) {
        self.state.borrow_mut().finished = true;
    }

    /// Consumes `elapsed` seconds and returns the runs now due as
    /// `(counter, last)`.
    fn advance(&self, elapsed: f64) -> Vec<(u32, bool)> {
        let mut state = self.state.borrow_mut();
        if state.paused || state.finished || !(elapsed.is_finite() && elapsed > 0.0) {
            return Vec::new();
        }
        state.countdown -= elapsed;
        let mut due = Vec::new();
        while state.countdown < 0.0 {
            state.countdown += state.interval;
            if let Some(remaining) = state.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
            }
            state.counter += 1;
            let last = state.remaining == Some(0);
            due.push((state.counter, last));
            if last {
                state.finished = true;
                break;
            }
        }
        due
    }
}

/// Registers the task as a scene-wide frame-update listener that removes
/// itself after the last repetition.
pub(crate) fn schedule(
    scene: &mut Scene,
    interval: f64,
    repetitions: Option<u32>,
    mut task: Box<TaskListener>,
    mut final_task: Option<Box<TaskListener>>,
) -> Result<PeriodicTask> {
    let handle = PeriodicTask::new(interval, repetitions)?;
    let driver = handle.clone();
    let listener = scene.on_frame_update(move |scene, elapsed| {
        let due = driver.advance(elapsed);
        if due.last().is_some_and(|&(_, last)| last) {
            if let Some(id) = driver.state.borrow().listener {
                scene.remove_listener(id);
            }
        }
        for (counter, last) in due {
            match final_task.as_mut() {
                Some(final_task) if last => final_task(scene, counter)?,
                _ => task(scene, counter)?,
            }
        }
        Ok(())
    });
    handle.state.borrow_mut().listener = Some(listener);
    tracing::debug!(
        "[task] scheduled every {interval}s, {} runs",
        repetitions.map_or_else(|| "unlimited".to_string(), |n| n.to_string())
    );
    Ok(handle)
}

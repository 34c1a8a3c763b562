//! Ordered listener registries.
//!
//! Listeners are closures kept in insertion order. A dispatch pass iterates a
//! snapshot of the registry and re-checks membership before each call, so a
//! listener removed during the pass is not invoked later in that pass and a
//! listener added during the pass waits for the next one.

use std::cell::RefCell;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::event::{CollisionEvent, KeyEvent, MouseEvent};
use crate::scene::Scene;

pub type KeyListener = dyn FnMut(&mut Scene, &KeyEvent) -> anyhow::Result<()>;
pub type MouseListener = dyn FnMut(&mut Scene, &MouseEvent) -> anyhow::Result<()>;
/// Receives the elapsed seconds since the previous frame.
pub type FrameUpdateListener = dyn FnMut(&mut Scene, f64) -> anyhow::Result<()>;
pub type CollisionListener = dyn FnMut(&mut Scene, &CollisionEvent) -> anyhow::Result<()>;
/// Receives the actor that stopped touching.
pub type SeparationListener = dyn FnMut(&mut Scene, &Actor) -> anyhow::Result<()>;
pub type MountListener = dyn FnMut(&mut Scene) -> anyhow::Result<()>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by every registration, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

pub(crate) type Shared<F> = Rc<RefCell<Box<F>>>;

/// Insertion-ordered set of listeners of one kind.
pub struct Listeners<F: ?Sized> {
    entries: Vec<(ListenerId, Shared<F>)>,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(id, _)| id))
            .finish()
    }
}

impl<F: ?Sized> Listeners<F> {
    pub fn add(&mut self, listener: Box<F>) -> ListenerId {
        let id = ListenerId::next();
        self.entries.push((id, Rc::new(RefCell::new(listener))));
        id
    }

    /// Returns `false` when the id was not registered here.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<(ListenerId, Shared<F>)> {
        self.entries.clone()
    }
}

/// Runs one listener, isolating its failure from the rest of the pass. Both
/// an `Err` and a panic are logged and swallowed.
///
/// A listener that is already running further up the stack is skipped.
pub(crate) fn invoke<F: ?Sized>(
    kind: &str,
    id: ListenerId,
    listener: &Shared<F>,
    call: impl FnOnce(&mut F) -> anyhow::Result<()>,
) {
    let Ok(mut listener) = listener.try_borrow_mut() else {
        tracing::warn!("[dispatch] {kind} {id} is already running, skipped");
        return;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| call(&mut **listener))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!("[dispatch] {kind} {id} failed: {err:#}"),
        Err(payload) => {
            tracing::error!("[dispatch] {kind} {id} panicked: {}", panic_message(&*payload));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

//! Constraints between two actors.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{Actor, ActorId, WeakActor};
use crate::vector::Vector;

/// Stable identity of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JointId(Uuid);

impl JointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointKind {
    /// Both anchors are pinned to the same point; free rotation.
    Revolute,
    /// Anchors are kept at a fixed distance.
    Distance { length: f64 },
    /// Anchors may not move further apart than `max_length`.
    Rope { max_length: f64 },
    /// The second actor slides along `axis` (world direction at creation)
    /// without rotating relative to the first, optionally within
    /// `limits` measured from the anchor.
    Prismatic {
        axis: Vector,
        limits: Option<(f64, f64)>,
    },
    /// Both actors move as one rigid piece.
    Weld,
}

type ReleaseListener = Box<dyn FnOnce()>;

struct JointInner {
    id: JointId,
    kind: JointKind,
    a: WeakActor,
    b: WeakActor,
    anchor_a: Vector,
    anchor_b: Vector,
    released: bool,
    release_listeners: Vec<ReleaseListener>,
}

/// Shared handle to a joint.
///
/// A joint never keeps its actors alive. It is released exactly once: when
/// either actor leaves the scene, when the scene removes it, or when
/// [`Joint::release`] is called.
#[derive(Clone)]
pub struct Joint {
    inner: Rc<RefCell<JointInner>>,
}

impl fmt::Debug for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Joint")
            .field("id", &inner.id)
            .field("kind", &inner.kind)
            .field("released", &inner.released)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Joint {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Joint {
    /// Anchors are local to their actor, like shape coordinates.
    pub(crate) fn new(kind: JointKind, a: &Actor, anchor_a: Vector, b: &Actor, anchor_b: Vector) -> Self {
        Self {
            inner: Rc::new(RefCell::new(JointInner {
                id: JointId::new(),
                kind,
                a: a.downgrade(),
                b: b.downgrade(),
                anchor_a,
                anchor_b,
                released: false,
                release_listeners: Vec::new(),
            })),
        }
    }

    pub fn id(&self) -> JointId {
        self.inner.borrow().id
    }

    pub fn kind(&self) -> JointKind {
        self.inner.borrow().kind
    }

    pub fn anchors(&self) -> (Vector, Vector) {
        let inner = self.inner.borrow();
        (inner.anchor_a, inner.anchor_b)
    }

    /// Both actors, while both are still alive.
    pub fn actors(&self) -> Option<(Actor, Actor)> {
        let inner = self.inner.borrow();
        Some((inner.a.upgrade()?, inner.b.upgrade()?))
    }

    pub fn connects(&self, id: ActorId) -> bool {
        let inner = self.inner.borrow();
        inner.a.id() == id || inner.b.id() == id
    }

    pub(crate) fn actor_ids(&self) -> (ActorId, ActorId) {
        let inner = self.inner.borrow();
        (inner.a.id(), inner.b.id())
    }

    pub fn is_released(&self) -> bool {
        self.inner.borrow().released
    }

    /// Registers a callback run once when the joint is released. On an
    /// already released joint the callback runs immediately.
    pub fn on_release(&self, listener: impl FnOnce() + 'static) {
        let mut inner = self.inner.borrow_mut();
        if inner.released {
            drop(inner);
            listener();
        } else {
            inner.release_listeners.push(Box::new(listener));
        }
    }

    /// Invalidates the joint. Further calls are no-ops.
    pub fn release(&self) {
        let listeners = {
            let mut inner = self.inner.borrow_mut();
            if inner.released {
                return;
            }
            inner.released = true;
            std::mem::take(&mut inner.release_listeners)
        };
        tracing::debug!("[physics] joint {} released", self.id());
        for listener in listeners {
            listener();
        }
    }
}

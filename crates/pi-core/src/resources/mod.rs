//! Explicit resource registry.
//!
//! The host loads fonts, sounds and images and registers opaque handles here
//! under a name. The core never parses files; it only resolves names to
//! handles and passes the handles back to the host's renderer or mixer.

mod color;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use color::{Color, ColorContainer};

use crate::error::{EngineError, Result};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);
    };
}

handle_type!(
    /// Host-side image, used by sprite frames.
    ImageHandle
);
handle_type!(
    /// Host-side font.
    FontHandle
);
handle_type!(
    /// Host-side sound.
    SoundHandle
);

/// Name → handle lookup for one kind of resource.
#[derive(Debug, Clone)]
pub struct Container<H> {
    kind: &'static str,
    entries: BTreeMap<String, H>,
}

impl<H: Copy> Container<H> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Registers `handle` under `name`, returning the handle it replaced.
    pub fn add(&mut self, name: impl Into<String>, handle: H) -> Option<H> {
        self.entries.insert(name.into(), handle)
    }

    pub fn get(&self, name: &str) -> Option<H> {
        self.entries.get(name).copied()
    }

    /// Like [`Container::get`], but a missing name is a configuration error.
    pub fn require(&self, name: &str) -> Result<H> {
        self.get(name).ok_or_else(|| {
            EngineError::InvalidConfiguration(format!("unknown {} {name:?}", self.kind))
        })
    }

    pub fn remove(&mut self, name: &str) -> Option<H> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
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
}

/// All resources of one application, created at startup and handed to every
/// scene that needs them.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    pub colors: ColorContainer,
    pub images: Container<ImageHandle>,
    pub fonts: Container<FontHandle>,
    pub sounds: Container<SoundHandle>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            colors: ColorContainer::with_defaults(),
            images: Container::new("image"),
            fonts: Container::new("font"),
            sounds: Container::new("sound"),
        }
    }

    /// Drops every registered handle. Colors are reset to the default palette.
    pub fn clear(&mut self) {
        self.colors = ColorContainer::with_defaults();
        self.images.clear();
        self.fonts.clear();
        self.sounds.clear();
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

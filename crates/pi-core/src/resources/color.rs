//! Colors and the named color container.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// RGBA color representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(244, 67, 54);
    pub const GREEN: Color = Color::rgb(76, 175, 80);
    pub const BLUE: Color = Color::rgb(33, 150, 243);
    pub const YELLOW: Color = Color::rgb(255, 235, 59);
    pub const GRAY: Color = Color::rgb(158, 158, 158);

    /// Parses `#RGB`, `#RRGGBB` or `#RRGGBBAA`; the leading `#` is optional.
    pub fn from_hex(code: &str) -> Result<Self> {
        let digits = code.trim().trim_start_matches('#');
        let invalid = || EngineError::InvalidConfiguration(format!("invalid color code {code:?}"));
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

        match digits.len() {
            3 => {
                let mut channels = [0u8; 3];
                for (i, c) in digits.chars().enumerate() {
                    let v = c.to_digit(16).ok_or_else(invalid)?;
                    channels[i] = u8::try_from(v * 17).map_err(|_| invalid())?;
                }
                Ok(Self::rgb(channels[0], channels[1], channels[2]))
            }
            6 => Ok(Self::rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            8 => Ok(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
                channel(&digits[6..8])?,
            )),
            _ => Err(invalid()),
        }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Color with its alpha channel scaled by `opacity` in `[0, 1]`.
    pub fn with_opacity(self, opacity: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let a = (f64::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        self.with_alpha(a)
    }

    pub fn complementary(self) -> Self {
        Self::new(255 - self.r, 255 - self.g, 255 - self.b, self.a)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLUE
    }
}

/// Named colors with aliases.
///
/// Names are case-insensitive. Aliases resolve to the canonical name, so
/// redefining a color also updates all of its aliases.
#[derive(Debug, Clone, Default)]
pub struct ColorContainer {
    colors: HashMap<String, Color>,
    aliases: HashMap<String, String>,
}

impl ColorContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container preloaded with the standard palette.
    pub fn with_defaults() -> Self {
        let mut container = Self::new();
        let palette: [(&str, &str, &[&str]); 17] = [
            ("yellow", "#FFEB3B", &[]),
            ("yellow orange", "#FFC107", &["orange yellow", "gold"]),
            ("orange", "#FF9800", &[]),
            ("red orange", "#FF5722", &["orange red", "brick red"]),
            ("red", "#F44336", &[]),
            ("red purple", "#E91E63", &["purple red", "magenta", "pink"]),
            ("purple", "#9C27B0", &["violet"]),
            ("blue purple", "#673AB7", &["purple blue", "indigo"]),
            ("blue", "#2196F3", &[]),
            ("blue green", "#009688", &["green blue", "cyan", "turquoise"]),
            ("green", "#4CAF50", &[]),
            ("yellow green", "#CDDC39", &["green yellow", "lime"]),
            ("brown", "#795548", &[]),
            ("white", "#FFFFFF", &[]),
            ("gray", "#9E9E9E", &["grey"]),
            ("black", "#000000", &[]),
            ("dark gray", "#424242", &["dark grey"]),
        ];
        for (name, code, aliases) in palette {
            // Palette literals are valid hex codes.
            if let Ok(color) = Color::from_hex(code) {
                container.add(name, color);
                container.add_aliases(name, aliases);
            }
        }
        container
    }

    pub fn add(&mut self, name: &str, color: Color) -> Color {
        self.colors.insert(normalize(name), color);
        color
    }

    pub fn add_aliases(&mut self, name: &str, aliases: &[&str]) {
        let canonical = normalize(name);
        for alias in aliases {
            self.aliases.insert(normalize(alias), canonical.clone());
        }
    }

    /// Looks up a color by name or alias, falling back to hex parsing.
    pub fn get(&self, name: &str) -> Result<Color> {
        let key = normalize(name);
        let key = self.aliases.get(&key).unwrap_or(&key);
        if let Some(color) = self.colors.get(key) {
            return Ok(*color);
        }
        Color::from_hex(name)
            .map_err(|_| EngineError::InvalidConfiguration(format!("unknown color {name:?}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    pub fn count(&self) -> usize {
        self.colors.len()
    }

    pub fn clear(&mut self) {
        self.colors.clear();
        self.aliases.clear();
    }

    /// Picks a color uniformly from the container.
    pub fn random(&self, rng: &mut impl Rng) -> Option<Color> {
        if self.colors.is_empty() {
            return None;
        }
        // HashMap order is unspecified; sort for a reproducible pick per seed.
        let mut names: Vec<&String> = self.colors.keys().collect();
        names.sort();
        let name = names[rng.random_range(0..names.len())];
        self.colors.get(name).copied()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

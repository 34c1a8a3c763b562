//! Engine configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::DEFAULT_METER;
use crate::error::{EngineError, Result};
use crate::physics::{PHYSICS_DT, WorldSettings};
use crate::resources::Color;
use crate::vector::Vector;

/// Settings for a game loop and the scenes it runs. Every field is optional
/// in JSON and falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Target frames per second.
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Viewport size in pixels, used until the host reports its own.
    #[serde(default = "default_viewport")]
    pub viewport: (f64, f64),
    /// Pixels per world unit of a new scene's camera.
    #[serde(default = "default_meter")]
    pub meter: f64,
    /// Fixed physics timestep in seconds.
    #[serde(default = "default_physics_step")]
    pub physics_step: f64,
    /// Solver substeps per physics step.
    #[serde(default = "default_substeps")]
    pub substeps: usize,
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    /// Gravity of a new scene.
    #[serde(default)]
    pub gravity: Vector,
    #[serde(default = "default_background")]
    pub background: Color,
    /// Logs frame timing at debug level.
    #[serde(default)]
    pub debug: bool,
}

fn default_framerate() -> u32 {
    60
}

fn default_viewport() -> (f64, f64) {
    (800.0, 600.0)
}

fn default_meter() -> f64 {
    DEFAULT_METER
}

fn default_background() -> Color {
    Color::BLACK
}

fn default_physics_step() -> f64 {
    PHYSICS_DT
}

fn default_substeps() -> usize {
    WorldSettings::default().substeps
}

fn default_max_speed() -> f64 {
    WorldSettings::default().max_speed
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            framerate: default_framerate(),
            viewport: default_viewport(),
            meter: default_meter(),
            physics_step: default_physics_step(),
            substeps: default_substeps(),
            max_speed: default_max_speed(),
            gravity: Vector::NULL,
            background: default_background(),
            debug: false,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(EngineError::InvalidConfiguration(message));
        if self.framerate == 0 {
            return invalid("framerate must be positive".to_string());
        }
        if !(self.viewport.0 > 0.0 && self.viewport.1 > 0.0) {
            return invalid(format!("viewport {:?} must be positive", self.viewport));
        }
        if !(self.meter.is_finite() && self.meter > 0.0) {
            return invalid(format!("meter {} must be positive", self.meter));
        }
        if !(self.physics_step.is_finite() && self.physics_step > 0.0) {
            return invalid(format!("physics step {} must be positive", self.physics_step));
        }
        if self.substeps == 0 {
            return invalid("substeps must be positive".to_string());
        }
        if !(self.max_speed > 0.0) {
            return invalid(format!("max speed {} must be positive", self.max_speed));
        }
        if !self.gravity.is_finite() {
            return invalid(format!("gravity {} must be finite", self.gravity));
        }
        Ok(())
    }

    /// Seconds per frame at the target frame rate.
    pub fn frame_duration(&self) -> f64 {
        1.0 / f64::from(self.framerate)
    }

    pub fn world_settings(&self) -> WorldSettings {
        WorldSettings {
            step: self.physics_step,
            substeps: self.substeps,
            max_speed: self.max_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.physics_step, 0.008);
        assert_eq!(config.meter, 32.0);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{ "framerate": 30, "gravity": { "x": 0.0, "y": -9.81 }, "debug": true }"#,
        )
        .unwrap();
        assert_eq!(config.framerate, 30);
        assert_eq!(config.gravity, Vector::new(0.0, -9.81));
        assert!(config.debug);
        assert!((config.frame_duration() - 1.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "meter": 0 }"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "framerate": 0 }"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "physics_step": -1.0 }"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "substeps": 0 }"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ framerate: 60"),
            Err(EngineError::ConfigParse(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "fps": 60 }"#),
            Err(EngineError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            EngineConfig::from_json_file("/nonexistent/engine.json"),
            Err(EngineError::ConfigIo(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_keeps_settings() {
        let config = EngineConfig {
            framerate: 120,
            substeps: 2,
            ..EngineConfig::default()
        };
        let parsed = EngineConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed.world_settings(), config.world_settings());
        assert_eq!(parsed.world_settings().substeps, 2);
        assert_eq!(parsed.framerate, 120);
    }
}

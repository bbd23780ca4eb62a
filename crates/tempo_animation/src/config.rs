//! Scheduler configuration

use serde::{Deserialize, Serialize};

use crate::vars::Overwrite;

/// Scheduler-wide settings
///
/// Every field has a default, so an empty table deserializes to
/// `EngineConfig::default()`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Target frame rate of the ticker
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Frame gaps longer than this (seconds) are treated as a stall
    #[serde(default = "default_lag_threshold")]
    pub lag_threshold: f64,
    /// Time (seconds) a stalled frame is allowed to advance
    #[serde(default = "default_adjusted_lag")]
    pub adjusted_lag: f64,
    /// Defaults for tweens that do not set these themselves
    #[serde(default)]
    pub defaults: TweenDefaults,
}

fn default_fps() -> f64 {
    240.0
}

fn default_lag_threshold() -> f64 {
    0.5
}

fn default_adjusted_lag() -> f64 {
    0.033
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            lag_threshold: default_lag_threshold(),
            adjusted_lag: default_adjusted_lag(),
            defaults: TweenDefaults::default(),
        }
    }
}

/// Scheduler-wide tween defaults
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TweenDefaults {
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_ease")]
    pub ease: String,
    #[serde(default)]
    pub overwrite: Overwrite,
}

fn default_duration() -> f64 {
    0.5
}

fn default_ease() -> String {
    "power1.out".to_string()
}

impl Default for TweenDefaults {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            ease: default_ease(),
            overwrite: Overwrite::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.defaults.overwrite, Overwrite::Auto);
    }

    #[test]
    fn test_partial_override() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"fps": 60, "defaults": {"ease": "linear"}}"#).unwrap();
        assert_eq!(config.fps, 60.0);
        assert_eq!(config.defaults.ease, "linear");
        assert_eq!(config.defaults.duration, 0.5);
        assert_eq!(config.lag_threshold, 0.5);
    }
}

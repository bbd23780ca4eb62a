//! Scenario file handling
//!
//! A scenario (`*.toml`) declares plain targets with their initial
//! properties, top-level tweens and timelines made of steps:
//!
//! ```toml
//! [engine]
//! fps = 60
//!
//! [targets.box]
//! x = 0
//! width = "0px"
//!
//! [[tweens]]
//! targets = ["box"]
//! duration = 1
//! ease = "power2.out"
//! props = { x = 100, width = "200px" }
//!
//! [[timelines]]
//! name = "intro"
//! default_ease = "linear"
//! labels = { mid = 0.5 }
//!
//! [[timelines.steps]]
//! targets = ["box"]
//! position = "mid"
//! props = { x = 0 }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempo_animation::{EaseRegistry, EngineConfig, Position, TweenValue};
use tempo_core::PropertyValue;
use thiserror::Error;

/// Problems a scenario can have beyond TOML syntax
#[derive(Error, Debug, PartialEq)]
pub enum ScenarioError {
    #[error("Unknown target '{target}' in {context}")]
    UnknownTarget { target: String, context: String },

    #[error("{context} has no targets")]
    NoTargets { context: String },

    #[error("Unknown ease '{ease}' in {context}")]
    UnknownEase { ease: String, context: String },

    #[error("Invalid position '{position}' in {context}")]
    InvalidPosition { position: String, context: String },

    #[error("{context}: 'from' values are only allowed on from_to tweens")]
    UnexpectedFrom { context: String },
}

/// A scalar as written in TOML
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Initial property value of a target
    pub fn to_property(&self) -> PropertyValue {
        match self {
            ScalarValue::Integer(n) => PropertyValue::Number(*n as f64),
            ScalarValue::Float(n) => PropertyValue::Number(*n),
            ScalarValue::Text(s) => PropertyValue::Text(s.clone()),
        }
    }

    /// End value of a tween; strings may be relative (`"+=10"`)
    pub fn to_tween_value(&self) -> TweenValue {
        match self {
            ScalarValue::Integer(n) => TweenValue::Number(*n as f64),
            ScalarValue::Float(n) => TweenValue::Number(*n),
            ScalarValue::Text(s) => TweenValue::parse(s),
        }
    }
}

/// Position of a timeline step
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PositionSpec {
    Time(f64),
    Expression(String),
}

impl PositionSpec {
    pub fn parse(&self) -> Option<Position> {
        match self {
            PositionSpec::Time(t) => Some(Position::Absolute(*t)),
            PositionSpec::Expression(e) => e.parse().ok(),
        }
    }
}

/// How a tween gets its start and end values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TweenKindSpec {
    #[default]
    To,
    From,
    FromTo,
    Set,
}

/// A tween, either top-level or a timeline step
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TweenSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub targets: Vec<String>,
    #[serde(default)]
    pub kind: TweenKindSpec,
    #[serde(default)]
    pub props: BTreeMap<String, ScalarValue>,
    /// Start values of a `from_to` tween
    #[serde(default)]
    pub from: BTreeMap<String, ScalarValue>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub ease: Option<String>,
    #[serde(default)]
    pub repeat: i64,
    #[serde(default)]
    pub repeat_delay: f64,
    #[serde(default)]
    pub yoyo: bool,
    #[serde(default)]
    pub stagger: Option<f64>,
    /// Only meaningful inside a timeline
    #[serde(default)]
    pub position: Option<PositionSpec>,
}

/// A timeline and its steps
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimelineSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub repeat: i64,
    #[serde(default)]
    pub repeat_delay: f64,
    #[serde(default)]
    pub yoyo: bool,
    #[serde(default)]
    pub default_duration: Option<f64>,
    #[serde(default)]
    pub default_ease: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, PositionSpec>,
    #[serde(default)]
    pub steps: Vec<TweenSpec>,
}

/// Top-level scenario
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub targets: BTreeMap<String, BTreeMap<String, ScalarValue>>,
    #[serde(default)]
    pub tweens: Vec<TweenSpec>,
    #[serde(default)]
    pub timelines: Vec<TimelineSpec>,
}

impl Scenario {
    /// Load and validate a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("No scenario file at {}", path.display());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let scenario = Self::parse(&content)
            .with_context(|| format!("Invalid scenario {}", path.display()))?;
        Ok(scenario)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content).context("Failed to parse TOML")?;
        let eases = EaseRegistry::new();
        scenario.validate(&|name| eases.contains(name))?;
        Ok(scenario)
    }

    /// Check references, eases and positions
    ///
    /// `known_ease` decides whether an ease name resolves.
    pub fn validate(&self, known_ease: &dyn Fn(&str) -> bool) -> Result<(), ScenarioError> {
        for (i, tween) in self.tweens.iter().enumerate() {
            let context = tween
                .name
                .clone()
                .unwrap_or_else(|| format!("tween #{}", i + 1));
            self.validate_tween(tween, &context, known_ease)?;
        }
        for (i, timeline) in self.timelines.iter().enumerate() {
            let name = timeline
                .name
                .clone()
                .unwrap_or_else(|| format!("timeline #{}", i + 1));
            if let Some(ease) = &timeline.default_ease {
                if !known_ease(ease) {
                    return Err(ScenarioError::UnknownEase {
                        ease: ease.clone(),
                        context: name,
                    });
                }
            }
            for (label, position) in &timeline.labels {
                check_position(position, &format!("{} label '{}'", name, label))?;
            }
            for (j, step) in timeline.steps.iter().enumerate() {
                let context = match &step.name {
                    Some(step_name) => format!("{} step '{}'", name, step_name),
                    None => format!("{} step #{}", name, j + 1),
                };
                self.validate_tween(step, &context, known_ease)?;
                if let Some(position) = &step.position {
                    check_position(position, &context)?;
                }
            }
        }
        Ok(())
    }

    fn validate_tween(
        &self,
        tween: &TweenSpec,
        context: &str,
        known_ease: &dyn Fn(&str) -> bool,
    ) -> Result<(), ScenarioError> {
        if tween.targets.is_empty() {
            return Err(ScenarioError::NoTargets {
                context: context.to_string(),
            });
        }
        if let Some(missing) = tween.targets.iter().find(|t| !self.targets.contains_key(*t)) {
            return Err(ScenarioError::UnknownTarget {
                target: missing.clone(),
                context: context.to_string(),
            });
        }
        if let Some(ease) = &tween.ease {
            if !known_ease(ease) {
                return Err(ScenarioError::UnknownEase {
                    ease: ease.clone(),
                    context: context.to_string(),
                });
            }
        }
        if !tween.from.is_empty() && tween.kind != TweenKindSpec::FromTo {
            return Err(ScenarioError::UnexpectedFrom {
                context: context.to_string(),
            });
        }
        Ok(())
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize scenario")
    }
}

fn check_position(position: &PositionSpec, context: &str) -> Result<(), ScenarioError> {
    match position.parse() {
        Some(_) => Ok(()),
        None => Err(ScenarioError::InvalidPosition {
            position: match position {
                PositionSpec::Time(t) => t.to_string(),
                PositionSpec::Expression(e) => e.clone(),
            },
            context: context.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_animation::RelativeOp;

    const SCENARIO: &str = r#"
[engine]
fps = 30

[targets.box]
x = 0
width = "0px"

[targets.dot]
x = 1.5

[[tweens]]
name = "slide"
targets = ["box"]
duration = 2
ease = "power2.out"
props = { x = "+=100", width = "200px" }

[[timelines]]
name = "intro"
default_ease = "linear"
labels = { mid = 0.5 }

[[timelines.steps]]
targets = ["dot"]
kind = "from_to"
from = { x = 0 }
props = { x = 1 }
position = "mid+=0.25"
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.engine.fps, 30.0);
        assert_eq!(scenario.targets.len(), 2);
        assert_eq!(
            scenario.targets["box"]["x"].to_property(),
            PropertyValue::Number(0.0)
        );

        let slide = &scenario.tweens[0];
        assert_eq!(slide.duration, Some(2.0));
        assert_eq!(
            slide.props["x"].to_tween_value(),
            TweenValue::Relative(RelativeOp::Add, 100.0)
        );
        assert_eq!(
            slide.props["width"].to_tween_value(),
            TweenValue::Text("200px".to_string())
        );

        let step = &scenario.timelines[0].steps[0];
        assert_eq!(step.kind, TweenKindSpec::FromTo);
        assert!(step.position.as_ref().and_then(PositionSpec::parse).is_some());
    }

    #[test]
    fn test_unknown_target_is_reported() {
        let text = SCENARIO.replace("targets = [\"dot\"]", "targets = [\"ghost\"]");
        let err = Scenario::parse(&text).unwrap_err();
        let cause = err.downcast_ref::<ScenarioError>().unwrap();
        assert_eq!(
            cause,
            &ScenarioError::UnknownTarget {
                target: "ghost".to_string(),
                context: "intro step #1".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_ease_is_reported() {
        let text = SCENARIO.replace("power2.out", "power9.sideways");
        let err = Scenario::parse(&text).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScenarioError>(),
            Some(ScenarioError::UnknownEase { .. })
        ));
    }

    #[test]
    fn test_invalid_position_is_reported() {
        let text = SCENARIO.replace("mid+=0.25", "<<nope");
        let err = Scenario::parse(&text).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScenarioError>(),
            Some(ScenarioError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_from_values_need_from_to() {
        let text = SCENARIO.replace("kind = \"from_to\"", "kind = \"to\"");
        let err = Scenario::parse(&text).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScenarioError>(),
            Some(ScenarioError::UnexpectedFrom { .. })
        ));
    }

    #[test]
    fn test_empty_scenario_uses_defaults() {
        let scenario = Scenario::parse("").unwrap();
        assert_eq!(scenario.engine.fps, EngineConfig::default().fps);
        assert!(scenario.tweens.is_empty());
        assert!(scenario.to_toml().is_ok());
    }
}

//! Per-property interpolation records
//!
//! A [`PropTween`] is the innermost unit of work: it knows one target, one
//! property, the accessor resolved for it, and how to turn a ratio into a
//! value. Tweens hold their prop tweens in insertion order and write all of
//! them on every render.

use std::fmt;
use std::rc::Rc;

use tempo_core::{AccessorRegistry, PropertyAccessor, PropertyValue, Target};
use tracing::warn;

use crate::interpolate::{split_numbers, StringInterpolator, TweenValue};

#[derive(Clone, Debug, PartialEq)]
enum Interpolation {
    Numeric { start: f64, change: f64, end: f64 },
    Text(StringInterpolator),
}

/// Values a prop tween is built from
///
/// `end` is the value given to the tween and `start` an explicit start value
/// (`from_to`); without one the property's current value is used. With
/// `backwards` set (`from` tweens) the resolved values swap places, so the
/// property animates from the given value back to where it was.
#[derive(Clone, Copy, Debug)]
pub struct Endpoints<'a> {
    pub start: Option<&'a TweenValue>,
    pub end: &'a TweenValue,
    pub backwards: bool,
}

impl<'a> Endpoints<'a> {
    pub fn to(end: &'a TweenValue) -> Self {
        Self {
            start: None,
            end,
            backwards: false,
        }
    }
}

/// One (target, property, start, change, accessor) record
#[derive(Clone)]
pub struct PropTween {
    target: Target,
    property: String,
    logical: String,
    accessor: Rc<dyn PropertyAccessor>,
    interpolation: Interpolation,
}

/// Leading number of a string like `"10px"`
fn leading_number(value: &PropertyValue) -> f64 {
    match value {
        PropertyValue::Number(n) => *n,
        PropertyValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .or_else(|| split_numbers(text).1.first().copied())
            .unwrap_or(0.0),
    }
}

impl PropTween {
    /// Interpolate between explicit start and end values
    ///
    /// A numeric end value gives a numeric tween (a unit on the start value
    /// is dropped); a string end value gives segmented string interpolation.
    pub fn new(
        target: Target,
        property: impl Into<String>,
        logical: impl Into<String>,
        accessor: Rc<dyn PropertyAccessor>,
        start: PropertyValue,
        end: PropertyValue,
    ) -> Self {
        let interpolation = match &end {
            PropertyValue::Number(end) => {
                let start = leading_number(&start);
                Interpolation::Numeric {
                    start,
                    change: end - start,
                    end: *end,
                }
            }
            PropertyValue::Text(end) => {
                Interpolation::Text(StringInterpolator::new(&start.to_string(), end))
            }
        };
        Self {
            target,
            property: property.into(),
            logical: logical.into(),
            accessor,
            interpolation,
        }
    }

    /// Resolve the accessor and endpoints for `property` on `target`
    ///
    /// Relative end values apply to the start. Returns `None` when the
    /// target has no way to reach the property.
    pub fn build(
        accessors: &AccessorRegistry,
        target: &Target,
        property: &str,
        logical: &str,
        ends: Endpoints<'_>,
    ) -> Option<Self> {
        let accessor = accessors.resolve(target, property)?;
        let current = accessor.read(target, property);
        let mut start = match ends.start {
            Some(start) => start.resolve(current.as_ref()),
            None => current.unwrap_or_default(),
        };
        let mut end = ends.end.resolve(Some(&start));
        if ends.backwards {
            std::mem::swap(&mut start, &mut end);
        }
        Some(Self::new(
            target.clone(),
            property,
            logical,
            accessor,
            start,
            end,
        ))
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Property written on the target
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Property name as given to the tween (differs when a plugin fanned
    /// one logical property out into several)
    pub fn logical(&self) -> &str {
        &self.logical
    }

    /// Value at `ratio`; 0 and 1 reproduce the start and end exactly
    pub fn value_at(&self, ratio: f64) -> PropertyValue {
        match &self.interpolation {
            Interpolation::Numeric { start, change, end } => {
                let value = if ratio == 0.0 {
                    *start
                } else if ratio == 1.0 {
                    *end
                } else {
                    ((start + change * ratio) * 1_000_000.0).round() / 1_000_000.0
                };
                PropertyValue::Number(value)
            }
            Interpolation::Text(interp) => PropertyValue::Text(interp.at(ratio)),
        }
    }

    /// Write the value at `ratio` into the target
    ///
    /// Setter failures are logged; they never stop the render.
    pub fn render(&self, ratio: f64) {
        let value = self.value_at(ratio);
        if let Err(err) = self.accessor.write(&self.target, &self.property, value) {
            warn!(
                "failed to write '{}' on {:?}: {}",
                self.property, self.target, err
            );
        }
    }
}

impl fmt::Debug for PropTween {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropTween")
            .field("target", &self.target)
            .field("property", &self.property)
            .field("accessor", &self.accessor.kind())
            .field("interpolation", &self.interpolation)
            .finish()
    }
}

//! Insertion positions inside a timeline
//!
//! Positions are parsed once into a [`Position`] and resolved once, when the
//! child is added, into an absolute time on the timeline. Nothing keeps a
//! reference to a label afterwards; moving a label later does not move
//! children placed relative to it.
//!
//! | Expression   | Meaning                                              |
//! |--------------|------------------------------------------------------|
//! | `2.5`        | absolute time                                        |
//! | `"+=1"`      | one second after the end of the timeline             |
//! | `"-=25%"`    | a quarter of the child's duration before the end     |
//! | `"intro"`    | at label `intro` (created at the end if missing)     |
//! | `"intro+=1"` | one second after label `intro`                       |
//! | `"<"`        | where the most recently added child starts           |
//! | `">0.5"`     | half a second after the most recently added child ends |

use std::str::FromStr;

use tracing::warn;

use crate::error::AnimationError;

/// Offset from a reference point
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Offset {
    Seconds(f64),
    /// Percent of a duration (the child's for `+=`, the previous child's for `<`/`>`)
    Percent(f64),
}

impl Offset {
    /// Offset in seconds given the duration a percentage refers to
    pub fn resolve(self, percent_of: f64) -> f64 {
        match self {
            Offset::Seconds(s) => s,
            Offset::Percent(p) => p / 100.0 * percent_of,
        }
    }

    fn parse(text: &str, negate: bool) -> Option<Offset> {
        let text = text.trim();
        let sign = if negate { -1.0 } else { 1.0 };
        match text.strip_suffix('%') {
            Some(number) => number
                .trim()
                .parse::<f64>()
                .ok()
                .map(|p| Offset::Percent(sign * p)),
            None => text.parse::<f64>().ok().map(|s| Offset::Seconds(sign * s)),
        }
    }
}

/// Where a child goes on its timeline
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Position {
    /// The end of the timeline
    #[default]
    End,
    Absolute(f64),
    /// Relative to the end of the timeline
    Relative(Offset),
    Label {
        name: String,
        offset: Option<Offset>,
    },
    /// Relative to the start of the most recently added child
    PreviousStart(Option<Offset>),
    /// Relative to the end of the most recently added child
    PreviousEnd(Option<Offset>),
}

impl Position {
    pub fn label(name: impl Into<String>) -> Self {
        Position::Label {
            name: name.into(),
            offset: None,
        }
    }
}

impl FromStr for Position {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnimationError::InvalidPosition(s.to_string());
        let text = s.trim();

        if text.is_empty() {
            return Ok(Position::End);
        }
        if let Ok(time) = text.parse::<f64>() {
            return Ok(Position::Absolute(time));
        }

        if let Some(anchor) = text.chars().next().filter(|c| *c == '<' || *c == '>') {
            let rest: String = text[1..].chars().filter(|c| *c != '=').collect();
            let offset = if rest.trim().is_empty() {
                None
            } else {
                Some(Offset::parse(&rest, false).ok_or_else(invalid)?)
            };
            return Ok(if anchor == '<' {
                Position::PreviousStart(offset)
            } else {
                Position::PreviousEnd(offset)
            });
        }

        if let Some(eq) = text.find('=') {
            let before = &text[..eq];
            let negate = match before.chars().last() {
                Some('+') => false,
                Some('-') => true,
                _ => return Err(invalid()),
            };
            let offset = Offset::parse(&text[eq + 1..], negate).ok_or_else(invalid)?;
            let name = before[..before.len() - 1].trim();
            return Ok(if name.is_empty() {
                Position::Relative(offset)
            } else {
                Position::Label {
                    name: name.to_string(),
                    offset: Some(offset),
                }
            });
        }

        Ok(Position::label(text))
    }
}

impl From<f64> for Position {
    fn from(time: f64) -> Self {
        Position::Absolute(time)
    }
}

impl From<&str> for Position {
    /// Parses the expression; malformed expressions fall back to the end of
    /// the timeline with a warning
    fn from(text: &str) -> Self {
        text.parse().unwrap_or_else(|_| {
            warn!("invalid position '{}', using the end of the timeline", text);
            Position::End
        })
    }
}

impl From<String> for Position {
    fn from(text: String) -> Self {
        Position::from(text.as_str())
    }
}

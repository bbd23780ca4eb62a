//! Animation error types

use thiserror::Error;

use crate::animation::AnimationId;
use tempo_core::PropertyError;

/// Errors surfaced by the fallible scheduler API
///
/// Nothing on the render path returns these. They are reserved for calls a
/// caller can act on: a stale id, a label that does not exist, a position
/// or ease string that does not parse.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    #[error("Unknown animation: {0:?}")]
    UnknownAnimation(AnimationId),

    #[error("Animation {0:?} is not a timeline")]
    NotATimeline(AnimationId),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Invalid position expression: {0}")]
    InvalidPosition(String),

    #[error("Invalid ease: {0}")]
    InvalidEase(String),

    /// Adding a timeline to itself or to one of its descendants
    #[error("Adding {child:?} to {parent:?} would create a cycle")]
    Cycle {
        parent: AnimationId,
        child: AnimationId,
    },

    /// The frame source could not be acquired
    #[error("Frame source unavailable: {0}")]
    FrameSourceUnavailable(String),

    #[error("Property error: {0}")]
    Property(#[from] PropertyError),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;

//! Property access error types

use thiserror::Error;

/// Errors raised while reading or writing a target property
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    /// The target has no property with this name
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// The property exists but rejects the value's shape
    #[error("Property '{property}' expects a {expected} value")]
    TypeMismatch {
        property: String,
        expected: &'static str,
    },

    /// The accessor kind is not supported by this target
    #[error("Target does not support {0} access")]
    Unsupported(&'static str),

    /// The property is read-only
    #[error("Property '{0}' is read-only")]
    ReadOnly(String),

    /// The target is already borrowed (write from inside its own accessor)
    #[error("Target is busy")]
    Busy,
}

/// Result type for property operations
pub type Result<T> = std::result::Result<T, PropertyError>;

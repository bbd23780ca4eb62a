//! Tempo Core
//!
//! This crate provides the primitives the Tempo animation scheduler writes
//! through. The scheduler never knows what a target is; it only reads and
//! writes named properties:
//!
//! - **Property Values**: numbers and strings, the only two shapes a tween
//!   interpolates
//! - **Targets**: shared, identity-stable handles around anything that
//!   implements [`PropertyTarget`]
//! - **Accessors**: a closed set of ways to reach a property (plain field,
//!   getter/setter pair, attribute), resolved once per tween
//!
//! # Example
//!
//! ```rust
//! use tempo_core::{AccessorRegistry, PropertyBag, Target};
//!
//! let target = Target::new(PropertyBag::new().with("x", 0.0));
//! let registry = AccessorRegistry::new();
//!
//! let accessor = registry.resolve(&target, "x").expect("x is a field");
//! accessor.write(&target, "x", 42.0.into()).unwrap();
//! assert_eq!(target.get("x").and_then(|v| v.as_number()), Some(42.0));
//! ```

pub mod accessor;
pub mod bag;
pub mod error;
pub mod target;
pub mod value;

pub use accessor::{
    AccessorKind, AccessorRegistry, AttributeAccessor, FieldAccessor, MethodAccessor,
    PropertyAccessor,
};
pub use bag::PropertyBag;
pub use error::{PropertyError, Result};
pub use target::{PropertyTarget, Target, TargetKey};
pub use value::PropertyValue;

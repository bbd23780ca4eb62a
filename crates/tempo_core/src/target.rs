//! Animatable targets
//!
//! A [`Target`] is an opaque, cheaply cloneable handle around anything that
//! implements [`PropertyTarget`]. The scheduler never looks inside a target;
//! it reads and writes named properties through accessors and uses
//! [`TargetKey`] to recognise the same object behind different handles.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{PropertyError, Result};
use crate::value::PropertyValue;

/// Capability interface for objects that can be animated
///
/// Only `get_property` and `set_property` are required. Targets that expose
/// a separate attribute namespace (markup-style attributes, shader uniforms)
/// override the attribute pair.
pub trait PropertyTarget {
    /// Type name used to look up registered getter/setter accessors
    fn kind(&self) -> &'static str {
        "object"
    }

    /// Read a plain property
    fn get_property(&self, name: &str) -> Option<PropertyValue>;

    /// Write a plain property
    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<()>;

    /// Whether a plain property exists
    fn has_property(&self, name: &str) -> bool {
        self.get_property(name).is_some()
    }

    /// Read an attribute
    fn get_attribute(&self, _name: &str) -> Option<PropertyValue> {
        None
    }

    /// Write an attribute
    fn set_attribute(&mut self, _name: &str, _value: PropertyValue) -> Result<()> {
        Err(PropertyError::Unsupported("attribute"))
    }
}

/// Stable identity of a target object
///
/// Two [`Target`] handles created from the same shared object compare equal
/// by key even though the handles themselves are distinct values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey(usize);

impl TargetKey {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Shared handle to an animatable object
#[derive(Clone)]
pub struct Target {
    inner: Rc<RefCell<dyn PropertyTarget>>,
}

impl Target {
    /// Wrap a value the caller does not need to reach again directly
    pub fn new<T: PropertyTarget + 'static>(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// Wrap an object the caller keeps a typed handle to
    pub fn from_shared<T: PropertyTarget + 'static>(shared: Rc<RefCell<T>>) -> Self {
        Self { inner: shared }
    }

    pub fn key(&self) -> TargetKey {
        TargetKey(Rc::as_ptr(&self.inner) as *const () as usize)
    }

    pub fn kind(&self) -> &'static str {
        match self.inner.try_borrow() {
            Ok(target) => target.kind(),
            Err(_) => "object",
        }
    }

    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        self.inner.try_borrow().ok()?.get_property(name)
    }

    /// Numeric view of a property, see [`PropertyValue::as_number`]
    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_number())
    }

    pub fn set(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| PropertyError::Busy)?
            .set_property(name, value.into())
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.inner
            .try_borrow()
            .map(|t| t.has_property(name))
            .unwrap_or(false)
    }

    pub fn attribute(&self, name: &str) -> Option<PropertyValue> {
        self.inner.try_borrow().ok()?.get_attribute(name)
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| PropertyError::Busy)?
            .set_attribute(name, value.into())
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("kind", &self.kind())
            .field("key", &self.key().0)
            .finish()
    }
}

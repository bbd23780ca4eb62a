//! Property accessors
//!
//! Accessors are the closed set of ways the scheduler reaches a property on
//! a target. A tween resolves one accessor per (target, property) pair when it
//! initialises and reuses it on every render, so lookup cost is never paid
//! inside the frame loop.
//!
//! Resolution order in [`AccessorRegistry::resolve`]:
//!
//! 1. A getter/setter pair registered for the target's kind and the property
//!    (or for the `"*"` wildcard kind)
//! 2. A plain field, when the target reports the property exists
//! 3. An attribute, when the target exposes one with that name

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::Result;
use crate::target::Target;
use crate::value::PropertyValue;

/// The kind of access an accessor performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    /// Plain property read/write
    Field,
    /// Registered getter/setter functions
    Method,
    /// Attribute namespace read/write
    Attribute,
}

/// Read/write strategy for one property
pub trait PropertyAccessor {
    fn kind(&self) -> AccessorKind;

    fn read(&self, target: &Target, property: &str) -> Option<PropertyValue>;

    fn write(&self, target: &Target, property: &str, value: PropertyValue) -> Result<()>;
}

/// Accessor for plain properties
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldAccessor;

impl PropertyAccessor for FieldAccessor {
    fn kind(&self) -> AccessorKind {
        AccessorKind::Field
    }

    fn read(&self, target: &Target, property: &str) -> Option<PropertyValue> {
        target.get(property)
    }

    fn write(&self, target: &Target, property: &str, value: PropertyValue) -> Result<()> {
        target.set(property, value)
    }
}

/// Accessor for attributes
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributeAccessor;

impl PropertyAccessor for AttributeAccessor {
    fn kind(&self) -> AccessorKind {
        AccessorKind::Attribute
    }

    fn read(&self, target: &Target, property: &str) -> Option<PropertyValue> {
        target.attribute(property)
    }

    fn write(&self, target: &Target, property: &str, value: PropertyValue) -> Result<()> {
        target.set_attribute(property, value)
    }
}

type Getter = dyn Fn(&Target) -> Option<PropertyValue>;
type Setter = dyn Fn(&Target, PropertyValue) -> Result<()>;

/// Accessor backed by a getter/setter pair
///
/// Used for derived properties: the getter computes the value from other
/// state and the setter distributes it back.
#[derive(Clone)]
pub struct MethodAccessor {
    getter: Rc<Getter>,
    setter: Rc<Setter>,
}

impl MethodAccessor {
    pub fn new<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn(&Target) -> Option<PropertyValue> + 'static,
        S: Fn(&Target, PropertyValue) -> Result<()> + 'static,
    {
        Self {
            getter: Rc::new(getter),
            setter: Rc::new(setter),
        }
    }
}

impl fmt::Debug for MethodAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodAccessor").finish_non_exhaustive()
    }
}

impl PropertyAccessor for MethodAccessor {
    fn kind(&self) -> AccessorKind {
        AccessorKind::Method
    }

    fn read(&self, target: &Target, _property: &str) -> Option<PropertyValue> {
        (self.getter)(target)
    }

    fn write(&self, target: &Target, _property: &str, value: PropertyValue) -> Result<()> {
        (self.setter)(target, value)
    }
}

/// Registry of known accessors
pub struct AccessorRegistry {
    field: Rc<FieldAccessor>,
    attribute: Rc<AttributeAccessor>,
    /// kind -> property -> accessor
    methods: FxHashMap<String, FxHashMap<String, Rc<MethodAccessor>>>,
}

impl Default for AccessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessorRegistry {
    /// Kind that matches every target
    pub const ANY_KIND: &'static str = "*";

    pub fn new() -> Self {
        Self {
            field: Rc::new(FieldAccessor),
            attribute: Rc::new(AttributeAccessor),
            methods: FxHashMap::default(),
        }
    }

    /// Register a getter/setter pair for `property` on targets of `kind`
    ///
    /// Use [`AccessorRegistry::ANY_KIND`] to match every target kind.
    pub fn register_method(
        &mut self,
        kind: impl Into<String>,
        property: impl Into<String>,
        accessor: MethodAccessor,
    ) {
        let kind = kind.into();
        let property = property.into();
        debug!("accessor registered: {}.{}", kind, property);
        self.methods
            .entry(kind)
            .or_default()
            .insert(property, Rc::new(accessor));
    }

    pub fn unregister_method(&mut self, kind: &str, property: &str) -> bool {
        self.methods
            .get_mut(kind)
            .and_then(|props| props.remove(property))
            .is_some()
    }

    fn method(&self, kind: &str, property: &str) -> Option<Rc<MethodAccessor>> {
        self.methods.get(kind)?.get(property).cloned()
    }

    /// Find the accessor for `property` on `target`
    ///
    /// Returns `None` when the target has no way to reach the property.
    pub fn resolve(&self, target: &Target, property: &str) -> Option<Rc<dyn PropertyAccessor>> {
        if let Some(method) = self
            .method(target.kind(), property)
            .or_else(|| self.method(Self::ANY_KIND, property))
        {
            return Some(method);
        }

        if target.has_property(property) {
            return Some(self.field.clone());
        }

        if target.attribute(property).is_some() {
            return Some(self.attribute.clone());
        }

        None
    }
}

//! A general purpose property target
//!
//! [`PropertyBag`] behaves like a plain script object: a map of named
//! values plus a separate attribute map. Writes to unknown properties add
//! them. It is the target used by scenario files and most tests.

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::target::PropertyTarget;
use crate::value::PropertyValue;

/// Map-backed animatable object
#[derive(Clone, Debug, Default)]
pub struct PropertyBag {
    kind: Option<&'static str>,
    properties: FxHashMap<String, PropertyValue>,
    attributes: FxHashMap<String, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the kind reported to accessor lookup
    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.properties.get(name).and_then(|v| v.as_number())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_text())
    }

    pub fn attribute(&self, name: &str) -> Option<&PropertyValue> {
        self.attributes.get(name)
    }

    /// Property names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl PropertyTarget for PropertyBag {
    fn kind(&self) -> &'static str {
        self.kind.unwrap_or("bag")
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        self.properties.get(name).cloned()
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<()> {
        match self.properties.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.properties.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    fn get_attribute(&self, name: &str) -> Option<PropertyValue> {
        self.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, name: &str, value: PropertyValue) -> Result<()> {
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_lookup() {
        let bag = PropertyBag::new()
            .with("y", 2.0)
            .with("x", 1.0)
            .with("color", "red")
            .with_attribute("r", 10.0);

        assert_eq!(bag.number("x"), Some(1.0));
        assert_eq!(bag.text("color"), Some("red"));
        assert_eq!(bag.names(), vec!["color", "x", "y"]);
        assert!(bag.has_property("y"));
        assert!(!bag.has_property("r"));
        assert_eq!(bag.get_attribute("r"), Some(PropertyValue::Number(10.0)));
    }

    #[test]
    fn test_set_adds_unknown_property() {
        let mut bag = PropertyBag::new();
        bag.set_property("z", 3.0.into()).unwrap();
        assert_eq!(bag.number("z"), Some(3.0));
    }

    #[test]
    fn test_default_kind() {
        assert_eq!(PropertyBag::new().kind(), "bag");
        assert_eq!(PropertyBag::new().with_kind("sprite").kind(), "sprite");
    }
}

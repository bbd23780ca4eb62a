//! Property plugins
//!
//! A plugin takes over one logical property of a tween and decomposes it
//! into any number of prop tweens. The scheduler asks registered plugins in
//! registration order, most recent first, before falling back to the
//! accessor registry.

use std::fmt;
use std::rc::Rc;

use tempo_core::{AccessorRegistry, Target};
use tracing::{debug, warn};

use crate::prop_tween::{Endpoints, PropTween};

/// What a plugin can reach while it initializes a property
pub struct PluginContext<'a> {
    pub accessors: &'a AccessorRegistry,
}

/// Decomposes a logical property into prop tweens
pub trait TweenPlugin {
    fn name(&self) -> &str;

    /// Whether this plugin takes `property` on `target`
    fn handles(&self, target: &Target, property: &str) -> bool;

    /// Build the prop tweens for `property`
    ///
    /// Returning an empty list skips the property.
    fn init(
        &self,
        cx: &PluginContext<'_>,
        target: &Target,
        property: &str,
        ends: Endpoints<'_>,
    ) -> Vec<PropTween>;
}

/// Fans one property out to several others with the same values
///
/// ```rust
/// use tempo_animation::AliasPlugin;
///
/// // tweening "scale" writes both "scaleX" and "scaleY"
/// let plugin = AliasPlugin::new("scale", ["scaleX", "scaleY"]);
/// ```
#[derive(Clone, Debug)]
pub struct AliasPlugin {
    alias: String,
    properties: Vec<String>,
    kind: Option<&'static str>,
}

impl AliasPlugin {
    pub fn new<I, S>(alias: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alias: alias.into(),
            properties: properties.into_iter().map(Into::into).collect(),
            kind: None,
        }
    }

    /// Only apply to targets of this kind
    pub fn for_kind(mut self, kind: &'static str) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl TweenPlugin for AliasPlugin {
    fn name(&self) -> &str {
        &self.alias
    }

    fn handles(&self, target: &Target, property: &str) -> bool {
        property == self.alias && self.kind.map_or(true, |kind| target.kind() == kind)
    }

    fn init(
        &self,
        cx: &PluginContext<'_>,
        target: &Target,
        property: &str,
        ends: Endpoints<'_>,
    ) -> Vec<PropTween> {
        self.properties
            .iter()
            .filter_map(|name| {
                let pt = PropTween::build(cx.accessors, target, name, property, ends);
                if pt.is_none() {
                    warn!("'{}' cannot reach '{}' on {:?}", self.alias, name, target);
                }
                pt
            })
            .collect()
    }
}

/// Registered plugins
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Rc<dyn TweenPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: impl TweenPlugin + 'static) {
        debug!("registered tween plugin '{}'", plugin.name());
        self.plugins.push(Rc::new(plugin));
    }

    /// Remove every plugin with this name
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name() != name);
        self.plugins.len() != before
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugin that takes `property` on `target`, later registrations first
    pub fn find(&self, target: &Target, property: &str) -> Option<Rc<dyn TweenPlugin>> {
        self.plugins
            .iter()
            .rev()
            .find(|p| p.handles(target, property))
            .cloned()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolate::TweenValue;
    use tempo_core::{PropertyBag, PropertyValue};

    #[test]
    fn test_alias_fans_out() {
        let target = Target::new(
            PropertyBag::new()
                .with("scaleX", 1.0)
                .with("scaleY", 2.0),
        );
        let plugin = AliasPlugin::new("scale", ["scaleX", "scaleY"]);
        let accessors = AccessorRegistry::new();
        let cx = PluginContext {
            accessors: &accessors,
        };
        let end = TweenValue::Number(3.0);
        let pts = plugin.init(&cx, &target, "scale", Endpoints::to(&end));

        assert_eq!(pts.len(), 2);
        assert!(pts.iter().all(|pt| pt.logical() == "scale"));
        for pt in &pts {
            pt.render(1.0);
        }
        assert_eq!(target.get("scaleX"), Some(PropertyValue::Number(3.0)));
        assert_eq!(target.get("scaleY"), Some(PropertyValue::Number(3.0)));
    }

    #[test]
    fn test_registry_lookup_respects_kind() {
        let mut registry = PluginRegistry::new();
        registry.register(AliasPlugin::new("scale", ["scaleX", "scaleY"]).for_kind("sprite"));

        let sprite = Target::new(PropertyBag::new().with_kind("sprite"));
        let other = Target::new(PropertyBag::new());
        assert!(registry.find(&sprite, "scale").is_some());
        assert!(registry.find(&other, "scale").is_none());
        assert!(registry.find(&sprite, "x").is_none());

        assert!(registry.unregister("scale"));
        assert!(registry.is_empty());
    }
}

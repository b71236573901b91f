// ── Capability interfaces ──
//
// Objects are composed from interfaces. Each `Interface` pairs a shared
// static `InterfaceSpec` with a per-object property cache; the cache is
// the single place property values change.

pub mod button;
pub mod load;
mod spec;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

pub use self::spec::{
    CategoryHandler, InterfaceSpec, InterfaceSpecBuilder, MethodDescriptor, MethodKind, RawFetch,
    Updates,
};
use crate::error::CoreError;
use crate::model::{PropertyChange, Value};

/// One interface instance on one object.
#[derive(Debug)]
pub struct Interface {
    spec: &'static InterfaceSpec,
    cache: RwLock<HashMap<&'static str, Value>>,
}

impl Interface {
    pub fn new(spec: &'static InterfaceSpec) -> Self {
        Self {
            spec,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn spec(&self) -> &'static InterfaceSpec {
        self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name()
    }

    /// Cached value of `property`; `None` until first observed.
    pub fn property(&self, property: &str) -> Option<Value> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(property)
            .cloned()
    }

    /// Every declared property with its cached value, in declaration order.
    pub fn snapshot(&self) -> Vec<(&'static str, Option<Value>)> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        self.spec
            .properties()
            .iter()
            .map(|p| (*p, cache.get(p).cloned()))
            .collect()
    }

    /// Apply `updates` and return only the entries whose value changed.
    ///
    /// The compare-and-write runs under one write lock, so concurrent
    /// writers never both report the same transition. Properties this
    /// interface does not declare are ignored.
    pub fn update_properties<I>(&self, updates: I) -> Vec<PropertyChange>
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let mut changed = Vec::new();
        for (property, new) in updates {
            if !self.spec.has_property(property) {
                debug!(interface = self.name(), property, "ignoring undeclared property");
                continue;
            }
            let old = cache.get(property).cloned();
            if old.as_ref() == Some(&new) {
                continue;
            }
            cache.insert(property, new.clone());
            changed.push(PropertyChange { property, old, new });
        }
        changed
    }

    /// Decode a pushed category event. `None` means this interface does
    /// not handle `category`.
    pub fn handle_category_status(
        &self,
        category: &str,
        args: &[String],
    ) -> Option<Result<Vec<PropertyChange>, CoreError>> {
        let handler = self.spec.category_handler(category)?;
        Some(handler(args).map(|updates| self.update_properties(updates)))
    }

    /// Decode an object-status record (`Interface.Method result ...`).
    /// `None` means the method is not one of this interface's cached getters.
    pub fn handle_object_status(
        &self,
        method: &str,
        result: &str,
    ) -> Option<Result<Vec<PropertyChange>, CoreError>> {
        let verb = match method.split_once('.') {
            Some((interface, verb)) if interface == self.name() => verb,
            Some(_) => return None,
            None => method,
        };
        let descriptor = self
            .spec
            .cached_getters()
            .find(|m| m.answers_to(verb))?;
        let (property, codec) = (descriptor.property?, descriptor.result?);
        Some(
            codec
                .decode(result)
                .map(|value| self.update_properties([(property, value)])),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::model::Codec;

    static LEVEL: LazyLock<InterfaceSpec> = LazyLock::new(|| {
        InterfaceSpec::builder("Load")
            .getter("GetLevel", "GetLevelHW", Codec::Decimal, Some("level"))
            .category("LOAD", |args| {
                let level = args
                    .first()
                    .ok_or_else(|| CoreError::conversion("missing level"))?;
                Ok(vec![("level", Codec::Decimal.decode(level)?)])
            })
            .build()
    });

    #[test]
    fn update_is_idempotent() {
        let iface = Interface::new(&LEVEL);
        let first = iface.update_properties([("level", Value::Decimal(50.0))]);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].old, None);

        let second = iface.update_properties([("level", Value::Decimal(50.0))]);
        assert!(second.is_empty());
        assert_eq!(iface.property("level"), Some(Value::Decimal(50.0)));
    }

    #[test]
    fn undeclared_properties_are_ignored() {
        let iface = Interface::new(&LEVEL);
        let changed = iface.update_properties([("color", Value::Int(1))]);
        assert!(changed.is_empty());
        assert_eq!(iface.property("color"), None);
    }

    #[test]
    fn category_status_routes_by_name() {
        let iface = Interface::new(&LEVEL);
        assert!(iface.handle_category_status("BTN", &[]).is_none());

        let changed = iface
            .handle_category_status("LOAD", &["75.000".to_owned()])
            .unwrap()
            .unwrap();
        assert_eq!(changed[0].new, Value::Decimal(75.0));

        let err = iface.handle_category_status("LOAD", &[]).unwrap();
        assert!(err.is_err());
    }

    #[test]
    fn object_status_matches_qualified_and_hw_verbs() {
        let iface = Interface::new(&LEVEL);
        assert!(iface.handle_object_status("Button.GetState", "1").is_none());
        assert!(iface.handle_object_status("Load.SetLevel", "1").is_none());

        let changed = iface
            .handle_object_status("Load.GetLevelHW", "20")
            .unwrap()
            .unwrap();
        assert_eq!(changed.len(), 1);

        let again = iface.handle_object_status("GetLevel", "20.000").unwrap().unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn snapshot_lists_unknown_properties() {
        let iface = Interface::new(&LEVEL);
        assert_eq!(iface.snapshot(), vec![("level", None)]);
    }
}

// ── Type registry ──
//
// Maps Vantage type names onto the controller definition that owns
// them. Built once by the client and passed by reference to anything
// that needs to classify records (the snapshot loader, injection).

use std::collections::HashMap;

use crate::controller::{ControllerDefinition, STANDARD};

#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    by_type: HashMap<&'static str, &'static ControllerDefinition>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of every built-in controller.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for definition in STANDARD {
            registry.register(definition);
        }
        registry
    }

    /// Register `definition` for each of its types. A later registration
    /// for the same type replaces the earlier one.
    pub fn register(&mut self, definition: &'static ControllerDefinition) -> &mut Self {
        for type_name in definition.vantage_types {
            self.by_type.insert(*type_name, definition);
        }
        self
    }

    pub fn definition(&self, type_name: &str) -> Option<&'static ControllerDefinition> {
        self.by_type.get(type_name).copied()
    }

    pub fn is_known(&self, type_name: &str) -> bool {
        self.by_type.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_type.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

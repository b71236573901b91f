// ── Discovery records ──
//
// The discovery boundary yields plain records: id, type tag, and
// declared attributes. Controllers turn records into live objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Vid;

/// One discovered object, as described by the controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub vid: Vid,
    /// Vantage type tag, e.g. `Button`, `Load`, `Enclosure`.
    pub type_name: String,
    #[serde(default)]
    pub name: String,
    /// Containing object (keypad station, enclosure, area).
    #[serde(default)]
    pub parent: Option<Vid>,
    /// Remaining declared attributes, keyed by element/attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ObjectRecord {
    pub fn new(vid: impl Into<Vid>, type_name: impl Into<String>) -> Self {
        Self {
            vid: vid.into(),
            type_name: type_name.into(),
            name: String::new(),
            parent: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<Vid>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

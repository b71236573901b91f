// ── Object events ──
//
// Typed notifications raised by controllers. Subscribers filter by
// `EventKind`, the discriminant of `ObjectEvent`.

use serde::Serialize;
use strum::{Display, EnumDiscriminants, EnumIter, EnumString};

use super::{Value, Vid};

/// A change observed on an object owned by some controller.
#[derive(Debug, Clone, PartialEq, Serialize, EnumDiscriminants)]
#[strum_discriminants(name(EventKind))]
#[strum_discriminants(derive(Hash, Display, EnumString, EnumIter))]
#[strum_discriminants(strum(serialize_all = "snake_case", ascii_case_insensitive))]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObjectEvent {
    /// An object entered a controller registry (discovery or injection).
    ObjectAdded { vid: Vid, type_name: String },

    /// One cached property took a new value.
    PropertyChanged {
        vid: Vid,
        interface: &'static str,
        property: &'static str,
        /// `None` when the property was previously unknown.
        old: Option<Value>,
        new: Value,
    },
}

impl ObjectEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }

    pub fn vid(&self) -> Vid {
        match self {
            Self::ObjectAdded { vid, .. } | Self::PropertyChanged { vid, .. } => *vid,
        }
    }
}

/// One entry returned by a cache update.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub property: &'static str,
    pub old: Option<Value>,
    pub new: Value,
}

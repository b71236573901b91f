// ── Controller definitions ──
//
// Static description of each controller: which Vantage types it owns,
// which interfaces its objects compose, and any categories it monitors
// beyond those its interfaces declare.

use std::fmt;

use crate::interface::button::BUTTON;
use crate::interface::load::LOAD;
use crate::interface::{Interface, InterfaceSpec};
use crate::probe::StatusType;

pub struct ControllerDefinition {
    /// Short name, e.g. `buttons`.
    pub name: &'static str,
    pub vantage_types: &'static [&'static str],
    /// Interface chain of every object, in dispatch order.
    pub interfaces: fn() -> Vec<&'static InterfaceSpec>,
    pub extra_categories: fn(StatusType) -> &'static [&'static str],
}

impl fmt::Debug for ControllerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDefinition")
            .field("name", &self.name)
            .field("vantage_types", &self.vantage_types)
            .finish_non_exhaustive()
    }
}

impl ControllerDefinition {
    pub fn handles(&self, type_name: &str) -> bool {
        self.vantage_types.contains(&type_name)
    }

    pub(crate) fn build_interfaces(&self) -> Vec<Interface> {
        (self.interfaces)().into_iter().map(Interface::new).collect()
    }

    /// Categories to subscribe when monitoring in category mode.
    pub fn categories(&self, status_type: StatusType) -> Vec<&'static str> {
        let mut categories: Vec<&'static str> = Vec::new();
        let declared = (self.interfaces)()
            .into_iter()
            .filter(|_| status_type == StatusType::Category)
            .flat_map(|spec| spec.categories());
        for category in declared.chain((self.extra_categories)(status_type).iter().copied()) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }
}

fn none(_: StatusType) -> &'static [&'static str] {
    &[]
}

fn button_interfaces() -> Vec<&'static InterfaceSpec> {
    vec![&*BUTTON]
}

/// `S:LED` pushes are not part of the enhanced log.
fn button_extras(status_type: StatusType) -> &'static [&'static str] {
    match status_type {
        StatusType::EnhancedLog => &["LED"],
        StatusType::Category => &[],
    }
}

fn load_interfaces() -> Vec<&'static InterfaceSpec> {
    vec![&*LOAD]
}

fn no_interfaces() -> Vec<&'static InterfaceSpec> {
    Vec::new()
}

pub static BUTTONS: ControllerDefinition = ControllerDefinition {
    name: "buttons",
    vantage_types: &["Button"],
    interfaces: button_interfaces,
    extra_categories: button_extras,
};

pub static LOADS: ControllerDefinition = ControllerDefinition {
    name: "loads",
    vantage_types: &["Load"],
    interfaces: load_interfaces,
    extra_categories: none,
};

/// Rack cabinets housing dimmer and relay modules.
pub static ENCLOSURES: ControllerDefinition = ControllerDefinition {
    name: "enclosures",
    vantage_types: &["Enclosure"],
    interfaces: no_interfaces,
    extra_categories: none,
};

/// Every built-in definition.
pub static STANDARD: [&ControllerDefinition; 3] = [&BUTTONS, &LOADS, &ENCLOSURES];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_add_led_in_enhanced_log_mode() {
        assert_eq!(BUTTONS.categories(StatusType::EnhancedLog), vec!["LED"]);
        assert_eq!(BUTTONS.categories(StatusType::Category), vec!["BTN", "LED"]);
    }

    #[test]
    fn loads_subscribe_their_category() {
        assert_eq!(LOADS.categories(StatusType::Category), vec!["LOAD"]);
        assert!(LOADS.categories(StatusType::EnhancedLog).is_empty());
        assert!(ENCLOSURES.categories(StatusType::Category).is_empty());
    }

    #[test]
    fn definitions_handle_their_types() {
        assert!(BUTTONS.handles("Button"));
        assert!(!BUTTONS.handles("Load"));
        assert_eq!(ENCLOSURES.build_interfaces().len(), 0);
        assert_eq!(BUTTONS.build_interfaces()[0].name(), "Button");
    }
}

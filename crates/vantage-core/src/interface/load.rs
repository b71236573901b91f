// ── Load interface ──

use std::sync::{Arc, LazyLock};

use super::{InterfaceSpec, Updates};
use crate::error::CoreError;
use crate::model::{Codec, Value, Vid};
use crate::object::SystemObject;

pub const INTERFACE: &str = "Load";

/// Output level in percent.
pub const LEVEL: &str = "level";

pub static LOAD: LazyLock<InterfaceSpec> = LazyLock::new(|| {
    InterfaceSpec::builder(INTERFACE)
        .getter("GetLevel", "GetLevelHW", Codec::Decimal, Some(LEVEL))
        .setter("SetLevel", "SetLevelSW", &[Codec::Decimal], Some(LEVEL))
        .category("LOAD", decode_load)
        .build()
});

/// `S:LOAD <vid> <level>`
fn decode_load(args: &[String]) -> Result<Updates, CoreError> {
    let level = args
        .first()
        .ok_or_else(|| CoreError::conversion("LOAD status without level"))?;
    Ok(vec![(LEVEL, Codec::Decimal.decode(level)?)])
}

/// A dimmer or relay output.
#[derive(Debug, Clone)]
pub struct Load {
    object: Arc<SystemObject>,
}

impl Load {
    pub fn new(object: Arc<SystemObject>) -> Option<Self> {
        object.has_interface(INTERFACE).then_some(Self { object })
    }

    pub fn object(&self) -> &Arc<SystemObject> {
        &self.object
    }

    pub fn vid(&self) -> Vid {
        self.object.vid()
    }

    pub fn level(&self) -> Option<f64> {
        self.object.property(LEVEL)?.as_decimal()
    }

    pub fn is_on(&self) -> bool {
        self.level().is_some_and(|level| level > 0.0)
    }

    pub async fn get_level(&self, hw: bool) -> Result<f64, CoreError> {
        let value = self.object.get("GetLevel", hw).await?;
        value
            .as_decimal()
            .ok_or_else(|| CoreError::conversion(format!("expected level, got {value}")))
    }

    /// Set the output level, clamped to `0..=100`.
    pub async fn set_level(&self, level: f64, sw: bool) -> Result<(), CoreError> {
        let level = level.clamp(0.0, 100.0);
        self.object.set("SetLevel", &[Value::Decimal(level)], sw).await
    }

    pub async fn turn_on(&self) -> Result<(), CoreError> {
        self.set_level(100.0, false).await
    }

    pub async fn turn_off(&self) -> Result<(), CoreError> {
        self.set_level(0.0, false).await
    }
}

//! Shared helpers for command handlers.

use std::sync::Arc;

use vantage_core::{BlinkRate, ObjectRecord, Rgb, SystemObject, Vantage, Vid};

use crate::cli::BlinkArg;
use crate::error::CliError;

/// Look up `vid`, injecting a bare record of `type_name` when the object
/// is not in the snapshot.
pub fn resolve_object(
    vantage: &Vantage,
    vid: u32,
    type_name: Option<&str>,
) -> Result<Arc<SystemObject>, CliError> {
    let vid = Vid::new(vid);
    if let Some(object) = vantage.get(vid) {
        return Ok(object);
    }

    let not_found = || CliError::NotFound {
        vid: vid.to_string(),
    };
    let type_name = type_name.ok_or_else(not_found)?;
    let controller = vantage
        .controller_for(type_name)
        .ok_or_else(|| CliError::Validation {
            field: "type".into(),
            reason: format!("unknown object type '{type_name}'"),
        })?;
    controller.inject(ObjectRecord::new(vid, type_name))?;
    vantage.get(vid).ok_or_else(not_found)
}

/// Parse `r,g,b` or `#rrggbb`.
pub fn parse_rgb(input: &str) -> Result<Rgb, CliError> {
    let invalid = || CliError::Validation {
        field: "color".into(),
        reason: format!("'{input}' is not r,g,b or #rrggbb"),
    };

    if let Some(hex) = input.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        return Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?));
    }

    let parts: Vec<&str> = input.split(',').collect();
    Rgb::from_tokens(&parts).map_err(|_| invalid())
}

pub fn blink_rate(arg: BlinkArg) -> BlinkRate {
    match arg {
        BlinkArg::Fast => BlinkRate::Fast,
        BlinkArg::Medium => BlinkRate::Medium,
        BlinkArg::Slow => BlinkRate::Slow,
        BlinkArg::VerySlow => BlinkRate::VerySlow,
        BlinkArg::Off => BlinkRate::Off,
    }
}

//! Keypad button actions.

use std::time::Duration;

use vantage_core::{Button, Rgb, Vantage};

use crate::cli::{GlobalOpts, LedArgs, PressArgs};
use crate::error::CliError;

use super::util;

async fn button(vantage: &Vantage, vid: u32) -> Result<Button, CliError> {
    vantage.initialize(false, false).await?;
    let object = util::resolve_object(vantage, vid, Some("Button"))?;
    let type_name = object.type_name().to_owned();
    Button::new(object).ok_or_else(|| CliError::Validation {
        field: "vid".into(),
        reason: format!("object {vid} is a {type_name}, not a button"),
    })
}

pub async fn press(vantage: &Vantage, args: &PressArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let button = button(vantage, args.vid).await?;

    if args.no_release {
        button.press().await?;
    } else if args.hold_ms > 0 {
        button.press().await?;
        tokio::time::sleep(Duration::from_millis(args.hold_ms)).await;
        button.release().await?;
    } else {
        button.press_and_release().await?;
    }

    if !global.quiet {
        eprintln!("Button {} pressed", args.vid);
    }
    Ok(())
}

pub async fn led(vantage: &Vantage, args: &LedArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let active = util::parse_rgb(&args.active)?;
    let inactive = args
        .inactive
        .as_deref()
        .map_or(Ok(Rgb::BLACK), util::parse_rgb)?;
    let blink = util::blink_rate(args.blink);

    let button = button(vantage, args.vid).await?;
    button.set_led(active, inactive, blink).await?;

    if !global.quiet {
        eprintln!("Button {} LED set to {active} / {inactive}, blink {blink}", args.vid);
    }
    Ok(())
}

// ── Button interface ──
//
// Keypad buttons: press state, hold/polarity/sound configuration, and
// the LED ring controlled through the `LED`/`GETLED` terminal commands.

use std::sync::{Arc, LazyLock};

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::{InterfaceSpec, RawFetch, Updates};
use crate::error::CoreError;
use crate::model::{Codec, EnumCodec, Rgb, Value, Vid, WireEnum};
use crate::object::SystemObject;

pub const INTERFACE: &str = "Button";

pub const STATE: &str = "state";
pub const LED_ACTIVE_COLOR: &str = "led_active_color";
pub const LED_INACTIVE_COLOR: &str = "led_inactive_color";
pub const LED_BLINK_RATE: &str = "led_blink_rate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr, Display)]
#[strum(ascii_case_insensitive)]
pub enum ButtonState {
    Up,
    Down,
}

impl WireEnum for ButtonState {
    const ORDINAL: bool = true;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr, Display)]
#[strum(ascii_case_insensitive)]
pub enum SoundType {
    Continuous,
    Pulsed,
    Off,
}

impl WireEnum for SoundType {
    const ORDINAL: bool = true;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr, Display)]
#[strum(ascii_case_insensitive)]
pub enum Polarity {
    NormallyOpen,
    NormallyClosed,
}

impl WireEnum for Polarity {
    const ORDINAL: bool = true;
}

/// LED blink rate, sent by name.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr, Display,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum BlinkRate {
    Fast,
    Medium,
    Slow,
    VerySlow,
    #[default]
    Off,
}

impl WireEnum for BlinkRate {
    const ORDINAL: bool = false;
}

fn state_codec() -> Codec {
    Codec::Enum(EnumCodec::of::<ButtonState>("ButtonState"))
}

pub static BUTTON: LazyLock<InterfaceSpec> = LazyLock::new(|| {
    let polarity = Codec::Enum(EnumCodec::of::<Polarity>("Polarity"));
    let snd_type = Codec::Enum(EnumCodec::of::<SoundType>("SoundType"));
    InterfaceSpec::builder(INTERFACE)
        .getter("GetState", "GetStateHW", state_codec(), Some(STATE))
        .setter("SetState", "SetStateSW", &[state_codec()], Some(STATE))
        .getter("GetHoldOn", "GetHoldOnHW", Codec::Decimal, None)
        .setter("SetHoldOn", "SetHoldOnSW", &[Codec::Decimal], None)
        .getter("GetPolarity", "GetPolarityHW", polarity, None)
        .setter("SetPolarity", "SetPolaritySW", &[polarity], None)
        .getter("GetSndType", "GetSndTypeHW", snd_type, None)
        .setter("SetSndType", "SetSndTypeSW", &[snd_type], None)
        .getter("GetPlacement", "GetPlacementHW", Codec::Int, None)
        .setter("SetPlacement", "SetPlacementSW", &[Codec::Int], None)
        .property(LED_ACTIVE_COLOR)
        .property(LED_INACTIVE_COLOR)
        .property(LED_BLINK_RATE)
        .category("BTN", decode_btn)
        .category("LED", decode_led)
        .raw_fetch(RawFetch {
            command: |vid| format!("GETLED {vid}"),
            parse: decode_getled,
        })
        .build()
});

// ── Status decoding ─────────────────────────────────────────────────

/// `S:BTN <vid> PRESS|RELEASE`
fn decode_btn(args: &[String]) -> Result<Updates, CoreError> {
    let state = match args.first().map(String::as_str) {
        Some("PRESS") => ButtonState::Down,
        Some("RELEASE") => ButtonState::Up,
        other => {
            return Err(CoreError::conversion(format!(
                "unknown button action {other:?}"
            )));
        }
    };
    Ok(vec![(STATE, Value::of(state))])
}

/// `S:LED <vid> <state> <R1> <G1> <B1> <R2> <G2> <B2> <BlinkRate>`
fn decode_led(args: &[String]) -> Result<Updates, CoreError> {
    let Some([_state, active @ .., blink]) = args.get(..8) else {
        return Err(CoreError::conversion(format!(
            "LED status needs 8 fields, got {}",
            args.len()
        )));
    };
    let (active, inactive) = active.split_at(3);
    let blink = BlinkRate::from_wire(blink)
        .ok_or_else(|| CoreError::conversion(format!("invalid blink rate '{blink}'")))?;
    Ok(vec![
        (LED_ACTIVE_COLOR, Value::Rgb(Rgb::from_tokens(active)?)),
        (LED_INACTIVE_COLOR, Value::Rgb(Rgb::from_tokens(inactive)?)),
        (LED_BLINK_RATE, Value::of(blink)),
    ])
}

/// `R:GETLED <vid> <state> <R1> <G1> <B1> <R2> <G2> <B2> <BlinkRate>`
fn decode_getled(vid: Vid, tokens: &[String]) -> Result<Updates, CoreError> {
    match tokens {
        [verb, echoed, rest @ ..] if verb == "R:GETLED" => {
            if echoed.parse::<Vid>().ok() != Some(vid) {
                return Err(CoreError::Protocol {
                    message: format!("GETLED reply for {echoed}, expected {vid}"),
                });
            }
            decode_led(rest)
        }
        _ => Err(CoreError::Protocol {
            message: format!("unexpected GETLED reply: {}", tokens.join(" ")),
        }),
    }
}

// ── Typed wrapper ───────────────────────────────────────────────────

/// A keypad button.
#[derive(Debug, Clone)]
pub struct Button {
    object: Arc<SystemObject>,
}

impl Button {
    /// Wrap `object` if it composes the Button interface.
    pub fn new(object: Arc<SystemObject>) -> Option<Self> {
        object.has_interface(INTERFACE).then_some(Self { object })
    }

    pub fn object(&self) -> &Arc<SystemObject> {
        &self.object
    }

    pub fn vid(&self) -> Vid {
        self.object.vid()
    }

    /// Cached press state; `None` until first fetched or pushed.
    pub fn state(&self) -> Option<ButtonState> {
        self.object.property(STATE)?.as_enum()
    }

    pub fn is_down(&self) -> bool {
        self.state() == Some(ButtonState::Down)
    }

    pub fn led_active_color(&self) -> Option<Rgb> {
        self.object.property(LED_ACTIVE_COLOR)?.as_rgb()
    }

    pub fn led_inactive_color(&self) -> Option<Rgb> {
        self.object.property(LED_INACTIVE_COLOR)?.as_rgb()
    }

    pub fn led_blink_rate(&self) -> Option<BlinkRate> {
        self.object.property(LED_BLINK_RATE)?.as_enum()
    }

    pub async fn get_state(&self, hw: bool) -> Result<ButtonState, CoreError> {
        enum_result(self.object.get("GetState", hw).await?)
    }

    pub async fn set_state(&self, state: ButtonState, sw: bool) -> Result<(), CoreError> {
        self.object.set("SetState", &[Value::of(state)], sw).await
    }

    /// Hold-on time in seconds.
    pub async fn get_hold_on(&self, hw: bool) -> Result<f64, CoreError> {
        let value = self.object.get("GetHoldOn", hw).await?;
        value
            .as_decimal()
            .ok_or_else(|| CoreError::conversion(format!("expected seconds, got {value}")))
    }

    pub async fn set_hold_on(&self, seconds: f64, sw: bool) -> Result<(), CoreError> {
        self.object
            .set("SetHoldOn", &[Value::Decimal(seconds)], sw)
            .await
    }

    pub async fn get_polarity(&self, hw: bool) -> Result<Polarity, CoreError> {
        enum_result(self.object.get("GetPolarity", hw).await?)
    }

    pub async fn set_polarity(&self, polarity: Polarity, sw: bool) -> Result<(), CoreError> {
        self.object
            .set("SetPolarity", &[Value::of(polarity)], sw)
            .await
    }

    pub async fn get_snd_type(&self, hw: bool) -> Result<SoundType, CoreError> {
        enum_result(self.object.get("GetSndType", hw).await?)
    }

    pub async fn set_snd_type(&self, snd_type: SoundType, sw: bool) -> Result<(), CoreError> {
        self.object
            .set("SetSndType", &[Value::of(snd_type)], sw)
            .await
    }

    /// Position of the button on its keypad.
    pub async fn get_placement(&self, hw: bool) -> Result<i64, CoreError> {
        let value = self.object.get("GetPlacement", hw).await?;
        value
            .as_int()
            .ok_or_else(|| CoreError::conversion(format!("expected placement, got {value}")))
    }

    pub async fn set_placement(&self, placement: i64, sw: bool) -> Result<(), CoreError> {
        self.object
            .set("SetPlacement", &[Value::Int(placement)], sw)
            .await
    }

    pub async fn press(&self) -> Result<(), CoreError> {
        self.set_state(ButtonState::Down, false).await
    }

    pub async fn release(&self) -> Result<(), CoreError> {
        self.set_state(ButtonState::Up, false).await
    }

    pub async fn press_and_release(&self) -> Result<(), CoreError> {
        self.press().await?;
        self.release().await
    }

    /// Set LED colors and blink rate (`LED <vid> R1 G1 B1 R2 G2 B2 <rate>`).
    pub async fn set_led(
        &self,
        active: Rgb,
        inactive: Rgb,
        blink_rate: BlinkRate,
    ) -> Result<(), CoreError> {
        let line = format!(
            "LED {} {} {} {} {} {} {} {}",
            self.vid(),
            active.r,
            active.g,
            active.b,
            inactive.r,
            inactive.g,
            inactive.b,
            blink_rate.to_wire()
        );
        self.object.raw_request(&line).await?;
        self.object.update_properties(
            INTERFACE,
            vec![
                (LED_ACTIVE_COLOR, Value::Rgb(active)),
                (LED_INACTIVE_COLOR, Value::Rgb(inactive)),
                (LED_BLINK_RATE, Value::of(blink_rate)),
            ],
        );
        Ok(())
    }

    /// Turn the LED off and clear any fault blink.
    pub async fn clear_led(&self) -> Result<(), CoreError> {
        self.set_led(Rgb::BLACK, Rgb::BLACK, BlinkRate::Off).await
    }
}

fn enum_result<E: WireEnum>(value: Value) -> Result<E, CoreError> {
    value
        .as_enum()
        .ok_or_else(|| CoreError::conversion(format!("unexpected value {value}")))
}

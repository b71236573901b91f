// ── Property values and wire codecs ──
//
// Cached property values are a small tagged union. Every wire token is
// decoded through a `Codec` chosen by the method or category that
// carried it, so the cache never holds raw strings for typed slots.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::error::CoreError;

// ── Rgb ─────────────────────────────────────────────────────────────

/// 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Decode three consecutive integer tokens.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, CoreError> {
        let [r, g, b] = tokens else {
            return Err(CoreError::conversion(format!(
                "expected 3 color components, got {}",
                tokens.len()
            )));
        };
        Ok(Self::new(component(r.as_ref())?, component(g.as_ref())?, component(b.as_ref())?))
    }
}

fn component(token: &str) -> Result<u8, CoreError> {
    token
        .trim()
        .parse()
        .map_err(|_| CoreError::conversion(format!("invalid color component '{token}'")))
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

// ── Value ───────────────────────────────────────────────────────────

/// A decoded property value.
///
/// Equality is semantic: `50` and `50.000` decode to the same
/// `Decimal`, and enum values compare by canonical variant name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Decimal(f64),
    Bool(bool),
    Text(String),
    Rgb(Rgb),
    /// Canonical variant name of a [`WireEnum`].
    Enum(&'static str),
}

impl Value {
    pub fn of<E: WireEnum>(variant: E) -> Self {
        Self::Enum(variant.into())
    }

    pub fn as_enum<E: WireEnum>(&self) -> Option<E> {
        match self {
            Self::Enum(name) => E::from_name(name),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Int(i) => i32::try_from(*i).ok().map(f64::from),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_rgb(&self) -> Option<Rgb> {
        match self {
            Self::Rgb(rgb) => Some(*rgb),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d:.3}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
            Self::Rgb(rgb) => write!(f, "{rgb}"),
            Self::Enum(name) => f.write_str(name),
        }
    }
}

// ── WireEnum ────────────────────────────────────────────────────────

/// An enumerated property that travels as either its ordinal or its name.
///
/// Implemented for strum-derived enums. Ordinal enums (`ORDINAL = true`)
/// encode as `0`, `1`, ... in declaration order and decode from either
/// form; named enums encode as their serialized name (`FAST`).
pub trait WireEnum:
    Copy + PartialEq + IntoEnumIterator + FromStr + Into<&'static str> + 'static
{
    const ORDINAL: bool;

    fn from_name(name: &str) -> Option<Self> {
        Self::iter().find(|v| Into::<&'static str>::into(*v) == name)
    }

    fn from_wire(token: &str) -> Option<Self> {
        let token = token.trim();
        if let Ok(ordinal) = token.parse::<usize>() {
            return Self::iter().nth(ordinal);
        }
        token.parse().ok()
    }

    fn to_wire(self) -> String {
        if Self::ORDINAL {
            if let Some(ordinal) = Self::iter().position(|v| v == self) {
                return ordinal.to_string();
            }
        }
        Into::<&'static str>::into(self).to_owned()
    }
}

/// Type-erased codec for one [`WireEnum`].
#[derive(Clone, Copy)]
pub struct EnumCodec {
    pub(crate) name: &'static str,
    decode: fn(&str) -> Option<&'static str>,
    encode: fn(&str) -> Option<String>,
}

impl EnumCodec {
    pub fn of<E: WireEnum>(name: &'static str) -> Self {
        Self {
            name,
            decode: |token| E::from_wire(token).map(Into::into),
            encode: |name| E::from_name(name).map(WireEnum::to_wire),
        }
    }
}

impl fmt::Debug for EnumCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnumCodec").field(&self.name).finish()
    }
}

// ── Codec ───────────────────────────────────────────────────────────

/// How one wire token maps onto a [`Value`].
#[derive(Debug, Clone, Copy)]
pub enum Codec {
    Int,
    Decimal,
    Bool,
    Text,
    Enum(EnumCodec),
}

impl Codec {
    pub fn decode(&self, token: &str) -> Result<Value, CoreError> {
        let trimmed = token.trim();
        let bad = |what: &str| CoreError::conversion(format!("expected {what}, got '{token}'"));
        match self {
            Self::Int => trimmed.parse().map(Value::Int).map_err(|_| bad("integer")),
            Self::Decimal => trimmed
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(Value::Decimal)
                .ok_or_else(|| bad("decimal")),
            Self::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Ok(Value::Bool(true)),
                "0" | "false" | "off" | "no" => Ok(Value::Bool(false)),
                _ => Err(bad("boolean")),
            },
            Self::Text => Ok(Value::Text(token.to_owned())),
            Self::Enum(codec) => (codec.decode)(trimmed)
                .map(Value::Enum)
                .ok_or_else(|| bad(codec.name)),
        }
    }

    pub fn encode(&self, value: &Value) -> Result<String, CoreError> {
        let mismatch = || CoreError::conversion(format!("cannot encode {value:?} as {self:?}"));
        match (self, value) {
            (Self::Int, Value::Int(i)) => Ok(i.to_string()),
            (Self::Decimal, Value::Decimal(d)) => Ok(format!("{d:.3}")),
            (Self::Decimal, Value::Int(i)) => Ok(format!("{i}.000")),
            (Self::Bool, Value::Bool(b)) => Ok(if *b { "1" } else { "0" }.to_owned()),
            (Self::Text, Value::Text(s)) => Ok(s.clone()),
            (Self::Enum(codec), Value::Enum(name)) => (codec.encode)(name).ok_or_else(mismatch),
            _ => Err(mismatch()),
        }
    }
}

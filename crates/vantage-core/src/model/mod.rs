// ── Domain model ──

mod event;
mod record;
mod value;
mod vid;

pub use event::{EventKind, ObjectEvent, PropertyChange};
pub use record::ObjectRecord;
pub use value::{Codec, EnumCodec, Rgb, Value, WireEnum};
pub use vid::Vid;

//! Object synchronization runtime between `vantage-api` and applications.
//!
//! This crate owns the domain model, the capability framework, and the
//! object lifecycle for a Vantage InFusion controller:
//!
//! - **[`Vantage`]**: Client facade. Wires one [`CommandClient`](vantage_api::CommandClient),
//!   one [`EventStream`](vantage_api::EventStream), and the built-in controllers.
//!   [`initialize()`](Vantage::initialize) populates every controller concurrently,
//!   optionally fetching state and enabling monitoring.
//!
//! - **[`Controller`]**: Per-family object registry (`buttons`, `loads`,
//!   `enclosures`). Populates from [`Discovery`] or from injected snapshot
//!   records, fetches state with bounded concurrency, and chooses a
//!   [`StatusType`] through a pluggable [`StatusProbe`].
//!
//! - **[`Interface`]**: Capability framework. A static [`InterfaceSpec`]
//!   maps logical methods onto cached and hardware wire verbs; each
//!   interface instance holds one object's property cache, updated only
//!   through [`Interface::update_properties`].
//!
//! - **[`SystemObject`]**: Identity plus an ordered interface chain.
//!   Typed wrappers ([`Button`], [`Load`]) sit on top.
//!
//! - **[`snapshot`]**: Design Center backup loader used for cold starts.
//!
//! Property changes surface as [`ObjectEvent`]s through
//! [`Vantage::subscribe`].

pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod interface;
pub mod model;
pub mod object;
pub mod probe;
pub mod registry;
pub mod snapshot;
mod store;
mod vantage;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ClientConfig, StatusMode};
pub use controller::{Controller, ControllerDefinition, ControllerDeps, ControllerState};
pub use discovery::{Discovery, SnapshotDiscovery, StaticDiscovery};
pub use error::CoreError;
pub use interface::button::{BlinkRate, Button, ButtonState, Polarity, SoundType};
pub use interface::load::Load;
pub use interface::{Interface, InterfaceSpec, MethodDescriptor, MethodKind};
pub use object::{ObjectContext, SystemObject};
pub use probe::{EnhancedLogProbe, FixedProbe, StatusProbe, StatusType};
pub use registry::TypeRegistry;
pub use snapshot::ControllerInfo;
pub use vantage::Vantage;

pub use model::{
    Codec, EnumCodec, EventKind, ObjectEvent, ObjectRecord, PropertyChange, Rgb, Value, Vid,
    WireEnum,
};

// vantage-api: Async Rust client for the Vantage InFusion host command protocol

pub mod command;
pub mod error;
pub mod events;
pub mod protocol;
pub mod reconnect;
pub mod subscribers;
pub mod transport;

mod tls;

pub use command::{CommandClient, CommandOptions};
pub use error::Error;
pub use events::{EventOptions, EventStream, STATUS_CATEGORY, StatusEvent};
pub use protocol::{Frame, InvokeReply};
pub use reconnect::ReconnectConfig;
pub use subscribers::{Registry, Subscription};
pub use transport::{Connection, Credentials, TlsMode, TransportConfig};

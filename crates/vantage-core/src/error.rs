// ── Core error types ──
//
// User-facing errors from vantage-core. The `From<vantage_api::Error>`
// impl translates protocol-layer failures into the same taxonomy, so
// callers match on one enum regardless of which layer failed.

use thiserror::Error;

use crate::model::Vid;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller: {message}")]
    Connection { message: String },

    #[error("Controller connection closed")]
    ConnectionClosed,

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Command failed (code {code}): {message}")]
    Command { code: i32, message: String },

    #[error("Conversion error: {message}")]
    Conversion { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Unknown method {method} on object {vid}")]
    UnknownMethod { vid: Vid, method: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Object not found: {vid}")]
    NotFound { vid: Vid },

    #[error("Discovery failed: {message}")]
    Discovery { message: String },

    #[error("Snapshot file {path}: {message}")]
    Snapshot { path: String, message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Returns `true` for failures scoped to one property or one call,
    /// which batch operations log and skip.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::Command { .. }
                | Self::Conversion { .. }
                | Self::Protocol { .. }
                | Self::UnknownMethod { .. }
                | Self::Timeout { .. }
        )
    }
}

// ── Conversion from protocol-layer errors ────────────────────────────

impl From<vantage_api::Error> for CoreError {
    fn from(err: vantage_api::Error) -> Self {
        use vantage_api::Error as Api;

        match err {
            Api::Connection { message } => Self::Connection { message },
            Api::ConnectionClosed => Self::ConnectionClosed,
            Api::Tls(message) => Self::Connection {
                message: format!("TLS: {message}"),
            },
            Api::Io(e) => Self::Connection {
                message: e.to_string(),
            },
            Api::Authentication { message } => Self::Authentication { message },
            Api::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            Api::Command { code, message } => Self::Command { code, message },
            Api::Conversion { message } => Self::Conversion { message },
            Api::Protocol { message } => Self::Protocol { message },
        }
    }
}

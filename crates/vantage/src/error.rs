//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vantage_config::ConfigError;
use vantage_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const COMMAND: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to controller at {host}: {reason}")]
    #[diagnostic(
        code(vantage::connection_failed),
        help(
            "Check that the controller is reachable and the port matches the TLS mode.\n\
             Plaintext listens on 3001, TLS on 3010. Try: --tls disabled"
        )
    )]
    ConnectionFailed { host: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Controller rejected LOGIN: {message}")]
    #[diagnostic(
        code(vantage::auth_failed),
        help("Verify the username and password, or store one with: vantage config set-password")
    )]
    AuthFailed { message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(vantage::no_credentials),
        help(
            "Store one with: vantage config set-password --profile {profile}\n\
             Or set the VANTAGE_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Objects ──────────────────────────────────────────────────────
    #[error("Object {vid} not found")]
    #[diagnostic(
        code(vantage::not_found),
        help("Run: vantage list, or pass --type for objects missing from the snapshot")
    )]
    NotFound { vid: String },

    #[error("Object {vid} has no method '{method}'")]
    #[diagnostic(
        code(vantage::unknown_method),
        help("Use: vantage invoke {vid} Interface.Method to call it untyped")
    )]
    UnknownMethod { vid: String, method: String },

    // ── Controller ───────────────────────────────────────────────────
    #[error("Controller error {code}: {message}")]
    #[diagnostic(code(vantage::command_error))]
    Command { code: i32, message: String },

    #[error("Protocol error: {message}")]
    #[diagnostic(code(vantage::protocol))]
    Protocol { message: String },

    #[error("Request timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(vantage::timeout),
        help("Increase the timeout with --timeout or check controller load.")
    )]
    Timeout { timeout_ms: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vantage::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vantage::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(vantage::no_config),
        help("Pass --host, set VANTAGE_HOST, or add a profile to {path}")
    )]
    NoConfig { path: String },

    #[error("Snapshot {path} could not be read: {message}")]
    #[diagnostic(code(vantage::snapshot))]
    Snapshot { path: String, message: String },

    #[error(transparent)]
    #[diagnostic(code(vantage::config))]
    Config(ConfigError),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Name the controller in connection failures.
    pub fn with_host(self, host: &str) -> Self {
        match self {
            Self::ConnectionFailed { reason, .. } => Self::ConnectionFailed {
                host: host.to_owned(),
                reason,
            },
            other => other,
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::UnknownMethod { .. } => exit_code::NOT_FOUND,
            Self::Command { .. } => exit_code::COMMAND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::ProfileNotFound { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Connection { message } => Self::ConnectionFailed {
                host: "controller".into(),
                reason: message,
            },
            CoreError::ConnectionClosed => Self::ConnectionFailed {
                host: "controller".into(),
                reason: "connection closed".into(),
            },
            CoreError::Authentication { message } => Self::AuthFailed { message },
            CoreError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            CoreError::Command { code, message } => Self::Command { code, message },
            CoreError::Protocol { message } => Self::Protocol { message },
            CoreError::UnknownMethod { vid, method } => Self::UnknownMethod {
                vid: vid.to_string(),
                method,
            },
            CoreError::NotFound { vid } => Self::NotFound {
                vid: vid.to_string(),
            },
            CoreError::Snapshot { path, message } => Self::Snapshot { path, message },
            CoreError::Conversion { message } => Self::Validation {
                field: "value".into(),
                reason: message,
            },
            CoreError::Discovery { message } => Self::Validation {
                field: "object".into(),
                reason: message,
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<vantage_api::Error> for CliError {
    fn from(err: vantage_api::Error) -> Self {
        Self::from(CoreError::from(err))
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

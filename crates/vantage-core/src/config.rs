// ── Runtime client configuration ──
//
// These types describe *how* to reach a controller and how to monitor
// it. They carry credentials and tuning, but never touch disk; the CLI
// builds a `ClientConfig` (usually via vantage-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use vantage_api::{CommandOptions, EventOptions, ReconnectConfig, TlsMode, TransportConfig};

/// How controllers choose their monitoring strategy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum StatusMode {
    /// Probe for the enhanced log; fall back to category status.
    #[default]
    Auto,
    /// Always use the enhanced log.
    EnhancedLog,
    /// Always use per-category `STATUS` subscriptions.
    Category,
}

/// Configuration for one controller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Controller hostname or IP address.
    pub host: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub tls: TlsMode,
    /// Overrides the default port for `tls`.
    pub command_port: Option<u16>,
    pub request_timeout: Duration,
    /// Backoff for the event connection.
    pub reconnect: ReconnectConfig,
    pub status_mode: StatusMode,
    /// Design Center backup used to pre-populate controllers.
    pub local_config_file: Option<PathBuf>,
    /// Objects fetched concurrently during `fetch_state`.
    pub fetch_concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: None,
            password: None,
            tls: TlsMode::default(),
            command_port: None,
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            status_mode: StatusMode::default(),
            local_config_file: None,
            fetch_concurrency: 16,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Transport settings shared by the command and event connections.
    pub fn transport(&self) -> TransportConfig {
        let mut transport = TransportConfig::new(self.host.clone(), self.tls.clone());
        if let Some(port) = self.command_port {
            transport = transport.with_port(port);
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            transport = transport.with_credentials(username.clone(), password.clone());
        }
        transport
    }

    pub fn command_options(&self) -> CommandOptions {
        CommandOptions {
            request_timeout: self.request_timeout,
            ..CommandOptions::default()
        }
    }

    pub fn event_options(&self) -> EventOptions {
        EventOptions {
            reconnect: self.reconnect.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

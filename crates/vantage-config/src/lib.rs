//! Shared configuration for Vantage tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `vantage_core::ClientConfig`. The CLI layers its
//! flag overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vantage_api::{ReconnectConfig, TlsMode};
use vantage_core::{ClientConfig, StatusMode};

/// Keyring service name; entries are keyed `<profile>/password`.
pub const KEYRING_SERVICE: &str = "vantage";

/// Environment variable consulted for the controller password.
pub const PASSWORD_ENV: &str = "VANTAGE_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub status_mode: StatusMode,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            status_mode: StatusMode::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// Transport security for a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsSetting {
    /// Plaintext on port 3001.
    Disabled,
    /// TLS verified against the web PKI roots.
    Verify,
    /// TLS accepting the controller's self-signed certificate.
    #[default]
    Insecure,
}

/// A named controller profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Controller hostname or IP address.
    pub host: String,

    /// Command port override.
    pub port: Option<u16>,

    #[serde(default)]
    pub tls: TlsSetting,

    /// CA certificate for a controller signed by a private CA.
    /// Implies certificate verification.
    pub ca_cert: Option<PathBuf>,

    /// Username for `LOGIN`. No handshake is sent when absent.
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Design Center backup for cold-start population.
    pub snapshot: Option<PathBuf>,

    /// Override the default status mode.
    pub status_mode: Option<StatusMode>,

    /// Override the default timeout.
    pub timeout: Option<u64>,

    pub fetch_concurrency: Option<usize>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "vantage", "vantage").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vantage");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full config from the canonical file and `VANTAGE_` env vars.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` merged with the environment.
///
/// A missing file is not an error. Nested keys use a double underscore:
/// `VANTAGE_DEFAULTS__TIMEOUT=30`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VANTAGE_").ignore(&["PASSWORD"]).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the password for a profile that names a username.
///
/// Chain: the profile's `password_env`, then `VANTAGE_PASSWORD`, then
/// the system keyring, then plaintext. Returns `Ok(None)` for profiles
/// without a username.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    if profile.username.is_none() {
        return Ok(None);
    }

    // 1. Env vars
    let env_names = profile.password_env.iter().map(String::as_str).chain([PASSWORD_ENV]);
    for env_name in env_names {
        if let Ok(pw) = std::env::var(env_name) {
            return Ok(Some(SecretString::from(pw)));
        }
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(pw) = entry.get_password() {
            return Ok(Some(SecretString::from(pw)));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(Some(SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store `password` in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(password)?;
    Ok(())
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

fn tls_mode(profile: &Profile) -> TlsMode {
    match (profile.tls, &profile.ca_cert) {
        (TlsSetting::Disabled, _) => TlsMode::Disabled,
        (_, Some(ca)) => TlsMode::CustomCa(ca.clone()),
        (TlsSetting::Verify, None) => TlsMode::System,
        (TlsSetting::Insecure, None) => TlsMode::DangerAcceptInvalid,
    }
}

/// Build a `ClientConfig` from a profile, with no CLI overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let password = resolve_password(profile, profile_name)?;
    build_client_config(profile, profile_name, defaults, password)
}

/// Build a `ClientConfig` from a profile and an already resolved password.
pub fn build_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    password: Option<SecretString>,
) -> Result<ClientConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has no host"),
        });
    }
    if profile.fetch_concurrency == Some(0) {
        return Err(ConfigError::Validation {
            field: "fetch_concurrency".into(),
            reason: "must be at least 1".into(),
        });
    }

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(ClientConfig {
        host: profile.host.trim().to_owned(),
        username: profile.username.clone(),
        password,
        tls: tls_mode(profile),
        command_port: profile.port,
        request_timeout: timeout,
        reconnect: ReconnectConfig::default(),
        status_mode: profile.status_mode.unwrap_or(defaults.status_mode),
        local_config_file: profile.snapshot.clone(),
        fetch_concurrency: profile.fetch_concurrency.unwrap_or(16),
    })
}

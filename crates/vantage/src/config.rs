//! CLI configuration: thin wrapper around `vantage_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --port, --tls, --password, ...).

use std::time::Duration;

use secrecy::SecretString;

use vantage_api::TlsMode;
use vantage_config::{Profile, TlsSetting};
use vantage_core::{ClientConfig, StatusMode};

use crate::cli::{GlobalOpts, StatusModeArg, TlsArg};
use crate::error::CliError;

pub use vantage_config::{Config, config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the client configuration. Flags take priority over the profile;
/// without a profile, `--host` alone is enough.
pub fn resolve(global: &GlobalOpts, config: &Config) -> Result<ClientConfig, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut client = match config.profiles.get(&profile_name) {
        Some(profile) => resolve_profile(profile, &profile_name, global, config)?,
        None if global.profile.is_some() => return Err(profile_not_found(profile_name, config)),
        None => {
            let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            ClientConfig {
                request_timeout: Duration::from_secs(config.defaults.timeout),
                status_mode: config.defaults.status_mode,
                ..ClientConfig::new(host)
            }
        }
    };

    apply_flags(&mut client, global);
    Ok(client)
}

pub fn profile_not_found(name: String, config: &Config) -> CliError {
    let mut available: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    available.sort_unstable();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
    config: &Config,
) -> Result<ClientConfig, CliError> {
    // A password flag short-circuits the credential chain.
    let client = match &global.password {
        Some(password) => vantage_config::build_client_config(
            profile,
            profile_name,
            &config.defaults,
            Some(SecretString::from(password.clone())),
        ),
        None => vantage_config::profile_to_client_config(profile, profile_name, &config.defaults),
    };
    client.map_err(CliError::from)
}

fn apply_flags(client: &mut ClientConfig, global: &GlobalOpts) {
    if let Some(host) = &global.host {
        client.host.clone_from(host);
    }
    if let Some(port) = global.port {
        client.command_port = Some(port);
    }
    if let Some(tls) = global.tls {
        client.tls = match tls {
            TlsArg::Disabled => TlsMode::Disabled,
            TlsArg::Verify => TlsMode::System,
            TlsArg::Insecure => TlsMode::DangerAcceptInvalid,
        };
    }
    if let Some(username) = &global.username {
        client.username = Some(username.clone());
    }
    if let Some(password) = &global.password {
        client.password = Some(SecretString::from(password.clone()));
    }
    if let Some(snapshot) = &global.snapshot {
        client.local_config_file = Some(snapshot.clone());
    }
    if let Some(mode) = global.status_mode {
        client.status_mode = match mode {
            StatusModeArg::Auto => StatusMode::Auto,
            StatusModeArg::EnhancedLog => StatusMode::EnhancedLog,
            StatusModeArg::Category => StatusMode::Category,
        };
    }
    if let Some(timeout) = global.timeout {
        client.request_timeout = Duration::from_secs(timeout);
    }
}

/// Profile TLS label for `config show`.
pub fn tls_label(tls: TlsSetting) -> &'static str {
    match tls {
        TlsSetting::Disabled => "disabled",
        TlsSetting::Verify => "verify",
        TlsSetting::Insecure => "insecure",
    }
}

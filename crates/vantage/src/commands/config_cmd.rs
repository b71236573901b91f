//! Config subcommand handlers.

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use vantage_config::Profile;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProfileView {
    profile: String,
    host: String,
    port: Option<u16>,
    tls: &'static str,
    username: Option<String>,
    password: &'static str,
    snapshot: Option<String>,
    status_mode: String,
    timeout: u64,
}

impl ProfileView {
    fn new(name: &str, profile: &Profile, cfg: &Config) -> Self {
        let password = if profile.username.is_none() {
            "not used"
        } else if profile.password.is_some() {
            "plaintext"
        } else if profile.password_env.is_some() {
            "environment"
        } else {
            "keyring"
        };
        Self {
            profile: name.to_owned(),
            host: profile.host.clone(),
            port: profile.port,
            tls: config::tls_label(profile.tls),
            username: profile.username.clone(),
            password,
            snapshot: profile.snapshot.as_ref().map(|p| p.display().to_string()),
            status_mode: profile
                .status_mode
                .unwrap_or(cfg.defaults.status_mode)
                .to_string(),
            timeout: profile.timeout.unwrap_or(cfg.defaults.timeout),
        }
    }

    fn pairs(&self) -> Vec<KeyValue> {
        let mut pairs = vec![
            KeyValue::new("Profile", &self.profile),
            KeyValue::new("Host", &self.host),
        ];
        if let Some(port) = self.port {
            pairs.push(KeyValue::new("Port", &port.to_string()));
        }
        pairs.push(KeyValue::new("TLS", self.tls));
        if let Some(username) = &self.username {
            pairs.push(KeyValue::new("Username", username));
        }
        pairs.push(KeyValue::new("Password", self.password));
        if let Some(snapshot) = &self.snapshot {
            pairs.push(KeyValue::new("Snapshot", snapshot));
        }
        pairs.push(KeyValue::new("Status mode", &self.status_mode));
        pairs.push(KeyValue::new("Timeout", &format!("{}s", self.timeout)));
        pairs
    }
}

#[derive(Tabled)]
struct KeyValue {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl KeyValue {
    fn new(key: &'static str, value: &str) -> Self {
        Self {
            key,
            value: value.to_owned(),
        }
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();

    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let active = config::active_profile_name(global, &cfg);
            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort();
            for name in names {
                let marker = if *name == active { "*" } else { " " };
                output::print_output(&format!("{marker} {name}"), global.quiet);
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.get(&name).ok_or_else(|| CliError::NoConfig {
                path: config::config_path().display().to_string(),
            })?;
            let view = ProfileView::new(&name, profile, &cfg);
            let out = output::render_single(
                &global.output,
                &view,
                |v| Table::new(v.pairs()).with(Style::rounded()).to_string(),
                |v| format!("{}\t{}", v.profile, v.host),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&name) {
                return Err(config::profile_not_found(name, &cfg));
            }

            let password = rpassword::prompt_password(format!("Password for '{name}': "))?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }
            vantage_config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password for '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

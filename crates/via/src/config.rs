//! CLI configuration: a thin layer over `via_config`.
//!
//! Applies `GlobalOpts` overrides (--server, --username, --insecure,
//! --timeout) to the active profile and prompts for a password when
//! none resolves and stdin is a terminal.

use std::io::IsTerminal;

use secrecy::SecretString;

use via_config::{Config, ConfigError, Profile};
use via_core::{AuthCredentials, ConsoleConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use via_config::{config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The active profile with CLI flag overrides applied.
///
/// Without a matching profile, `--server` alone is enough to build one.
/// An explicitly named profile that does not exist is an error.
pub fn effective_profile(global: &GlobalOpts) -> Result<(String, Profile), CliError> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound { name });
        }
        None => Profile::default(),
    };

    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if profile.server.is_empty() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(secs) = global.timeout {
        profile.timeout = Some(secs);
    }

    Ok((name, profile))
}

/// Translate the effective profile into a `ConsoleConfig`.
pub fn resolve_console_config(global: &GlobalOpts) -> Result<ConsoleConfig, CliError> {
    let (name, profile) = effective_profile(global)?;

    let auth = match profile.username {
        None => AuthCredentials::Anonymous,
        Some(ref username) => AuthCredentials::Credentials {
            username: username.clone(),
            password: password_or_prompt(&profile, &name, username)?,
        },
    };

    Ok(via_config::build_console_config(&profile, auth)?)
}

fn password_or_prompt(
    profile: &Profile,
    profile_name: &str,
    username: &str,
) -> Result<SecretString, CliError> {
    match via_config::resolve_password(profile, profile_name) {
        Ok(password) => Ok(password),
        Err(ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {
            let password =
                rpassword::prompt_password(format!("Password for {username}@{}: ", profile.server))?;
            Ok(SecretString::from(password))
        }
        Err(err) => Err(err.into()),
    }
}

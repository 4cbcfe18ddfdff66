//! Configuration for the via console.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `via_core::ConsoleConfig`. The CLI layers its
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

use via_core::{AuthCredentials, ConsoleConfig, DEFAULT_ILO_PORT, MergePolicy, TlsVerification};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "via-console";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

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
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
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
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile { name })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
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
    30
}

/// A named server profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "https://via.lab.local:8443").
    pub server: String,

    /// Login name. Without one the console connects anonymously.
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Skip certificate verification. go-via serves a self-signed
    /// certificate, so this defaults to on unless `ca_cert` is set.
    pub insecure: Option<bool>,

    /// HTTP timeout in seconds.
    pub timeout: Option<u64>,

    /// Management controller port checked by the wizard.
    pub ilo_port: Option<u16>,

    /// Per-controller check timeout in seconds.
    pub validation_timeout: Option<u64>,

    /// Controller checks in flight at once (1 = sequential).
    pub validation_concurrency: Option<usize>,

    /// Create requests in flight at once during imports.
    pub import_concurrency: Option<usize>,

    /// Subscribe to the progress stream.
    pub progress: Option<bool>,

    /// Progress stream URL, for servers whose `/v1/log` is published
    /// elsewhere (e.g. behind a reverse proxy). Derived from `server`
    /// when unset.
    pub progress_url: Option<String>,

    /// `last-write-wins` or `monotonic`.
    pub merge_policy: Option<MergePolicy>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "via", "via-console").map_or_else(
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
    p.push("via-console");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` + `VIA_*` environment variables. A missing
/// file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VIA_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the profile's password: `password_env`, then `VIA_PASSWORD`,
/// then the system keyring, then plaintext config.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Ok(pw) = std::env::var("VIA_PASSWORD") {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

/// Resolve `AuthCredentials`: anonymous without a username, otherwise a
/// session login with the resolved password.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    match profile.username {
        None => Ok(AuthCredentials::Anonymous),
        Some(ref username) => Ok(AuthCredentials::Credentials {
            username: username.clone(),
            password: resolve_password(profile, profile_name)?,
        }),
    }
}

/// Build a `ConsoleConfig` from a profile and already-resolved credentials.
pub fn build_console_config(
    profile: &Profile,
    auth: AuthCredentials,
) -> Result<ConsoleConfig, ConfigError> {
    let url: url::Url = profile
        .server
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "server".into(),
            reason: format!("invalid URL: {}", profile.server),
        })?;

    let tls = match (profile.insecure, &profile.ca_cert) {
        (Some(true), _) => TlsVerification::DangerAcceptInvalid,
        (_, Some(ca_path)) => TlsVerification::CustomCa(ca_path.clone()),
        (Some(false), None) => TlsVerification::SystemDefaults,
        (None, None) => TlsVerification::DangerAcceptInvalid,
    };

    if profile.validation_concurrency == Some(0) || profile.import_concurrency == Some(0) {
        return Err(ConfigError::Validation {
            field: "concurrency".into(),
            reason: "must be at least 1".into(),
        });
    }

    let mut config = ConsoleConfig::new(url, auth);
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(default_timeout()));
    config.ilo_port = profile.ilo_port.unwrap_or(DEFAULT_ILO_PORT);
    if let Some(secs) = profile.validation_timeout {
        config.validation_timeout = Duration::from_secs(secs);
    }
    if let Some(n) = profile.validation_concurrency {
        config.validation_concurrency = n;
    }
    if let Some(n) = profile.import_concurrency {
        config.import_concurrency = n;
    }
    if let Some(enabled) = profile.progress {
        config.progress_enabled = enabled;
    }
    if let Some(ref raw) = profile.progress_url {
        let progress_url: url::Url = raw
            .parse()
            .ok()
            .filter(|u: &url::Url| matches!(u.scheme(), "ws" | "wss"))
            .ok_or_else(|| ConfigError::Validation {
                field: "progress_url".into(),
                reason: format!("expected a ws:// or wss:// URL: {raw}"),
            })?;
        config.progress_url = Some(progress_url);
    }
    if let Some(policy) = profile.merge_policy {
        config.merge_policy = policy;
    }
    Ok(config)
}

/// Build a `ConsoleConfig` from a profile, no CLI flag overrides.
pub fn profile_to_console_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ConsoleConfig, ConfigError> {
    let auth = resolve_auth(profile, profile_name)?;
    build_console_config(profile, auth)
}

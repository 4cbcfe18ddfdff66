//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use via_config::ConfigError;
use via_core::{CoreError, ImportError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const PARTIAL: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(dead_code, unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to provisioning server at {url}")]
    #[diagnostic(
        code(via::connection_failed),
        help(
            "Check that the go-via server is running and reachable.\n\
             URL: {url}\n\
             Self-signed certificate? Try: via --insecure groups"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(via::auth_failed),
        help(
            "Verify the username and password for this profile.\n\
             Run: via config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No password available for profile '{profile}'")]
    #[diagnostic(
        code(via::no_credentials),
        help(
            "Store one with: via config set-password --profile {profile}\n\
             Or set the VIA_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(via::not_found),
        help("Run: via {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Server ───────────────────────────────────────────────────────
    #[error("Server error: {message}")]
    #[diagnostic(code(via::api_error))]
    ApiError { message: String, status: Option<u16> },

    #[error("{message}")]
    #[diagnostic(code(via::invalid_state))]
    InvalidState { message: String },

    // ── Partial outcomes ─────────────────────────────────────────────
    #[error("{failed} of {total} rows failed")]
    #[diagnostic(
        code(via::partial_failure),
        help("Rows listed above as failed were not created; the rest were.")
    )]
    PartialFailure { failed: usize, total: usize },

    #[error("{count} controller(s) failed validation")]
    #[diagnostic(
        code(via::validation_failed),
        help("Fix the listed controllers and run the wizard again. Nothing was created.")
    )]
    WizardRejected { count: usize },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(via::validation))]
    Validation { field: String, reason: String },

    #[error("Cannot read CSV: {0}")]
    #[diagnostic(
        code(via::csv),
        help("The first non-empty line must be a header naming the schema's columns exactly.")
    )]
    Csv(#[from] ImportError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(via::profile_not_found),
        help("Check the profile name, or pass --server to connect without a profile.")
    )]
    ProfileNotFound { name: String },

    #[error("No server configured")]
    #[diagnostic(
        code(via::no_config),
        help(
            "Pass --server (or VIA_SERVER), or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(via::config))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(via::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot render JSON: {0}")]
    #[diagnostic(code(via::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(via::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::PartialFailure { .. } | Self::WizardRejected { .. } => exit_code::PARTIAL,
            Self::Validation { .. } | Self::Csv(_) | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },

            CoreError::Disconnected => Self::ConnectionFailed {
                url: "(disconnected)".into(),
                source: "Console connection was lost".into(),
            },

            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: list_command(entity_type).into(),
                resource_type: entity_type.into(),
                identifier,
            },

            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Rejected { message } => Self::ApiError {
                message,
                status: None,
            },

            CoreError::Api { message, status } => Self::ApiError { message, status },

            CoreError::InvalidState { message } => Self::InvalidState { message },

            CoreError::Import(err) => Self::Csv(err),

            CoreError::Config { message } => Self::Config { message },

            err @ CoreError::Conversion { .. } => Self::ApiError {
                message: err.to_string(),
                status: None,
            },

            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

fn list_command(entity_type: &str) -> &'static str {
    match entity_type {
        "group" => "groups",
        "pool" => "pools list",
        _ => "hosts list",
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound { name },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(err) => Self::Io(err),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_stable_exit_codes() {
        let cases = [
            (
                CoreError::AuthenticationFailed {
                    message: "bad password".into(),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::NotFound {
                    entity_type: "host",
                    identifier: "7".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (CoreError::Disconnected, exit_code::CONNECTION),
            (CoreError::Timeout { timeout_secs: 30 }, exit_code::TIMEOUT),
            (
                CoreError::InvalidState {
                    message: "group is not empty".into(),
                },
                exit_code::GENERAL,
            ),
        ];
        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn missing_header_is_a_usage_error() {
        let err = CliError::from(CoreError::Import(ImportError::MissingHeader));
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn unknown_profile_keeps_its_name() {
        let err = CliError::from(ConfigError::UnknownProfile { name: "lab".into() });
        assert!(matches!(err, CliError::ProfileNotFound { ref name } if name == "lab"));
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
    }

    #[test]
    fn partial_failures_exit_nine() {
        let err = CliError::PartialFailure {
            failed: 1,
            total: 3,
        };
        assert_eq!(err.exit_code(), exit_code::PARTIAL);
        assert_eq!(err.to_string(), "1 of 3 rows failed");
    }
}

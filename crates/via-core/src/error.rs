// ── Core error types ──
//
// User-facing errors from via-core. Consumers never see raw HTTP bodies
// or JSON parse failures; `From<via_api::Error>` translates transport
// errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to provisioning server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Console is not connected")]
    Disconnected,

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A backend record could not be turned into a domain value
    /// (e.g. an undecodable kickstart).
    #[error("Invalid {entity_type} {identifier}: {message}")]
    Conversion {
        entity_type: &'static str,
        identifier: String,
        message: String,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Rejected by server: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    /// The operation is not allowed in the current local state.
    #[error("{message}")]
    InvalidState { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── CSV import ───────────────────────────────────────────────────
    #[error(transparent)]
    Import(#[from] ImportError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            identifier: id.to_string(),
        }
    }
}

/// Structural problems with a CSV payload. Row-level problems are not
/// errors; they are reported as diagnostics next to the parsed rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("CSV input has no header line")]
    MissingHeader,

    #[error("Unknown column '{name}' (expected one of: {expected})")]
    UnknownColumn { name: String, expected: String },

    #[error("Column '{name}' appears more than once")]
    DuplicateColumn { name: String },

    #[error("Required column '{name}' is missing")]
    MissingColumn { name: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<via_api::Error> for CoreError {
    fn from(err: via_api::Error) -> Self {
        match err {
            via_api::Error::Authentication { message } => CoreError::AuthenticationFailed { message },
            via_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            via_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e.url().map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            via_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            via_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            via_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            via_api::Error::Api { status: 404, message } => CoreError::NotFound {
                entity_type: "resource",
                identifier: message,
            },
            via_api::Error::Api { status, message } if (400..500).contains(&status) => {
                CoreError::Rejected { message }
            }
            via_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            via_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            via_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            via_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

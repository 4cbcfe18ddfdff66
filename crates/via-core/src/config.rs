// ── Runtime connection configuration ──
//
// These types describe how to reach a go-via server and how the console
// behaves once connected. They carry credentials and tuning but never
// touch disk; via-config builds a `ConsoleConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::progress::MergePolicy;

/// Default port for out-of-band management controllers (HTTPS).
pub const DEFAULT_ILO_PORT: u16 = 443;

/// How to authenticate with the server.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Session login with username and password.
    Credentials {
        username: String,
        password: SecretString,
    },
    /// Skip login (servers run without authentication).
    Anonymous,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. go-via generates a self-signed certificate on
    /// first start, so this is the default.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for one console session against one server.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Server URL, e.g. `https://via.lab.local:8443`.
    pub url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Subscribe to the progress stream after connecting.
    pub progress_enabled: bool,
    /// Progress stream endpoint. `None` derives `{ws|wss}://host/v1/log`
    /// from `url`.
    pub progress_url: Option<Url>,
    /// Initial / maximum reconnect delay for the progress stream.
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    /// How progress events are merged into the progress store.
    pub merge_policy: MergePolicy,
    /// Management controller port checked by the wizard.
    pub ilo_port: u16,
    /// Per-candidate timeout for wizard reachability checks.
    pub validation_timeout: Duration,
    /// Reachability checks in flight at once. 1 = strictly sequential.
    pub validation_concurrency: usize,
    /// Create requests in flight at once during CSV import / commit.
    pub import_concurrency: usize,
}

impl ConsoleConfig {
    /// A config for `url` with every other setting at its default.
    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            progress_enabled: true,
            progress_url: None,
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            merge_policy: MergePolicy::default(),
            ilo_port: DEFAULT_ILO_PORT,
            validation_timeout: Duration::from_secs(10),
            validation_concurrency: 1,
            import_concurrency: 4,
        }
    }
}

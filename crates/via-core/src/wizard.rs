// ── Provisioning wizard ──
//
// Onboarding session for new hosts: collect candidates (by hand or from
// CSV), check each management controller is reachable, then commit the
// candidates as host records. The session is a plain state machine; the
// reachability check is behind `IlomProbe` so it can run against the
// console or a test double.

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::Command;
use crate::config::{ConsoleConfig, DEFAULT_ILO_PORT};
use crate::console::Console;
use crate::error::CoreError;
use crate::import::{self, CsvSchema, HostTarget, ImportReport, PendingRow, RowDiagnostic};

// ── Types ────────────────────────────────────────────────────────

/// Hardware vendor of the candidates' management controllers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Vendor {
    Hpe,
    Dell,
    Lenovo,
    Supermicro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WizardState {
    Configuring,
    Validating,
    Error,
    Ready,
    Committed,
    Canceled,
}

/// A machine to onboard, addressed by its management controller.
#[derive(Debug, Clone)]
pub struct WizardCandidate {
    pub ilo_ip_addr: String,
    pub username: String,
    pub password: SecretString,
    pub validated: bool,
    pub fqdn: Option<String>,
    pub ip: Option<String>,
    pub mac: Option<String>,
}

impl WizardCandidate {
    pub fn new(
        ilo_ip_addr: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            ilo_ip_addr: ilo_ip_addr.into(),
            username: username.into(),
            password,
            validated: false,
            fqdn: None,
            ip: None,
            mac: None,
        }
    }

    /// Attach the host identity used when the candidate is committed.
    pub fn with_host(
        mut self,
        fqdn: impl Into<String>,
        ip: impl Into<String>,
        mac: impl Into<String>,
    ) -> Self {
        self.fqdn = Some(fqdn.into());
        self.ip = Some(ip.into());
        self.mac = Some(mac.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationKind {
    /// The server answered with an error for this controller.
    Rejected,
    /// The controller did not answer on the configured port.
    Unreachable,
    /// No answer within the validation timeout.
    TimedOut,
    /// The session is missing something needed before any check.
    Precondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Controller address, or the name of the missing setting.
    pub subject: String,
    pub message: String,
    pub kind: ValidationKind,
    /// Position of the failing candidate; `None` for preconditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<usize>,
}

// ── Probe ────────────────────────────────────────────────────────

/// Answer to a single reachability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Rejected(String),
    Unreachable(String),
}

/// Reachability check for a management controller.
pub trait IlomProbe: Sync {
    fn check<'a>(&'a self, ip: &'a str, port: u16) -> BoxFuture<'a, ProbeOutcome>;
}

impl IlomProbe for Console {
    fn check<'a>(&'a self, ip: &'a str, port: u16) -> BoxFuture<'a, ProbeOutcome> {
        Box::pin(async move {
            let client = match self.client().await {
                Ok(c) => c,
                Err(e) => return ProbeOutcome::Unreachable(e.to_string()),
            };
            match client.check_ilom(ip, port).await {
                Ok(resp) => match resp.rejection() {
                    Some(reason) => ProbeOutcome::Rejected(reason.to_owned()),
                    None => ProbeOutcome::Reachable,
                },
                Err(via_api::Error::Api {
                    status: 503,
                    message,
                }) => ProbeOutcome::Unreachable(message),
                Err(via_api::Error::Api { message, .. }) => ProbeOutcome::Rejected(message),
                Err(e) => ProbeOutcome::Unreachable(e.to_string()),
            }
        })
    }
}

// ── Session ──────────────────────────────────────────────────────

/// One onboarding session.
#[derive(Debug)]
pub struct WizardSession {
    state: WizardState,
    candidates: Vec<WizardCandidate>,
    draft: Option<WizardCandidate>,
    errors: Vec<ValidationError>,
    vendor: Option<Vendor>,
    ilo_port: u16,
    default_ilo_port: u16,
    validation_timeout: Duration,
    concurrency: usize,
}

impl WizardSession {
    pub fn new(validation_timeout: Duration, concurrency: usize) -> Self {
        Self {
            state: WizardState::Configuring,
            candidates: Vec::new(),
            draft: None,
            errors: Vec::new(),
            vendor: None,
            ilo_port: DEFAULT_ILO_PORT,
            default_ilo_port: DEFAULT_ILO_PORT,
            validation_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// A session using the console's port, timeout and concurrency settings.
    pub fn from_config(config: &ConsoleConfig) -> Self {
        let mut session = Self::new(config.validation_timeout, config.validation_concurrency);
        session.ilo_port = config.ilo_port;
        session.default_ilo_port = config.ilo_port;
        session
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn candidates(&self) -> &[WizardCandidate] {
        &self.candidates
    }

    /// The candidate pulled back for editing, if any.
    pub fn draft(&self) -> Option<&WizardCandidate> {
        self.draft.as_ref()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn vendor(&self) -> Option<Vendor> {
        self.vendor
    }

    pub fn ilo_port(&self) -> u16 {
        self.ilo_port
    }

    // ── Configuring ──────────────────────────────────────────────

    pub fn add_candidate(&mut self, candidate: WizardCandidate) -> Result<(), CoreError> {
        self.begin_edit()?;
        self.draft = None;
        self.candidates.push(candidate);
        Ok(())
    }

    /// Pull a candidate back into the draft, removing it from the list.
    pub fn edit_candidate(&mut self, index: usize) -> Result<&WizardCandidate, CoreError> {
        self.begin_edit()?;
        let candidate = self.take(index)?;
        Ok(self.draft.insert(candidate))
    }

    pub fn remove_candidate(&mut self, index: usize) -> Result<WizardCandidate, CoreError> {
        self.begin_edit()?;
        self.take(index)
    }

    /// Append candidates from a CSV payload. Returns the rows that were
    /// not accepted.
    pub fn import_csv(&mut self, text: &str) -> Result<Vec<RowDiagnostic>, CoreError> {
        self.begin_edit()?;
        let parsed = import::parse(text, &CsvSchema::CANDIDATES)?;

        for row in &parsed.rows {
            let field = |name: &str| row.text(name).map(str::to_owned);
            self.candidates.push(WizardCandidate {
                ilo_ip_addr: field("iloIpAddr").unwrap_or_default(),
                username: field("username").unwrap_or_default(),
                password: SecretString::from(field("password").unwrap_or_default()),
                validated: false,
                fqdn: field("fqdn"),
                ip: field("ip"),
                mac: field("mac"),
            });
        }

        debug!(
            imported = parsed.rows.len(),
            skipped = parsed.skipped.len(),
            "candidates imported"
        );
        Ok(parsed.skipped)
    }

    pub fn set_vendor(&mut self, vendor: Vendor) -> Result<(), CoreError> {
        self.begin_edit()?;
        self.vendor = Some(vendor);
        Ok(())
    }

    pub fn set_ilo_port(&mut self, port: u16) -> Result<(), CoreError> {
        self.begin_edit()?;
        self.ilo_port = port;
        Ok(())
    }

    // ── Validation ───────────────────────────────────────────────

    /// Check every candidate's controller, in input order, and move to
    /// `Ready` or `Error`.
    pub async fn validate<P: IlomProbe>(&mut self, probe: &P) -> Result<WizardState, CoreError> {
        if !matches!(
            self.state,
            WizardState::Configuring | WizardState::Error | WizardState::Ready
        ) {
            return Err(self.invalid("validate"));
        }

        self.state = WizardState::Validating;
        self.errors.clear();
        for candidate in &mut self.candidates {
            candidate.validated = false;
        }

        if self.vendor.is_none() {
            self.errors.push(ValidationError {
                subject: "Vendor".into(),
                message: "Please select a vendor before proceeding.".into(),
                kind: ValidationKind::Precondition,
                candidate: None,
            });
        }
        if self.candidates.is_empty() {
            self.errors.push(ValidationError {
                subject: "Hosts".into(),
                message: "Add at least one host before proceeding.".into(),
                kind: ValidationKind::Precondition,
                candidate: None,
            });
        }
        if !self.errors.is_empty() {
            self.state = WizardState::Error;
            return Ok(self.state);
        }

        let port = self.ilo_port;
        let limit = self.validation_timeout;
        let addresses: Vec<String> = self
            .candidates
            .iter()
            .map(|c| c.ilo_ip_addr.clone())
            .collect();

        let outcomes: Vec<Option<ProbeOutcome>> = stream::iter(addresses)
            .map(|ip| async move {
                debug!(ip = %ip, port, "validating controller");
                tokio::time::timeout(limit, probe.check(&ip, port)).await.ok()
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (index, (candidate, outcome)) in self.candidates.iter_mut().zip(outcomes).enumerate() {
            let failure = match outcome {
                Some(ProbeOutcome::Reachable) => None,
                Some(ProbeOutcome::Rejected(message)) => Some((ValidationKind::Rejected, message)),
                Some(ProbeOutcome::Unreachable(message)) => {
                    Some((ValidationKind::Unreachable, message))
                }
                None => Some((ValidationKind::TimedOut, format!("no answer within {limit:?}"))),
            };
            match failure {
                None => candidate.validated = true,
                Some((kind, message)) => self.errors.push(ValidationError {
                    subject: candidate.ilo_ip_addr.clone(),
                    message,
                    kind,
                    candidate: Some(index),
                }),
            }
        }

        self.state = if self.errors.is_empty() {
            WizardState::Ready
        } else {
            WizardState::Error
        };
        info!(
            candidates = self.candidates.len(),
            errors = self.errors.len(),
            state = %self.state,
            "validation finished"
        );
        Ok(self.state)
    }

    /// Leave the error step to fix the candidates.
    pub fn acknowledge_errors(&mut self) -> Result<(), CoreError> {
        if self.state != WizardState::Error {
            return Err(self.invalid("acknowledge errors"));
        }
        self.state = WizardState::Configuring;
        Ok(())
    }

    // ── Commit / cancel ──────────────────────────────────────────

    /// Create a host for every validated candidate. Only accepted in
    /// `Ready`; the session is cleared and moves to `Committed` whatever
    /// the per-host outcome.
    pub async fn commit(
        &mut self,
        console: &Console,
        target: HostTarget,
    ) -> Result<ImportReport, CoreError> {
        if self.state != WizardState::Ready || !self.errors.is_empty() {
            return Err(self.invalid("commit"));
        }

        let pending = self
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| PendingRow {
                line: i + 1,
                subject: c.ilo_ip_addr.clone(),
                command: import::host_request(
                    c.fqdn.as_deref(),
                    c.ip.as_deref(),
                    c.mac.as_deref(),
                    None,
                    target,
                )
                .map(Command::CreateHost),
            })
            .collect();

        let report = import::submit_rows(console, pending).await;
        info!(
            created = report.created.len(),
            failed = report.failures.len(),
            "wizard committed"
        );

        self.clear();
        self.state = WizardState::Committed;
        Ok(report)
    }

    /// Abandon the session. Hosts already committed are untouched.
    pub fn cancel(&mut self) {
        self.clear();
        self.state = WizardState::Canceled;
    }

    /// Start over with a fresh session.
    pub fn reset(&mut self) {
        self.clear();
        self.state = WizardState::Configuring;
    }

    // ── Internals ────────────────────────────────────────────────

    fn clear(&mut self) {
        self.candidates.clear();
        self.draft = None;
        self.errors.clear();
        self.vendor = None;
        self.ilo_port = self.default_ilo_port;
    }

    /// Edits are allowed while configuring and drop back out of `Error`
    /// or `Ready`, since earlier validation no longer applies.
    fn begin_edit(&mut self) -> Result<(), CoreError> {
        match self.state {
            WizardState::Configuring => Ok(()),
            WizardState::Error | WizardState::Ready => {
                self.state = WizardState::Configuring;
                Ok(())
            }
            _ => Err(self.invalid("edit candidates")),
        }
    }

    fn take(&mut self, index: usize) -> Result<WizardCandidate, CoreError> {
        if index >= self.candidates.len() {
            return Err(CoreError::InvalidState {
                message: format!("no candidate at position {index}"),
            });
        }
        Ok(self.candidates.remove(index))
    }

    fn invalid(&self, action: &str) -> CoreError {
        CoreError::InvalidState {
            message: format!("cannot {action} while the wizard is {}", self.state),
        }
    }
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Scripted probe. Unknown addresses hang until the timeout fires.
    #[derive(Default)]
    struct FakeProbe {
        answers: HashMap<String, ProbeOutcome>,
        calls: Mutex<Vec<(String, u16)>>,
    }

    impl FakeProbe {
        fn with(mut self, ip: &str, outcome: ProbeOutcome) -> Self {
            self.answers.insert(ip.into(), outcome);
            self
        }
    }

    impl IlomProbe for FakeProbe {
        fn check<'a>(&'a self, ip: &'a str, port: u16) -> BoxFuture<'a, ProbeOutcome> {
            self.calls.lock().unwrap().push((ip.to_owned(), port));
            Box::pin(async move {
                match self.answers.get(ip) {
                    Some(outcome) => outcome.clone(),
                    None => std::future::pending().await,
                }
            })
        }
    }

    fn candidate(ip: &str) -> WizardCandidate {
        WizardCandidate::new(ip, "Administrator", SecretString::from("secret"))
    }

    #[tokio::test]
    async fn missing_vendor_fails_without_probing() {
        let probe = FakeProbe::default().with("10.9.0.5", ProbeOutcome::Reachable);
        let mut wizard = WizardSession::default();
        wizard.add_candidate(candidate("10.9.0.5")).unwrap();

        let state = wizard.validate(&probe).await.unwrap();

        assert_eq!(state, WizardState::Error);
        assert_eq!(wizard.errors()[0].subject, "Vendor");
        assert_eq!(wizard.errors()[0].kind, ValidationKind::Precondition);
        assert!(probe.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn errors_follow_input_order_and_keep_kinds() {
        let probe = FakeProbe::default()
            .with("10.9.0.1", ProbeOutcome::Reachable)
            .with(
                "10.9.0.2",
                ProbeOutcome::Unreachable("IP 10.9.0.2 is not reachable at port 623".into()),
            )
            .with("10.9.0.4", ProbeOutcome::Rejected("invalid address".into()));
        let mut wizard = WizardSession::new(Duration::from_secs(5), 1);
        wizard.set_vendor(Vendor::Dell).unwrap();
        wizard.set_ilo_port(623).unwrap();
        for ip in ["10.9.0.1", "10.9.0.2", "10.9.0.3", "10.9.0.4"] {
            wizard.add_candidate(candidate(ip)).unwrap();
        }

        let state = wizard.validate(&probe).await.unwrap();

        assert_eq!(state, WizardState::Error);
        let summary: Vec<_> = wizard
            .errors()
            .iter()
            .map(|e| (e.subject.as_str(), e.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("10.9.0.2", ValidationKind::Unreachable),
                ("10.9.0.3", ValidationKind::TimedOut),
                ("10.9.0.4", ValidationKind::Rejected),
            ]
        );
        assert!(wizard.candidates()[0].validated);
        assert!(!wizard.candidates()[1].validated);
        assert!(probe.calls.lock().unwrap().iter().all(|(_, port)| *port == 623));
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_timeout_is_reported_precisely() {
        let mut wizard = WizardSession::new(Duration::from_millis(250), 1);
        wizard.set_vendor(Vendor::Dell).unwrap();
        wizard.add_candidate(candidate("10.9.0.7")).unwrap();

        wizard.validate(&FakeProbe::default()).await.unwrap();

        assert_eq!(wizard.errors()[0].kind, ValidationKind::TimedOut);
        assert_eq!(wizard.errors()[0].message, "no answer within 250ms");
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_addresses_keep_their_own_errors() {
        let probe = FakeProbe::default().with("10.9.0.8", ProbeOutcome::Reachable);
        let mut wizard = WizardSession::new(Duration::from_secs(1), 2);
        wizard.set_vendor(Vendor::Hpe).unwrap();
        wizard.add_candidate(candidate("10.9.0.9")).unwrap();
        wizard.add_candidate(candidate("10.9.0.8")).unwrap();
        wizard.add_candidate(candidate("10.9.0.9")).unwrap();

        wizard.validate(&probe).await.unwrap();

        let positions: Vec<_> = wizard.errors().iter().map(|e| e.candidate).collect();
        assert_eq!(positions, vec![Some(0), Some(2)]);
    }

    #[tokio::test]
    async fn clean_validation_is_ready_and_edit_goes_back_to_configuring() {
        let probe = FakeProbe::default().with("10.9.0.1", ProbeOutcome::Reachable);
        let mut wizard = WizardSession::default();
        wizard.set_vendor(Vendor::Hpe).unwrap();
        wizard.add_candidate(candidate("10.9.0.1")).unwrap();

        assert_eq!(wizard.validate(&probe).await.unwrap(), WizardState::Ready);
        assert!(wizard.errors().is_empty());

        let draft = wizard.edit_candidate(0).unwrap();
        assert_eq!(draft.ilo_ip_addr, "10.9.0.1");
        assert_eq!(wizard.state(), WizardState::Configuring);
        assert!(wizard.candidates().is_empty());
    }

    #[tokio::test]
    async fn acknowledge_returns_to_configuring() {
        let mut wizard = WizardSession::default();
        wizard.validate(&FakeProbe::default()).await.unwrap();
        assert_eq!(wizard.state(), WizardState::Error);

        wizard.acknowledge_errors().unwrap();
        assert_eq!(wizard.state(), WizardState::Configuring);
        assert!(wizard.acknowledge_errors().is_err());
    }

    #[test]
    fn cancel_resets_everything() {
        let mut wizard = WizardSession::default();
        wizard.set_vendor(Vendor::Lenovo).unwrap();
        wizard.set_ilo_port(8443).unwrap();
        wizard.add_candidate(candidate("10.9.0.1")).unwrap();
        wizard.add_candidate(candidate("10.9.0.2")).unwrap();
        wizard.edit_candidate(1).unwrap();

        wizard.cancel();

        assert_eq!(wizard.state(), WizardState::Canceled);
        assert!(wizard.candidates().is_empty());
        assert!(wizard.draft().is_none());
        assert!(wizard.errors().is_empty());
        assert_eq!(wizard.vendor(), None);
        assert_eq!(wizard.ilo_port(), 443);
        assert!(wizard.add_candidate(candidate("10.9.0.3")).is_err());

        wizard.reset();
        assert_eq!(wizard.state(), WizardState::Configuring);
    }

    #[test]
    fn candidates_import_from_csv() {
        let mut wizard = WizardSession::default();
        let skipped = wizard
            .import_csv(
                "iloIpAddr,username,password,fqdn,ip,mac\n\
                 10.9.0.1,admin,pw1,esx01.lab.local,10.0.0.11,aa:bb:cc:00:00:01\n\
                 10.9.0.2,admin\n\
                 10.9.0.3,admin,pw3,,,\n",
            )
            .unwrap();

        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].line, 3);
        assert_eq!(wizard.candidates().len(), 2);
        assert_eq!(wizard.candidates()[0].fqdn.as_deref(), Some("esx01.lab.local"));
        assert_eq!(wizard.candidates()[1].fqdn, None);
    }

    #[test]
    fn vendor_parses_case_insensitively() {
        assert_eq!("HPE".parse::<Vendor>().unwrap(), Vendor::Hpe);
        assert_eq!(Vendor::Supermicro.to_string(), "supermicro");
    }
}

//! Progress event stream with auto-reconnect.
//!
//! The backend mirrors its structured log over a WebSocket at `/v1/log`.
//! Entries whose `msg` is `"progress"` carry reimage job progress for one
//! host; everything else is ordinary log traffic and is skipped. Parsed
//! events are published through a [`tokio::sync::broadcast`] channel and
//! the connection is re-established with exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use via_api::progress::{ProgressStream, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = Url::parse("wss://via.lab.local:8443/v1/log")?;
//!
//! let stream = ProgressStream::connect(ws_url, ReconnectConfig::default(), cancel.clone(), None, true)?;
//! let mut rx = stream.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("host {}: {}% {}", event.host_id, event.percentage, event.progresstext);
//! }
//!
//! stream.shutdown();
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use url::Url;

use crate::error::Error;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Status text the backend sends when a host finished installing.
pub const COMPLETED: &str = "completed";

// ── ProgressEvent ────────────────────────────────────────────────────

/// One progress update for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Host id (the backend's address id).
    #[serde(rename = "id")]
    pub host_id: i64,

    /// Completion percentage, clamped to `0..=100`.
    pub percentage: u8,

    /// Phase label, e.g. `"mboot.efi"`, `"kickstart"`, `"completed"`.
    #[serde(default)]
    pub progresstext: String,
}

impl ProgressEvent {
    /// Whether this event marks the end of the job.
    pub fn is_completed(&self) -> bool {
        self.progresstext == COMPLETED
    }
}

/// Boxed stream of progress events, as returned by [`ProgressStream::events`].
pub type ProgressEvents = Pin<Box<dyn Stream<Item = Arc<ProgressEvent>> + Send>>;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── ProgressStream ───────────────────────────────────────────────────

/// Handle to a running progress subscription.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct ProgressStream {
    event_tx: broadcast::Sender<Arc<ProgressEvent>>,
    cancel: CancellationToken,
}

impl ProgressStream {
    /// Spawn the connect/read/reconnect loop for `ws_url`.
    ///
    /// Returns as soon as the task is spawned; the first connection
    /// attempt happens in the background. `cookie` is sent as the
    /// `Cookie` header of the upgrade request. With `insecure`, `wss://`
    /// connections accept the backend's self-signed certificate.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        cookie: Option<String>,
        insecure: bool,
    ) -> Result<Self, Error> {
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme for progress stream: {}",
                ws_url.scheme()
            )));
        }

        let connector = if insecure && ws_url.scheme() == "wss" {
            Some(insecure_connector()?)
        } else {
            None
        };

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_tx = event_tx.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let target = Target {
                url: ws_url,
                cookie,
                connector,
            };
            ws_loop(target, task_tx, reconnect, task_cancel).await;
        });

        Ok(Self { event_tx, cancel })
    }

    /// A new broadcast receiver. Slow consumers see
    /// [`broadcast::error::RecvError::Lagged`] and may continue.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.event_tx.subscribe()
    }

    /// Events as a `Stream`. Lag is logged and skipped; the stream ends
    /// once every sender (this handle and the background task) is gone.
    pub fn events(&self) -> ProgressEvents {
        let mut rx = self.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "progress subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the stream has been shut down.
    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Everything needed to (re)open the connection.
struct Target {
    url: Url,
    cookie: Option<String>,
    connector: Option<Connector>,
}

async fn ws_loop(
    target: Target,
    event_tx: broadcast::Sender<Arc<ProgressEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&target, &event_tx, &cancel) => result,
        };

        match result {
            // Server closed or stream ended: reset backoff, pause for
            // `initial_delay`.
            Ok(()) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::info!(
                    delay_ms = u64::try_from(reconnect.initial_delay.as_millis()).unwrap_or(u64::MAX),
                    "progress stream disconnected cleanly, reconnecting"
                );
                attempt = 0;

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(reconnect.initial_delay) => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "progress stream error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "progress stream reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    tracing::debug!("progress stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

async fn connect_and_read(
    target: &Target,
    event_tx: &broadcast::Sender<Arc<ProgressEvent>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %target.url, "connecting to progress stream");

    let uri: tungstenite::http::Uri = target
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(ref cookie_val) = target.cookie {
        request = request.with_header("Cookie", cookie_val);
    }

    let (ws_stream, _response) =
        tokio_tungstenite::connect_async_tls_with_config(request, None, false, target.connector.clone())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("progress stream connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, event_tx);
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "progress stream closed by server");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => return Ok(()),
                    // Ping is answered by tungstenite; binary frames are not used.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

// ── TLS ──────────────────────────────────────────────────────────────

/// A rustls connector that skips certificate verification but still
/// checks handshake signatures.
fn insecure_connector() -> Result<Connector, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
        .with_no_client_auth();
    Ok(Connector::Rustls(Arc::new(config)))
}

#[derive(Debug)]
struct AcceptAnyCert(Arc<rustls::crypto::CryptoProvider>);

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// A log entry as the backend serialises it. Only the fields we need.
#[derive(Debug, Deserialize)]
struct LogEntry {
    #[serde(default)]
    msg: String,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    percentage: Option<serde_json::Value>,
    #[serde(default)]
    progresstext: Option<String>,
}

/// Parse one text frame into a progress event, if it is one.
pub fn parse_progress(text: &str) -> Option<ProgressEvent> {
    let entry: LogEntry = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring non-JSON log frame");
            return None;
        }
    };

    if entry.msg != "progress" {
        return None;
    }

    let Some(host_id) = entry.id.as_ref().and_then(as_i64) else {
        tracing::debug!("progress entry without numeric id");
        return None;
    };

    let percentage = entry
        .percentage
        .as_ref()
        .and_then(as_i64)
        .map_or(0, clamp_percentage);

    Some(ProgressEvent {
        host_id,
        percentage,
        progresstext: entry.progresstext.unwrap_or_default(),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Clamp any integer into a `0..=100` percentage.
pub fn clamp_percentage(value: i64) -> u8 {
    u8::try_from(value.clamp(0, 100)).unwrap_or(100)
}

fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<ProgressEvent>>) {
    if let Some(event) = parse_progress(text) {
        tracing::trace!(host_id = event.host_id, percentage = event.percentage, "progress event");
        // No subscribers right now is fine.
        let _ = event_tx.send(Arc::new(event));
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exp = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

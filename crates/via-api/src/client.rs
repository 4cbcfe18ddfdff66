// Provisioning backend HTTP client
//
// Wraps `reqwest::Client` with `/v1` URL construction and error envelope
// flattening. Endpoint groups (hosts, groups, pools, images, ilom, auth)
// are implemented as inherent methods in separate files to keep this
// module focused on transport mechanics.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::ErrorBody;
use crate::transport::TransportConfig;

/// Raw HTTP client for the go-via backend.
///
/// Every method returns the decoded JSON payload; non-2xx responses are
/// turned into [`Error::Api`] with the backend's message extracted from
/// whichever error shape it used.
pub struct ViaClient {
    http: reqwest::Client,
    base_url: Url,
    cookie_jar: Option<Arc<Jar>>,
}

impl ViaClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (the backend authenticates with a session cookie).
    /// `base_url` is the backend root, e.g. `https://via.lab.local:8443`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            cookie_jar: config.cookie_jar,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// No cookie jar is tracked, so [`cookie_header`](Self::cookie_header)
    /// returns `None`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            cookie_jar: None,
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Current session cookie as a `Cookie:` header value, for the
    /// progress WebSocket handshake.
    pub fn cookie_header(&self) -> Option<String> {
        let jar = self.cookie_jar.as_ref()?;
        let value = jar.cookies(&self.base_url)?;
        value.to_str().ok().map(str::to_owned)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/v1/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/v1/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    /// The progress stream endpoint: `{ws|wss}://{host}/v1/log`.
    pub fn websocket_url(&self) -> Result<Url, Error> {
        let mut url = self.api_url("log")?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive ws url from {url}")))?;
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        self.parse_response(resp).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        self.parse_response(resp).await
    }

    pub(crate) async fn patch<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("PATCH {}", url);

        let resp = self
            .http
            .patch(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        self.parse_response(resp).await
    }

    /// DELETE, discarding whatever body the backend sends back.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);

        let resp = self.http.delete(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.map_err(Error::Transport)?;
        Err(status_error(status, &body))
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Map a non-2xx response to an error, pulling the message out of the
/// backend's error envelope when there is one.
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> Error {
    let message = extract_error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_owned()
    });

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Error::Authentication { message };
    }

    Error::Api {
        status: status.as_u16(),
        message,
    }
}

/// Extract a human-readable message from any backend error body.
pub fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message())
}

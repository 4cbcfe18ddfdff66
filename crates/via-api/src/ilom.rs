// Out-of-band management reachability check
//
// The backend dials `{ip}:{port}` over TCP on our behalf. A 200 means the
// controller answered; a 503 means it did not. Some deployments answer
// 200 with an `{error}` body for rejected input, so both fields are kept.

use serde::Deserialize;
use tracing::debug;

use crate::client::ViaClient;
use crate::error::Error;
use crate::models::IlomCheckRequest;

/// Successful (2xx) answer from `POST /v1/checkilo`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IlomCheckResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl IlomCheckResponse {
    /// The rejection message, if the backend flagged one.
    pub fn rejection(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

impl ViaClient {
    /// Check that a management controller is reachable.
    ///
    /// `POST /v1/checkilo` with `{"iloIpAddr": ip, "port": "443"}`.
    /// Unreachable controllers come back as [`Error::Api`] with status 503.
    pub async fn check_ilom(&self, ip: &str, port: u16) -> Result<IlomCheckResponse, Error> {
        let url = self.api_url("checkilo")?;
        debug!(ip, port, "checking management controller");
        let body = IlomCheckRequest {
            ilo_ip_addr: ip.to_owned(),
            port: port.to_string(),
        };
        self.post(url, &body).await
    }
}

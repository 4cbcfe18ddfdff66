// Session login
//
// The backend issues a session cookie on `POST /v1/login`; the client's
// cookie jar carries it on every later request and into the progress
// WebSocket handshake.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::ViaClient;
use crate::error::Error;
use crate::models::LoginRequest;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    message: String,
}

impl ViaClient {
    /// Authenticate with username/password.
    ///
    /// `POST /v1/login`. A 401 is reported as [`Error::Authentication`]
    /// carrying the backend's message.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.api_url("login")?;
        debug!(username, "logging in");

        let body = LoginRequest {
            username,
            password: password.expose_secret(),
        };
        let resp: LoginResponse = self.post(url, &body).await?;
        info!(username, message = %resp.message, "login succeeded");
        Ok(())
    }
}

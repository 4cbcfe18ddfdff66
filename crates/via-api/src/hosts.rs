// Host endpoints
//
// The backend calls hosts "addresses". Reimage start/cancel has no
// dedicated route: it is a partial update of the `reimage` flag.

use serde_json::json;
use tracing::debug;

use crate::client::ViaClient;
use crate::error::Error;
use crate::models::{HostForm, HostRecord};

impl ViaClient {
    /// `GET /v1/addresses`
    pub async fn list_hosts(&self) -> Result<Vec<HostRecord>, Error> {
        let url = self.api_url("addresses")?;
        debug!("listing hosts");
        self.get(url).await
    }

    /// `GET /v1/addresses/{id}`
    pub async fn get_host(&self, id: i64) -> Result<HostRecord, Error> {
        let url = self.api_url(&format!("addresses/{id}"))?;
        self.get(url).await
    }

    /// `POST /v1/addresses`
    pub async fn create_host(&self, form: &HostForm) -> Result<HostRecord, Error> {
        let url = self.api_url("addresses")?;
        debug!(hostname = %form.hostname, ip = %form.ip, "creating host");
        self.post(url, form).await
    }

    /// `DELETE /v1/addresses/{id}`
    pub async fn delete_host(&self, id: i64) -> Result<(), Error> {
        let url = self.api_url(&format!("addresses/{id}"))?;
        debug!(host_id = id, "deleting host");
        self.delete(url).await
    }

    /// Flag a host for reimage on its next PXE boot.
    ///
    /// `PATCH /v1/addresses/{id}` with `{"reimage": true}`
    pub async fn start_reimage(&self, id: i64) -> Result<HostRecord, Error> {
        self.set_reimage(id, true).await
    }

    /// Clear the reimage flag.
    ///
    /// `PATCH /v1/addresses/{id}` with `{"reimage": false}`
    pub async fn cancel_reimage(&self, id: i64) -> Result<HostRecord, Error> {
        self.set_reimage(id, false).await
    }

    async fn set_reimage(&self, id: i64, reimage: bool) -> Result<HostRecord, Error> {
        let url = self.api_url(&format!("addresses/{id}"))?;
        debug!(host_id = id, reimage, "setting reimage flag");
        self.patch(url, &json!({ "reimage": reimage })).await
    }
}

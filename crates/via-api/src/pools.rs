// DHCP pool endpoints

use tracing::debug;

use crate::client::ViaClient;
use crate::error::Error;
use crate::models::{PoolForm, PoolRecord};

impl ViaClient {
    /// `GET /v1/pools`
    pub async fn list_pools(&self) -> Result<Vec<PoolRecord>, Error> {
        let url = self.api_url("pools")?;
        debug!("listing pools");
        self.get(url).await
    }

    /// `POST /v1/pools`
    pub async fn create_pool(&self, form: &PoolForm) -> Result<PoolRecord, Error> {
        let url = self.api_url("pools")?;
        debug!(name = %form.name, net = %form.net_address, "creating pool");
        self.post(url, form).await
    }
}

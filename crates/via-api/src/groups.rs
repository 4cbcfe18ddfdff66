// Group endpoints

use tracing::debug;

use crate::client::ViaClient;
use crate::error::Error;
use crate::models::GroupRecord;

impl ViaClient {
    /// `GET /v1/groups`
    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, Error> {
        let url = self.api_url("groups")?;
        debug!("listing groups");
        self.get(url).await
    }

    /// `DELETE /v1/groups/{id}`
    pub async fn delete_group(&self, id: i64) -> Result<(), Error> {
        let url = self.api_url(&format!("groups/{id}"))?;
        debug!(group_id = id, "deleting group");
        self.delete(url).await
    }
}

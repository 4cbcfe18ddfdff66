// ── Reimage orchestration ──
//
// Starting or canceling a reimage flips the host's `reimage` flag on the
// server, replaces the host in the entity store with the server's answer
// and seeds the progress store. A "completed" progress event closes the
// loop with a refetch of groups and hosts, queued behind pending writes.

use std::sync::Arc;

use tracing::{info, warn};
use via_api::ViaClient;

use crate::command::Command;
use crate::console::{Console, stored_host};
use crate::convert::convert_all;
use crate::error::CoreError;
use crate::model::{Group, Host, HostId};
use crate::progress::ProgressStore;
use crate::store::EntityStore;

/// Status text recorded when a reimage is started.
pub const REIMAGING: &str = "reimaging";
/// Status text recorded when a reimage is canceled.
pub const REIMAGE_CANCELED: &str = "reimaging canceled";
/// Status text of the final progress event of a job.
pub use via_api::progress::COMPLETED;

impl Console {
    /// Flag a host for reimaging. On success the host's progress is reset
    /// to 0% "reimaging"; on failure nothing local changes.
    pub async fn reimage_host(&self, id: HostId) -> Result<Arc<Host>, CoreError> {
        self.execute(Command::ReimageHost(id))
            .await?
            .into_host()
            .ok_or_else(|| CoreError::Internal("reimage returned no host".into()))
    }

    /// Clear a host's reimage flag. The host stays in the store.
    pub async fn cancel_reimage(&self, id: HostId) -> Result<Arc<Host>, CoreError> {
        self.execute(Command::CancelReimage(id))
            .await?
            .into_host()
            .ok_or_else(|| CoreError::Internal("cancel returned no host".into()))
    }

    /// Hosts currently flagged for reimaging.
    pub fn reimaging_hosts(&self) -> Vec<Arc<Host>> {
        self.hosts_snapshot()
            .iter()
            .filter(|h| h.reimage)
            .cloned()
            .collect()
    }
}

pub(crate) async fn start(
    client: &ViaClient,
    store: &EntityStore,
    progress: &ProgressStore,
    id: HostId,
) -> Result<Arc<Host>, CoreError> {
    let record = client.start_reimage(id.get()).await.map_err(|e| {
        warn!(host_id = id.get(), error = %e, "reimage request failed");
        CoreError::from(e)
    })?;
    let host = stored_host(store, Host::try_from(record)?)?;
    progress.set(id, 0, REIMAGING);
    info!(host_id = id.get(), fqdn = %host.fqdn(), "reimage started");
    Ok(host)
}

pub(crate) async fn cancel(
    client: &ViaClient,
    store: &EntityStore,
    progress: &ProgressStore,
    id: HostId,
) -> Result<Arc<Host>, CoreError> {
    let record = client.cancel_reimage(id.get()).await.map_err(|e| {
        warn!(host_id = id.get(), error = %e, "cancel request failed");
        CoreError::from(e)
    })?;
    let host = stored_host(store, Host::try_from(record)?)?;
    progress.set(id, 0, REIMAGE_CANCELED);
    info!(host_id = id.get(), fqdn = %host.fqdn(), "reimage canceled");
    Ok(host)
}

/// Refetch groups and hosts after a host reported completion, then make
/// sure the completed host no longer carries the reimage flag even if
/// the server has not cleared it yet.
pub(crate) async fn reconcile_completed(
    client: &ViaClient,
    store: &EntityStore,
    id: HostId,
) -> Result<(), CoreError> {
    let (host_records, group_records) =
        tokio::try_join!(client.list_hosts(), client.list_groups())?;

    let (hosts, _) = convert_all::<_, Host>(host_records);
    let (groups, _) = convert_all::<_, Group>(group_records);
    store.apply_hosts_and_groups(hosts, groups);

    if let Some(host) = store.host(id).filter(|h| h.reimage) {
        let mut cleared = Host::clone(&host);
        cleared.reimage = false;
        store.upsert_host(cleared);
    }

    info!(host_id = id.get(), "reimage completed");
    Ok(())
}

// ── Entity store ──
//
// In-memory cache of everything the console knows about the server:
// groups (with their hosts), pools and images. Populated by bulk fetches,
// then kept current by applying each successful create/update/delete
// response. Reads are wait-free snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{Group, GroupId, Host, HostId, Image, ImageId, Pool, PoolId};
use crate::stream::EntityStream;

/// Central reactive store for provisioning entities.
///
/// Hosts are stored flat; each `Group::hosts` is a derived view rebuilt
/// whenever a host or group changes.
pub struct EntityStore {
    pub(crate) hosts: EntityCollection<HostId, Host>,
    pub(crate) groups: EntityCollection<GroupId, Group>,
    pub(crate) pools: EntityCollection<PoolId, Pool>,
    pub(crate) images: EntityCollection<ImageId, Image>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl EntityStore {
    pub fn new() -> Self {
        let (last_full_refresh, _) = watch::channel(None);

        Self {
            hosts: EntityCollection::new(),
            groups: EntityCollection::new(),
            pools: EntityCollection::new(),
            images: EntityCollection::new(),
            last_full_refresh,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn hosts_snapshot(&self) -> Arc<Vec<Arc<Host>>> {
        self.hosts.snapshot()
    }

    pub fn groups_snapshot(&self) -> Arc<Vec<Arc<Group>>> {
        self.groups.snapshot()
    }

    pub fn pools_snapshot(&self) -> Arc<Vec<Arc<Pool>>> {
        self.pools.snapshot()
    }

    pub fn images_snapshot(&self) -> Arc<Vec<Arc<Image>>> {
        self.images.snapshot()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn host(&self, id: HostId) -> Option<Arc<Host>> {
        self.hosts.get(&id)
    }

    pub fn group(&self, id: GroupId) -> Option<Arc<Group>> {
        self.groups.get(&id)
    }

    pub fn pool(&self, id: PoolId) -> Option<Arc<Pool>> {
        self.pools.get(&id)
    }

    pub fn image(&self, id: ImageId) -> Option<Arc<Image>> {
        self.images.get(&id)
    }

    /// Find a host by FQDN (case-insensitive).
    pub fn host_by_fqdn(&self, fqdn: &str) -> Option<Arc<Host>> {
        self.hosts
            .snapshot()
            .iter()
            .find(|h| h.fqdn().eq_ignore_ascii_case(fqdn))
            .cloned()
    }

    /// Find a group by name.
    pub fn group_by_name(&self, name: &str) -> Option<Arc<Group>> {
        self.groups
            .snapshot()
            .iter()
            .find(|g| g.name == name)
            .cloned()
    }

    /// Hosts whose group is unknown or unset.
    pub fn ungrouped_hosts(&self) -> Vec<Arc<Host>> {
        self.hosts
            .snapshot()
            .iter()
            .filter(|h| h.group_id.is_none_or(|gid| self.groups.get(&gid).is_none()))
            .cloned()
            .collect()
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_hosts(&self) -> EntityStream<Host> {
        EntityStream::new(self.hosts.subscribe())
    }

    pub fn subscribe_groups(&self) -> EntityStream<Group> {
        EntityStream::new(self.groups.subscribe())
    }

    // ── Local mutations ──────────────────────────────────────────────
    //
    // Applied by the command router after the server confirmed the
    // change. Never called speculatively.

    pub(crate) fn upsert_host(&self, host: Host) {
        self.hosts.upsert(host.id, host);
        self.rebuild_group_views();
    }

    pub(crate) fn remove_host(&self, id: HostId) -> Option<Arc<Host>> {
        let removed = self.hosts.remove(&id);
        if removed.is_some() {
            self.rebuild_group_views();
        }
        removed
    }

    pub(crate) fn remove_group(&self, id: GroupId) -> Option<Arc<Group>> {
        self.groups.remove(&id)
    }

    pub(crate) fn upsert_pool(&self, pool: Pool) {
        self.pools.upsert(pool.id, pool);
    }

    /// Drop everything (e.g. on disconnect).
    pub fn reset(&self) {
        self.hosts.clear();
        self.groups.clear();
        self.pools.clear();
        self.images.clear();
        self.last_full_refresh.send_replace(None);
    }

    // ── Derived group view ───────────────────────────────────────────

    /// Recompute `hosts` on every group from the flat host list.
    pub(crate) fn rebuild_group_views(&self) {
        let hosts = self.hosts.snapshot();
        let groups = self.groups.snapshot();
        self.groups.replace_all(groups.iter().map(|g| {
            let mut group = Group::clone(g);
            group.hosts = hosts
                .iter()
                .filter(|h| h.group_id == Some(group.id))
                .cloned()
                .collect();
            (group.id, group)
        }));
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

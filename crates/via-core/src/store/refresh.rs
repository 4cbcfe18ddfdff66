// ── Bulk refresh application ──
//
// Applies data fetched from the server into the EntityStore. A full
// refresh replaces every collection; the post-install refetch only
// replaces groups and hosts.

use chrono::Utc;
use tracing::debug;

use super::EntityStore;
use crate::model::{Group, Host, Image, Pool};

impl EntityStore {
    /// Replace all collections with freshly fetched data.
    pub(crate) fn apply_full_refresh(
        &self,
        hosts: Vec<Host>,
        groups: Vec<Group>,
        pools: Vec<Pool>,
        images: Vec<Image>,
    ) {
        self.pools.replace_all(pools.into_iter().map(|p| (p.id, p)));
        self.images.replace_all(images.into_iter().map(|i| (i.id, i)));
        self.apply_hosts_and_groups(hosts, groups);

        self.last_full_refresh.send_replace(Some(Utc::now()));
    }

    /// Replace hosts and groups, then rebuild the group views.
    pub(crate) fn apply_hosts_and_groups(&self, hosts: Vec<Host>, groups: Vec<Group>) {
        self.hosts.replace_all(hosts.into_iter().map(|h| (h.id, h)));
        self.groups.replace_all(groups.into_iter().map(|g| (g.id, g)));
        self.rebuild_group_views();

        debug!(
            hosts = self.hosts.len(),
            groups = self.groups.len(),
            version = self.hosts.version(),
            "hosts and groups replaced"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{
        GroupId, GroupOptions, HostId, ImageId, Kickstart, MacAddress, PoolId,
    };

    fn host(id: i64, group: Option<i64>) -> Host {
        Host {
            id: HostId(id),
            hostname: format!("esx{id:02}"),
            domain: "lab.local".into(),
            ip: format!("10.0.0.{id}"),
            mac: MacAddress::new(format!("aa:bb:cc:dd:ee:{id:02x}")),
            group_id: group.map(GroupId),
            pool_id: Some(PoolId(1)),
            reimage: false,
            kickstart: Kickstart::default(),
            progress: 0,
            progresstext: String::new(),
        }
    }

    fn group(id: i64) -> Group {
        Group {
            id: GroupId(id),
            name: format!("group-{id}"),
            pool_id: PoolId(1),
            image_id: ImageId(1),
            dns: "10.0.0.2".into(),
            ntp: "pool.ntp.org".into(),
            syslog: String::new(),
            vlan: String::new(),
            bootdisk: String::new(),
            callbackurl: String::new(),
            kickstart: Kickstart::default(),
            options: GroupOptions::default(),
            hosts: Vec::new(),
        }
    }

    #[test]
    fn full_refresh_builds_group_views() {
        let store = EntityStore::new();
        store.apply_full_refresh(
            vec![host(1, Some(1)), host(2, Some(1)), host(3, Some(2)), host(4, None)],
            vec![group(1), group(2)],
            Vec::new(),
            vec![Image {
                id: ImageId(1),
                iso_image: "VMware-ESXi-8.0U2.iso".into(),
                path: "tftp/images/1".into(),
                size: 600,
                hash: String::new(),
                description: String::new(),
            }],
        );

        let g1 = store.group(GroupId(1)).unwrap();
        let ids: Vec<_> = g1.hosts.iter().map(|h| h.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.group(GroupId(2)).unwrap().host_count(), 1);
        assert_eq!(store.ungrouped_hosts().len(), 1);
        assert!(store.last_full_refresh().is_some());
        assert_eq!(store.images_snapshot().len(), 1);
        assert_eq!(store.image(ImageId(1)).unwrap().iso_image, "VMware-ESXi-8.0U2.iso");
    }

    #[test]
    fn host_mutations_rebuild_views() {
        let store = EntityStore::new();
        store.apply_hosts_and_groups(vec![host(1, Some(1))], vec![group(1), group(2)]);

        // Move host 1 to group 2.
        store.upsert_host(host(1, Some(2)));
        assert_eq!(store.group(GroupId(1)).unwrap().host_count(), 0);
        assert_eq!(store.group(GroupId(2)).unwrap().host_count(), 1);

        store.remove_host(HostId(1));
        assert_eq!(store.group(GroupId(2)).unwrap().host_count(), 0);
    }

    #[test]
    fn lookups_by_name_and_fqdn() {
        let store = EntityStore::new();
        store.apply_hosts_and_groups(vec![host(1, Some(1))], vec![group(1)]);
        assert_eq!(store.host_by_fqdn("ESX01.lab.local").unwrap().id, HostId(1));
        assert_eq!(store.group_by_name("group-1").unwrap().id, GroupId(1));
    }

    #[test]
    fn reset_clears_everything() {
        let store = EntityStore::new();
        store.apply_full_refresh(vec![host(1, None)], vec![group(1)], Vec::new(), Vec::new());
        store.reset();
        assert_eq!(store.host_count(), 0);
        assert_eq!(store.group_count(), 0);
        assert!(store.last_full_refresh().is_none());
    }
}

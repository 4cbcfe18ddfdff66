// ── Group domain type ──

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::host::Host;
use super::ids::{GroupId, ImageId, PoolId};
use super::kickstart::Kickstart;

/// Install-time switches applied to every host in a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOptions {
    /// Enable SSH after install.
    pub ssh: bool,
    /// Wipe all local disks before install.
    pub erasedisks: bool,
    /// Allow CPUs the installer considers unsupported.
    pub allowlegacycpu: bool,
    /// Regenerate the host certificate from the FQDN.
    pub certificate: bool,
    /// Create a VMFS datastore on the remaining boot disk space.
    pub createvmfs: bool,
}

/// A set of hosts installed from the same image with the same settings.
///
/// `hosts` is a derived view: the store recomputes it from the flat host
/// list (by `group_id`) after every host or group change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub pool_id: PoolId,
    pub image_id: ImageId,
    pub dns: String,
    pub ntp: String,
    pub syslog: String,
    pub vlan: String,
    pub bootdisk: String,
    pub callbackurl: String,
    pub kickstart: Kickstart,
    pub options: GroupOptions,
    #[serde(default)]
    pub hosts: Vec<Arc<Host>>,
}

impl Group {
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Hosts currently flagged for reimage.
    pub fn reimaging(&self) -> impl Iterator<Item = &Arc<Host>> {
        self.hosts.iter().filter(|h| h.reimage)
    }
}

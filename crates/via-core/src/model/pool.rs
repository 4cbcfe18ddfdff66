// ── DHCP pools and installer images ──

use serde::{Deserialize, Serialize};

use super::ids::{ImageId, PoolId};

/// Default DHCP lease for imported pools, in seconds.
pub const DEFAULT_LEASE_TIME: i64 = 7000;

/// A DHCP scope the server hands out addresses from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    pub net_address: String,
    /// Prefix length, e.g. `24`.
    pub netmask: i64,
    pub start_address: String,
    pub end_address: String,
    pub gateway: String,
    /// Only answer DHCP for hosts flagged for reimage.
    pub only_serve_reimage: bool,
    pub lease_time: i64,
}

impl Pool {
    /// `net_address/netmask`.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.net_address, self.netmask)
    }
}

/// An uploaded installer ISO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub iso_image: String,
    pub path: String,
    pub size: i64,
    pub hash: String,
    pub description: String,
}

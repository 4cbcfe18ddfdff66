// ── Typed request structs for Command payloads ──

use serde::{Deserialize, Serialize};

use crate::model::{DEFAULT_LEASE_TIME, GroupId, Kickstart, MacAddress, PoolId};

// ── Host ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHostRequest {
    /// Split into hostname + domain at the first dot.
    pub fqdn: String,
    pub ip: String,
    pub mac: MacAddress,
    pub group_id: Option<GroupId>,
    pub pool_id: Option<PoolId>,
    #[serde(default)]
    pub kickstart: Kickstart,
}

// ── Pool ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoolRequest {
    pub name: String,
    pub net_address: String,
    pub netmask: i64,
    pub start_address: String,
    pub end_address: String,
    pub gateway: String,
    pub only_serve_reimage: bool,
    pub lease_time: i64,
}

impl CreatePoolRequest {
    /// A pool with the console's import defaults: reimage-only DHCP and a
    /// 7000s lease.
    pub fn with_defaults(
        name: impl Into<String>,
        net_address: impl Into<String>,
        netmask: i64,
        start_address: impl Into<String>,
        end_address: impl Into<String>,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            net_address: net_address.into(),
            netmask,
            start_address: start_address.into(),
            end_address: end_address.into(),
            gateway: gateway.into(),
            only_serve_reimage: true,
            lease_time: DEFAULT_LEASE_TIME,
        }
    }
}

// ── Host domain type ──
//
// A physical machine known to the provisioning server. The server calls
// these "addresses" because each one pins an IP to a MAC.

use serde::{Deserialize, Serialize};

use super::ids::{GroupId, HostId, MacAddress, PoolId};
use super::kickstart::Kickstart;

/// A provisioned (or provisionable) host.
///
/// `progress` / `progresstext` are the values the server last persisted.
/// Live progress arrives out-of-band and is tracked in the
/// [`ProgressStore`](crate::progress::ProgressStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub hostname: String,
    pub domain: String,
    pub ip: String,
    pub mac: MacAddress,
    pub group_id: Option<GroupId>,
    pub pool_id: Option<PoolId>,
    /// Flagged for reimage on next PXE boot.
    pub reimage: bool,
    pub kickstart: Kickstart,
    pub progress: u8,
    pub progresstext: String,
}

impl Host {
    /// `hostname.domain`, or just `hostname` when there is no domain.
    pub fn fqdn(&self) -> String {
        join_fqdn(&self.hostname, &self.domain)
    }
}

/// Join a hostname and domain into an FQDN.
pub fn join_fqdn(hostname: &str, domain: &str) -> String {
    if domain.is_empty() {
        hostname.to_owned()
    } else {
        format!("{hostname}.{domain}")
    }
}

/// Split an FQDN at the first dot: `esx01.lab.local` → (`esx01`, `lab.local`).
pub fn split_fqdn(fqdn: &str) -> (String, String) {
    let fqdn = fqdn.trim().trim_end_matches('.');
    match fqdn.split_once('.') {
        Some((host, domain)) => (host.to_owned(), domain.to_owned()),
        None => (fqdn.to_owned(), String::new()),
    }
}

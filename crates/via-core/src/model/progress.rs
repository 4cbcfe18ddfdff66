// ── Reimage progress ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::HostId;

/// Latest known progress of one host's reimage job.
///
/// Lives beside the entity store, not inside `Host`, and can briefly
/// disagree with `Host::reimage` until the next refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub host_id: HostId,
    /// `0..=100`.
    pub percentage: u8,
    pub status_text: String,
    pub updated_at: DateTime<Utc>,
}

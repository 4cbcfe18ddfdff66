// ── Progress store ──
//
// Per-host projection of reimage progress: a percentage and a status
// text keyed by host id. Fed by the progress stream, the reimage
// orchestrator, and the server's persisted values on refresh.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::trace;
use via_api::progress::clamp_percentage;
use via_api::ProgressEvent;

use crate::model::{Host, HostId, ProgressRecord};
use crate::store::collection::EntityCollection;
use crate::stream::EntityStream;

/// How a delivered progress event is merged with what is already known.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum MergePolicy {
    /// Every event overwrites, in delivery order.
    #[default]
    LastWriteWins,
    /// A lower percentage is ignored unless the status text changed
    /// (a new job phase).
    Monotonic,
}

/// Reactive per-host progress projection.
pub struct ProgressStore {
    records: EntityCollection<HostId, ProgressRecord>,
    policy: MergePolicy,
}

impl ProgressStore {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            records: EntityCollection::new(),
            policy,
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, host: HostId) -> Option<Arc<ProgressRecord>> {
        self.records.get(&host)
    }

    pub fn percentage(&self, host: HostId) -> Option<u8> {
        self.get(host).map(|r| r.percentage)
    }

    pub fn status_text(&self, host: HostId) -> Option<String> {
        self.get(host).map(|r| r.status_text.clone())
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<ProgressRecord>>> {
        self.records.snapshot()
    }

    pub fn subscribe(&self) -> EntityStream<ProgressRecord> {
        EntityStream::new(self.records.subscribe())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Unconditional write, clamped to `0..=100`.
    pub fn set(&self, host: HostId, percentage: i64, status_text: impl Into<String>) {
        self.records.upsert(
            host,
            ProgressRecord {
                host_id: host,
                percentage: clamp_percentage(percentage),
                status_text: status_text.into(),
                updated_at: Utc::now(),
            },
        );
    }

    /// Merge a progress event under the store's policy. Returns whether
    /// the record changed.
    pub fn apply(&self, event: &ProgressEvent) -> bool {
        let host = HostId(event.host_id);

        if self.policy == MergePolicy::Monotonic {
            if let Some(current) = self.records.get(&host) {
                let same_phase = current.status_text == event.progresstext;
                if same_phase && event.percentage < current.percentage {
                    trace!(
                        host_id = host.get(),
                        current = current.percentage,
                        incoming = event.percentage,
                        "ignoring regressing progress"
                    );
                    return false;
                }
            }
        }

        self.set(host, i64::from(event.percentage), event.progresstext.clone());
        true
    }

    /// Seed from the values the server persisted on each host. Hosts with
    /// no recorded progress are left alone.
    pub fn seed_from_hosts<'a>(&self, hosts: impl IntoIterator<Item = &'a Arc<Host>>) {
        for host in hosts {
            if host.progress > 0 || !host.progresstext.is_empty() {
                self.set(host.id, i64::from(host.progress), host.progresstext.clone());
            }
        }
    }

    pub fn clear(&self, host: HostId) -> bool {
        self.records.remove(&host).is_some()
    }

    pub fn reset(&self) {
        self.records.clear();
    }
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(MergePolicy::default())
    }
}

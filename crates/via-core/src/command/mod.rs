// ── Command API ──
//
// All write operations flow through a unified `Command` enum. The
// console's command processor routes each variant to the backend and
// applies the response to the entity store, one command at a time.

pub mod requests;

use std::sync::Arc;

use crate::error::CoreError;
use crate::model::{GroupId, Host, HostId, Pool};

pub use requests::{CreateHostRequest, CreatePoolRequest};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All possible write operations against the provisioning server.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Host operations ──────────────────────────────────────────────
    CreateHost(CreateHostRequest),
    DeleteHost(HostId),

    // ── Reimage ──────────────────────────────────────────────────────
    ReimageHost(HostId),
    CancelReimage(HostId),
    /// Refetch hosts and groups after the host reported "completed".
    ReconcileCompleted(HostId),

    // ── Group operations ─────────────────────────────────────────────
    DeleteGroup(GroupId),

    // ── Pool operations ──────────────────────────────────────────────
    CreatePool(CreatePoolRequest),
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateHost(_) => "create_host",
            Self::DeleteHost(_) => "delete_host",
            Self::ReimageHost(_) => "reimage_host",
            Self::CancelReimage(_) => "cancel_reimage",
            Self::ReconcileCompleted(_) => "reconcile_completed",
            Self::DeleteGroup(_) => "delete_group",
            Self::CreatePool(_) => "create_pool",
        }
    }
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    Host(Arc<Host>),
    Pool(Arc<Pool>),
}

impl CommandResult {
    pub fn into_host(self) -> Option<Arc<Host>> {
        match self {
            Self::Host(host) => Some(host),
            _ => None,
        }
    }
}

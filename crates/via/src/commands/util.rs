//! Shared helpers for command handlers.

use std::path::Path;

use via_core::{Console, GroupId, HostTarget, PoolId};

use crate::error::CliError;

/// Resolve a group identifier (numeric id or name) via the store.
pub fn resolve_group(console: &Console, identifier: &str) -> Result<GroupId, CliError> {
    let store = console.store();
    if let Ok(id) = identifier.parse::<GroupId>() {
        if store.group(id).is_some() {
            return Ok(id);
        }
    }
    store
        .group_by_name(identifier)
        .map(|g| g.id)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "group".into(),
            identifier: identifier.into(),
            list_command: "groups".into(),
        })
}

/// Resolve a pool identifier (numeric id or name) via the store.
pub fn resolve_pool(console: &Console, identifier: &str) -> Result<PoolId, CliError> {
    let pools = console.pools_snapshot();
    pools
        .iter()
        .find(|p| p.id.to_string() == identifier || p.name == identifier)
        .map(|p| p.id)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "pool".into(),
            identifier: identifier.into(),
            list_command: "pools list".into(),
        })
}

/// Build the landing place for created hosts from `--group` / `--pool`.
///
/// A group without an explicit pool inherits the group's pool.
pub fn host_target(
    console: &Console,
    group: Option<&str>,
    pool: Option<&str>,
) -> Result<HostTarget, CliError> {
    let group_id = group.map(|g| resolve_group(console, g)).transpose()?;
    let pool_id = match pool {
        Some(p) => Some(resolve_pool(console, p)?),
        None => group_id
            .and_then(|id| console.store().group(id))
            .map(|g| g.pool_id),
    };
    Ok(HostTarget { group_id, pool_id })
}

/// Read a CSV payload from disk.
pub fn read_csv(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::Validation {
        field: "file".into(),
        reason: format!("{}: {e}", path.display()),
    })
}

//! Host command handlers.

use std::sync::Arc;

use tabled::Tabled;
use via_core::import::{self, CsvSchema};
use via_core::{Console, Host, ImportTarget};

use crate::cli::{GlobalOpts, HostsArgs, HostsCommand};
use crate::error::CliError;
use crate::output;

use super::{report, util};

#[derive(Tabled)]
pub(crate) struct HostRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "FQDN")]
    fqdn: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Progress")]
    progress: String,
}

impl HostRow {
    pub(crate) fn new(console: &Console, h: &Arc<Host>) -> Self {
        let group = h
            .group_id
            .and_then(|id| console.store().group(id))
            .map(|g| g.name.clone())
            .unwrap_or_default();
        let progress = match console.progress().get(h.id) {
            Some(record) => format!("{}% {}", record.percentage, record.status_text),
            None if h.reimage => "queued".into(),
            None => String::new(),
        };
        Self {
            id: h.id.to_string(),
            fqdn: h.fqdn(),
            ip: h.ip.clone(),
            mac: h.mac.to_string(),
            group,
            progress,
        }
    }
}

pub async fn handle(console: &Console, args: HostsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        HostsCommand::List { group, reimaging } => {
            let group_id = group
                .as_deref()
                .map(|g| util::resolve_group(console, g))
                .transpose()?;
            let hosts: Vec<Arc<Host>> = console
                .hosts_snapshot()
                .iter()
                .filter(|h| group_id.is_none() || h.group_id == group_id)
                .filter(|h| !reimaging || h.reimage)
                .cloned()
                .collect();
            let out = output::render_list(
                &global.output,
                &hosts,
                |h| HostRow::new(console, h),
                |h| h.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        HostsCommand::Import { file, group, pool } => {
            let text = util::read_csv(&file)?;
            let parsed = import::parse(&text, &CsvSchema::HOSTS)?;
            let target = util::host_target(console, group.as_deref(), pool.as_deref())?;

            let report = import::submit(console, &parsed, ImportTarget::Hosts(target)).await;
            report::finish(&report, &parsed.skipped, global)
        }
    }
}

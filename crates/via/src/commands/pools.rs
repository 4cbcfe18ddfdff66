//! Pool command handlers.

use std::sync::Arc;

use tabled::Tabled;
use via_core::import::{self, CsvSchema};
use via_core::{Console, ImportTarget, Pool};

use crate::cli::{GlobalOpts, PoolsArgs, PoolsCommand};
use crate::error::CliError;
use crate::output;

use super::{report, util};

#[derive(Tabled)]
struct PoolRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Network")]
    network: String,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "Reimage only")]
    only_serve_reimage: bool,
}

impl From<&Arc<Pool>> for PoolRow {
    fn from(p: &Arc<Pool>) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            network: p.cidr(),
            range: format!("{} - {}", p.start_address, p.end_address),
            gateway: p.gateway.clone(),
            only_serve_reimage: p.only_serve_reimage,
        }
    }
}

pub async fn handle(console: &Console, args: PoolsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        PoolsCommand::List => {
            let pools = console.pools_snapshot();
            let out = output::render_list(
                &global.output,
                &pools,
                |p| PoolRow::from(p),
                |p| p.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PoolsCommand::Import { file } => {
            let text = util::read_csv(&file)?;
            let parsed = import::parse(&text, &CsvSchema::POOLS)?;
            let report = import::submit(console, &parsed, ImportTarget::Pools).await;
            report::finish(&report, &parsed.skipped, global)
        }
    }
}

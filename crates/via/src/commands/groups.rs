//! Group command handlers.

use std::sync::Arc;

use tabled::Tabled;
use via_core::{Console, Group};

use crate::cli::{GlobalOpts, GroupsArgs};
use crate::error::CliError;
use crate::output;

use super::hosts::HostRow;

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Hosts")]
    hosts: usize,
    #[tabled(rename = "Reimaging")]
    reimaging: usize,
}

impl GroupRow {
    fn new(console: &Console, g: &Arc<Group>) -> Self {
        let store = console.store();
        Self {
            id: g.id.to_string(),
            name: g.name.clone(),
            pool: store
                .pool(g.pool_id)
                .map_or_else(|| g.pool_id.to_string(), |p| p.name.clone()),
            image: store
                .image(g.image_id)
                .map_or_else(|| g.image_id.to_string(), |i| i.iso_image.clone()),
            hosts: g.host_count(),
            reimaging: g.reimaging().count(),
        }
    }
}

pub fn handle(console: &Console, args: &GroupsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let groups = console.groups_snapshot();

    let out = if args.hosts {
        let hosts: Vec<_> = groups.iter().flat_map(|g| g.hosts.iter().cloned()).collect();
        output::render_list(
            &global.output,
            &hosts,
            |h| HostRow::new(console, h),
            |h| h.id.to_string(),
        )?
    } else {
        output::render_list(
            &global.output,
            &groups,
            |g| GroupRow::new(console, g),
            |g| g.id.to_string(),
        )?
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

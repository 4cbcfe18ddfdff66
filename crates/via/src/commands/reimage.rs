//! Reimage, cancel and watch handlers.
//!
//! Watching draws one progress bar per host from the console's progress
//! records and finishes a bar once the host's reimage flag clears.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tabled::Tabled;
use via_core::reimage::COMPLETED;
use via_core::{Console, HostId, ProgressRecord};

use crate::cli::{CancelArgs, GlobalOpts, OutputFormat, ReimageArgs, WatchArgs};
use crate::error::CliError;
use crate::output;

const BAR_TEMPLATE: &str = "{prefix:>28.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

#[derive(Tabled)]
struct ProgressRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Progress")]
    percentage: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub async fn start(console: &Console, args: &ReimageArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let host = console.reimage_host(HostId(args.id)).await?;
    if !global.quiet {
        eprintln!("Reimage started for {} (id {})", host.fqdn(), host.id);
    }
    if args.watch {
        follow(console, vec![host.id], global).await?;
    }
    Ok(())
}

pub async fn cancel(console: &Console, args: &CancelArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let host = console.cancel_reimage(HostId(args.id)).await?;
    if !global.quiet {
        eprintln!("Reimage canceled for {} (id {})", host.fqdn(), host.id);
    }
    Ok(())
}

pub async fn watch(console: &Console, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ids: Vec<HostId> = if args.ids.is_empty() {
        console.reimaging_hosts().iter().map(|h| h.id).collect()
    } else {
        args.ids
            .iter()
            .map(|&raw| {
                let id = HostId(raw);
                console
                    .store()
                    .host(id)
                    .map(|h| h.id)
                    .ok_or_else(|| CliError::NotFound {
                        resource_type: "host".into(),
                        identifier: id.to_string(),
                        list_command: "hosts list".into(),
                    })
            })
            .collect::<Result<_, _>>()?
    };

    if ids.is_empty() {
        if !global.quiet {
            eprintln!("No hosts are reimaging");
        }
        return Ok(());
    }
    follow(console, ids, global).await
}

/// Draw progress for `ids` until each host's reimage flag clears or the
/// user interrupts.
async fn follow(console: &Console, ids: Vec<HostId>, global: &GlobalOpts) -> Result<(), CliError> {
    if !console.config().progress_enabled {
        return Err(CliError::Validation {
            field: "progress".into(),
            reason: "the progress stream is disabled for this profile".into(),
        });
    }

    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .map_err(|e| CliError::Internal(e.to_string()))?
        .progress_chars("=> ");
    let multi = if global.quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    let mut bars: HashMap<HostId, ProgressBar> = ids
        .iter()
        .map(|&id| {
            let label = console
                .store()
                .host(id)
                .map_or_else(|| id.to_string(), |h| h.fqdn());
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(style.clone());
            bar.set_prefix(label);
            (id, bar)
        })
        .collect();

    let mut records = console.progress_records();
    let mut hosts = console.hosts();
    draw(console, &mut bars, &records.latest());

    while !bars.is_empty() {
        tokio::select! {
            snap = records.changed() => match snap {
                Some(snap) => draw(console, &mut bars, &snap),
                None => break,
            },
            snap = hosts.changed() => {
                if snap.is_none() {
                    break;
                }
                draw(console, &mut bars, &records.latest());
            }
            _ = tokio::signal::ctrl_c() => {
                for bar in bars.values() {
                    bar.abandon_with_message("interrupted");
                }
                break;
            }
        }
    }

    if !matches!(global.output, OutputFormat::Table) {
        let finals: Vec<_> = ids
            .iter()
            .filter_map(|&id| console.progress().get(id))
            .collect();
        let out = output::render_list(
            &global.output,
            &finals,
            |r| ProgressRow {
                host: r.host_id.to_string(),
                percentage: format!("{}%", r.percentage),
                status: r.status_text.clone(),
            },
            |r| r.host_id.to_string(),
        )?;
        output::print_output(&out, global.quiet);
    }
    Ok(())
}

/// Update every remaining bar and retire hosts that are no longer reimaging.
fn draw(
    console: &Console,
    bars: &mut HashMap<HostId, ProgressBar>,
    snapshot: &[std::sync::Arc<ProgressRecord>],
) {
    for record in snapshot {
        if let Some(bar) = bars.get(&record.host_id) {
            bar.set_position(u64::from(record.percentage));
            bar.set_message(record.status_text.clone());
        }
    }

    bars.retain(|id, bar| {
        let still_reimaging = console.store().host(*id).is_some_and(|h| h.reimage);
        if still_reimaging {
            return true;
        }
        match console.progress().status_text(*id) {
            Some(text) if text == COMPLETED => bar.finish_with_message(COMPLETED),
            Some(text) => bar.abandon_with_message(text),
            None => bar.abandon_with_message("stopped"),
        }
        false
    });
}

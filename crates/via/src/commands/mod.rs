//! Command dispatch: bridges CLI args -> console operations -> output formatting.

pub mod config_cmd;
pub mod groups;
pub mod hosts;
pub mod pools;
pub mod reimage;
pub mod report;
pub mod util;
pub mod wizard;

use via_core::Console;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Groups(args) => groups::handle(console, &args, global),
        Command::Hosts(args) => hosts::handle(console, args, global).await,
        Command::Pools(args) => pools::handle(console, args, global).await,
        Command::Reimage(args) => reimage::start(console, &args, global).await,
        Command::Cancel(args) => reimage::cancel(console, &args, global).await,
        Command::Watch(args) => reimage::watch(console, &args, global).await,
        Command::Wizard(args) => wizard::handle(console, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

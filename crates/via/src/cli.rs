//! Clap derive structures for the `via` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use via_core::Vendor;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// via -- operator console for go-via bare-metal provisioning
#[derive(Debug, Parser)]
#[command(
    name = "via",
    version,
    about = "Provision bare-metal hosts through a go-via server",
    long_about = "Operator console for a go-via provisioning server.\n\n\
        Lists inventory, imports hosts and pools from CSV, starts and\n\
        watches reimage jobs, and onboards machines by their management\n\
        controllers.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "VIA_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "VIA_SERVER", global = true)]
    pub server: Option<String>,

    /// Login name (overrides profile)
    #[arg(long, short = 'u', env = "VIA_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "VIA_OUTPUT", default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "VIA_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "VIA_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List host groups and their members
    #[command(alias = "g")]
    Groups(GroupsArgs),

    /// List and import hosts
    #[command(alias = "h")]
    Hosts(HostsArgs),

    /// List and import DHCP pools
    Pools(PoolsArgs),

    /// Start reimaging a host
    Reimage(ReimageArgs),

    /// Cancel a running reimage
    Cancel(CancelArgs),

    /// Follow reimage progress until every watched host completes
    Watch(WatchArgs),

    /// Validate management controllers from CSV and optionally create hosts
    Wizard(WizardArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Command {
    /// Whether the command follows live reimage progress.
    pub fn wants_progress(&self) -> bool {
        match self {
            Self::Reimage(args) => args.watch,
            Self::Watch(_) => true,
            _ => false,
        }
    }
}

// ── Inventory ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GroupsArgs {
    /// Show the hosts of each group instead of a summary
    #[arg(long)]
    pub hosts: bool,
}

#[derive(Debug, Args)]
pub struct HostsArgs {
    #[command(subcommand)]
    pub command: HostsCommand,
}

#[derive(Debug, Subcommand)]
pub enum HostsCommand {
    /// List hosts
    #[command(alias = "ls")]
    List {
        /// Only hosts in this group (id or name)
        #[arg(long, short = 'g')]
        group: Option<String>,

        /// Only hosts currently reimaging
        #[arg(long)]
        reimaging: bool,
    },

    /// Create hosts from a CSV file (header: fqdn,ip,mac[,ks])
    Import {
        /// CSV file to import
        file: PathBuf,

        /// Group the hosts join (id or name)
        #[arg(long, short = 'g')]
        group: Option<String>,

        /// Pool the hosts draw leases from (id or name)
        #[arg(long)]
        pool: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct PoolsArgs {
    #[command(subcommand)]
    pub command: PoolsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PoolsCommand {
    /// List pools
    #[command(alias = "ls")]
    List,

    /// Create pools from a CSV file
    Import {
        /// CSV file to import
        file: PathBuf,
    },
}

// ── Reimage ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReimageArgs {
    /// Host id
    pub id: i64,

    /// Follow progress until the job completes
    #[arg(long, short = 'w')]
    pub watch: bool,
}

#[derive(Debug, Args)]
pub struct CancelArgs {
    /// Host id
    pub id: i64,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Host ids to follow (default: every host currently reimaging)
    pub ids: Vec<i64>,
}

// ── Wizard ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WizardArgs {
    /// Candidate CSV (header: iloIpAddr,username,password[,fqdn,ip,mac])
    pub file: PathBuf,

    /// Hardware vendor of the candidates
    #[arg(long)]
    pub vendor: Vendor,

    /// Management controller port (overrides profile)
    #[arg(long)]
    pub port: Option<u16>,

    /// Create the hosts once every controller validates
    #[arg(long)]
    pub commit: bool,

    /// Group for committed hosts (id or name)
    #[arg(long, short = 'g', requires = "commit")]
    pub group: Option<String>,

    /// Pool for committed hosts (id or name)
    #[arg(long, requires = "commit")]
    pub pool: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration (passwords redacted)
    Show,

    /// Print the config file location
    Path,

    /// Store the active profile's password in the system keyring
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

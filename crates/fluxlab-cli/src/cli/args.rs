//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use fluxlab_core::{FluxSelector, LbAlgo, NetworkKind};

use crate::output::OutputFormat;

/// Control plane for simulated DNS topologies
///
/// Catalog normal, fast-flux, load-balanced and CDN networks, bring them up
/// as a docker compose fleet and keep their zone files in step with the
/// containers that are actually running.
#[derive(Parser, Debug)]
#[command(name = "fluxlab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "FLUXLAB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Lab directory (overrides work_dir from the config)
    #[arg(short = 'C', long, env = "FLUXLAB_WORK_DIR", global = true)]
    pub work_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new network
    Add(AddArgs),

    /// Remove a network from the catalog
    #[command(alias = "rm")]
    Remove(NameArgs),

    /// Show networks with their addresses and settings
    Status(StatusArgs),

    /// List network names
    #[command(alias = "ls")]
    List,

    /// Tune a network for the next deploy
    Set(SetArgs),

    /// Scale a running network by one instance
    Scale(ScaleArgs),

    /// Change a running network's TTL and reload its DNS server
    Ttl(TtlArgs),

    /// Ask a network's DNS server to reload its zone
    Reload(NameArgs),

    /// Rediscover a flux network's proxy agents
    Refresh(NameArgs),

    /// Write zones, restart the fleet and converge every network
    Deploy,

    /// Tear the fleet down (the catalog is kept)
    Stop,

    /// Forget every network
    Reset(ResetArgs),

    /// Test client resolver settings
    Client(ClientArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),
}

// ============================================================================
// Catalog commands
// ============================================================================

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Network kind: normal, flux, lb or cdn
    pub kind: NetworkKind,

    /// Network name (letters, digits, '-' and '_')
    pub name: String,
}

#[derive(Args, Debug)]
pub struct NameArgs {
    /// Network name
    pub name: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this network
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(subcommand)]
    pub command: SetCommands,
}

#[derive(Subcommand, Debug)]
pub enum SetCommands {
    /// Instance count (flux agents, lb workers, cdn edges)
    Size {
        /// Network name
        name: String,

        /// Instances, 1 to 10
        size: u32,
    },

    /// Record TTL in seconds
    Ttl {
        /// Network name
        name: String,

        /// Seconds, at least 1
        ttl: u32,
    },

    /// Flux rotation interval in seconds
    FluxInterval {
        /// Flux network name
        name: String,

        /// Seconds, at least 1
        seconds: u32,
    },

    /// Flux agent selection: random or roundrobin
    FluxSelector {
        /// Flux network name
        name: String,

        /// Selection strategy
        selector: FluxSelector,
    },

    /// Load balancer algorithm: round_robin or ip_hash
    LbAlgo {
        /// Lb network name
        name: String,

        /// Algorithm
        algo: LbAlgo,
    },
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Confirm dropping every network
    #[arg(long)]
    pub yes: bool,
}

// ============================================================================
// Live commands
// ============================================================================

#[derive(Args, Debug)]
pub struct ScaleArgs {
    #[command(subcommand)]
    pub command: ScaleCommands,
}

#[derive(Subcommand, Debug)]
pub enum ScaleCommands {
    /// Add one instance
    Up(NameArgs),

    /// Remove one instance
    Down(NameArgs),
}

#[derive(Args, Debug)]
pub struct TtlArgs {
    /// Network name
    pub name: String,

    /// New TTL in seconds
    pub ttl: u32,
}

// ============================================================================
// Client command
// ============================================================================

#[derive(Args, Debug)]
pub struct ClientArgs {
    #[command(subcommand)]
    pub command: ClientCommands,
}

#[derive(Subcommand, Debug)]
pub enum ClientCommands {
    /// Nameserver order: comma-separated network names, or "auto"
    Order {
        /// e.g. fluxy,edge1 or auto
        order: String,
    },

    /// Set a resolver option
    Set {
        #[command(subcommand)]
        option: ClientOption,
    },

    /// Show the resolver file the client gets
    Show,
}

#[derive(Subcommand, Debug)]
pub enum ClientOption {
    /// Search domain
    Search {
        /// Domain appended to short names
        domain: String,
    },

    /// `options ndots:N`
    Ndots {
        /// Dots a name needs before it is tried as absolute
        ndots: u32,
    },
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Key to set (e.g., project_name, discovery.timeout_secs)
        key: String,

        /// Value to set
        value: String,
    },

    /// Show config file path
    Path,
}

//! Clap derive structures for the `floorsync` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// floorsync -- watch and drive building-automation modules
#[derive(Debug, Parser)]
#[command(
    name = "floorsync",
    version,
    about = "Watch and control floor-plan building-automation modules",
    long_about = "Talks to a module state server: streams live module state over its\n\
        WebSocket feed and issues commands over HTTP.",
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
    /// Config file (default: platform config dir)
    #[arg(long, env = "FLOORSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server as host[:port] (overrides config)
    #[arg(long, short = 'H', env = "FLOORSYNC_HOST", global = true)]
    pub host: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLOORSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Colorize feed status lines
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print nothing but errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable (default)
    Table,
    /// Pretty-printed JSON
    Json,
    /// JSON on one line
    JsonCompact,
    /// YAML
    Yaml,
    /// Bare values, one per line
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Color when stderr is a terminal
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live state of modules from the feed
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Request the current value of a sub-unit field
    Get(GetArgs),

    /// Set a sub-unit field
    Set(SetArgs),

    /// Flip a relay, or switch it for a while with --for
    Toggle(ToggleArgs),

    /// Measure the offset between the local and the server clock
    Calibrate,

    /// Parse or format human durations
    #[command(alias = "dur")]
    Duration(DurationArgs),

    /// List the controls of the floor-plan topology
    #[command(alias = "topo")]
    Topology(TopologyArgs),

    /// Show or initialise configuration
    Config(ConfigArgs),

    /// Print a shell completion script
    Completions(CompletionsArgs),
}

// ── Module commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Module addresses in hex (e.g. 07 2c)
    #[arg(required_unless_present = "all")]
    pub addresses: Vec<String>,

    /// Watch every module referenced by the topology
    #[arg(long, conflicts_with = "addresses")]
    pub all: bool,

    /// Exit after this many state updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Module address in hex
    pub address: String,
    /// Sub-unit index
    pub subindex: u32,
    /// Field name (relay, dimvalue, position, input, ...)
    pub field: String,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Module address in hex
    pub address: String,
    /// Sub-unit index
    pub subindex: u32,
    /// Field name (relay, dimvalue, position, ...)
    pub field: String,

    /// JSON scalar to send (true, false, 42, "up")
    #[arg(required_unless_present = "for_duration", allow_negative_numbers = true)]
    pub value: Option<String>,

    /// Send a timeout instead of a value (e.g. "5m", "1h 30m")
    #[arg(long = "for", value_name = "DURATION", conflicts_with = "value")]
    pub for_duration: Option<String>,
}

#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Module address in hex
    pub address: String,
    /// Relay number
    pub subindex: u32,

    /// Timer instead of a plain flip (e.g. "5m"); blank means no timer
    #[arg(long = "for", value_name = "DURATION")]
    pub for_duration: Option<String>,
}

// ── Duration ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DurationArgs {
    #[command(subcommand)]
    pub command: DurationCommand,
}

#[derive(Debug, Subcommand)]
pub enum DurationCommand {
    /// Convert text like "1h 30m" into seconds
    Parse {
        /// Duration text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Render seconds as "1d 2h 3m 4s"
    Format {
        /// Seconds (may be negative or fractional)
        #[arg(allow_negative_numbers = true)]
        seconds: f64,
    },
}

// ── Topology ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TopologyArgs {
    /// Topology file (overrides config)
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

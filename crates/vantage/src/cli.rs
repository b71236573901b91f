//! Clap derive structures for the `vantage` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vantage -- talk to Vantage InFusion controllers from the command line
#[derive(Debug, Parser)]
#[command(
    name = "vantage",
    version,
    about = "Monitor and control Vantage InFusion lighting controllers",
    long_about = "Speaks the InFusion host command protocol to list objects, read and\n\
        write their state, press buttons, set keypad LEDs, and follow pushed status.",
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
    /// Controller profile to use
    #[arg(long, short = 'p', env = "VANTAGE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller hostname or IP (overrides profile)
    #[arg(long, short = 'H', env = "VANTAGE_HOST", global = true)]
    pub host: Option<String>,

    /// Command port (defaults to 3010 with TLS, 3001 without)
    #[arg(long, env = "VANTAGE_PORT", global = true)]
    pub port: Option<u16>,

    /// Transport security
    #[arg(long, env = "VANTAGE_TLS", global = true)]
    pub tls: Option<TlsArg>,

    /// Username for the LOGIN handshake
    #[arg(long, short = 'u', env = "VANTAGE_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for the LOGIN handshake
    #[arg(long, env = "VANTAGE_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Design Center backup used to populate objects
    #[arg(long, env = "VANTAGE_SNAPSHOT", global = true)]
    pub snapshot: Option<PathBuf>,

    /// How pushed status is followed
    #[arg(long, global = true)]
    pub status_mode: Option<StatusModeArg>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VANTAGE_OUTPUT",
        default_value = "table",
        global = true
    )]
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

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "VANTAGE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TlsArg {
    /// Plaintext TCP
    Disabled,
    /// TLS with certificate verification
    Verify,
    /// TLS accepting self-signed certificates
    Insecure,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusModeArg {
    /// Try the enhanced log, fall back to categories
    Auto,
    /// Enhanced log object status
    EnhancedLog,
    /// Per-category STATUS subscriptions
    Category,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
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

/// LED blink rate as typed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BlinkArg {
    Fast,
    Medium,
    Slow,
    VerySlow,
    Off,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow pushed status and print every change
    #[command(alias = "mon")]
    Monitor(MonitorArgs),

    /// List known objects
    #[command(alias = "ls")]
    List(ListArgs),

    /// Fetch and show the state of one object
    Get(GetArgs),

    /// Call Interface.Method on an object
    Invoke(InvokeArgs),

    /// Send a raw host command line
    Raw(RawArgs),

    /// Press (and release) a keypad button
    Press(PressArgs),

    /// Set a button's LED colors and blink rate
    Led(LedArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Only show events for objects of this type
    #[arg(long, short = 't')]
    pub r#type: Option<String>,

    /// Fetch current state before following
    #[arg(long)]
    pub fetch: bool,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only list objects of this type
    #[arg(long, short = 't')]
    pub r#type: Option<String>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Object id
    pub vid: u32,

    /// Object type, for objects missing from the snapshot
    #[arg(long, short = 't')]
    pub r#type: Option<String>,
}

#[derive(Debug, Args)]
pub struct InvokeArgs {
    /// Object id
    pub vid: u32,

    /// Method, as Interface.Method
    pub method: String,

    /// Method arguments
    pub args: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RawArgs {
    /// Command line, e.g. `GETLED 447`
    #[arg(required = true, num_args = 1..)]
    pub line: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PressArgs {
    /// Button id
    pub vid: u32,

    /// Hold the button down this many milliseconds before releasing
    #[arg(long, default_value = "0")]
    pub hold_ms: u64,

    /// Press without releasing
    #[arg(long, conflicts_with = "hold_ms")]
    pub no_release: bool,
}

#[derive(Debug, Args)]
pub struct LedArgs {
    /// Button id
    pub vid: u32,

    /// Active color: `r,g,b` or `#rrggbb`
    pub active: String,

    /// Inactive color (defaults to off)
    pub inactive: Option<String>,

    /// Blink rate
    #[arg(long, short = 'b', default_value = "off")]
    pub blink: BlinkArg,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// List profile names
    Profiles,

    /// Store the active profile's password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

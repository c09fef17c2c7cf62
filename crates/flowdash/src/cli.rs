//! Clap derive structures for the `flowdash` CLI.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// flowdash -- live energy flows from a home battery and solar system
#[derive(Debug, Parser)]
#[command(
    name = "flowdash",
    version,
    about = "Live home battery and solar energy flows from the command line",
    long_about = "Reads live power flows, daily energy and history from a home battery \
        system, either from the gateway on the local network or from the cloud fleet API.\n\n\
        Use `--host demo` to try it without any hardware.",
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
    /// Energy system profile to use
    #[arg(long, short = 'p', env = "FLOWDASH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway host or URL (overrides profile; `demo` for sample data)
    #[arg(long, short = 'H', env = "FLOWDASH_HOST", global = true)]
    pub host: Option<String>,

    /// Gateway account e-mail (overrides profile)
    #[arg(long, short = 'u', env = "FLOWDASH_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLOWDASH_OUTPUT",
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

    /// Accept invalid TLS certificates on cloud endpoints
    #[arg(long, short = 'k', env = "FLOWDASH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FLOWDASH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// IANA time zone for day boundaries (overrides profile)
    #[arg(long, env = "FLOWDASH_TZ", global = true)]
    pub tz: Option<String>,
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
    /// YAML
    Yaml,
    /// Plain `key=value` lines (scripting)
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
    /// Show the current energy flows once
    #[command(alias = "st")]
    Status,

    /// Keep polling and print every new snapshot
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show 24 hours of battery power and state of charge
    #[command(alias = "hist")]
    History(HistoryArgs),

    /// List and select energy sites (cloud mode)
    Sites(SitesArgs),

    /// Sign in (gateway login or OAuth authorization)
    Login,

    /// Forget stored tokens and session state
    Logout,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── History ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Day to show (YYYY-MM-DD); defaults to the last 24 hours
    #[arg(long, short = 'd', conflicts_with = "days_ago")]
    pub date: Option<NaiveDate>,

    /// Show the day this many days before today
    #[arg(long)]
    pub days_ago: Option<u32>,

    /// Which series to print
    #[arg(long, short = 's', default_value = "power")]
    pub series: HistorySeries,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HistorySeries {
    /// Battery power (W) with flow source and destination
    Power,
    /// Battery state of energy (%)
    Soe,
}

// ── Sites ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SitesArgs {
    #[command(subcommand)]
    pub command: SitesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SitesCommand {
    /// List energy sites on the account
    #[command(alias = "ls")]
    List,

    /// Select the site used by every other command
    Select {
        /// Zero-based index from `sites list`
        index: usize,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive profile setup
    Init,

    /// Show the configuration with secrets masked
    Show,

    /// Print the config and state file locations
    Path,

    /// List configured profiles
    Profiles,

    /// Store a secret in the system keyring
    SetSecret {
        /// Which secret to store
        #[arg(value_enum)]
        kind: SecretArg,
    },

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretArg {
    /// Gateway login password
    Password,
    /// OAuth client secret
    ClientSecret,
    /// Electricity Maps API key
    CarbonApiKey,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

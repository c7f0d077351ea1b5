//! Clap derive structures for the `emberlink` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use emberlink_api::ParameterKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// emberlink -- discover, monitor and drive Ember+-style parameter trees
#[derive(Debug, Parser)]
#[command(
    name = "emberlink",
    version,
    about = "Discover, monitor and drive Ember+-style parameter trees",
    long_about = "Runs one monitoring session against a provider tree: crawls it with the\n\
        configured filters, subscribes every discovered parameter, and issues\n\
        bound-checked writes.",
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
    /// Provider profile to use
    #[arg(long, short = 'p', env = "EMBERLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// JSON tree snapshot to serve as the provider (overrides profile)
    #[arg(long, env = "EMBERLINK_TREE", global = true)]
    pub tree: Option<PathBuf>,

    /// Provider host (overrides profile)
    #[arg(long, env = "EMBERLINK_HOST", global = true)]
    pub host: Option<String>,

    /// Provider port (overrides profile)
    #[arg(long, env = "EMBERLINK_PORT", global = true)]
    pub port: Option<u16>,

    /// Connect timeout in milliseconds (overrides profile)
    #[arg(long, env = "EMBERLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Crawl the tree at session start
    #[arg(long, global = true)]
    pub auto_parse: bool,

    /// Comma-separated subtree paths the crawl is limited to
    #[arg(long, global = true)]
    pub auto_parse_paths: Option<String>,

    /// Comma-separated label substrings a parameter must contain
    #[arg(long, global = true)]
    pub node_filters: Option<String>,

    /// Comma-separated parameter identifiers to accept
    #[arg(long, global = true)]
    pub parameter_filters: Option<String>,

    /// Comma-separated paths to monitor regardless of the crawl
    #[arg(long, global = true)]
    pub monitor: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "EMBERLINK_OUTPUT",
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

/// Value kinds accepted by `set --kind`.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ValueKind {
    Integer,
    Real,
    Boolean,
    String,
    Enum,
}

impl From<ValueKind> for ParameterKind {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Integer => Self::Integer,
            ValueKind::Real => Self::Real,
            ValueKind::Boolean => Self::Boolean,
            ValueKind::String => Self::String,
            ValueKind::Enum => Self::Enum,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl the tree and list every monitored parameter with its value
    #[command(alias = "ls")]
    Crawl,

    /// Read the decoded value of a monitored parameter
    Get {
        /// Monitored label, e.g. "Audio.Ch1.Gain"
        label: String,
    },

    /// Write a typed value (integers are clamped into their bounds)
    Set {
        /// Numeric path ("1.2.3") or monitored label
        target: String,

        /// Value to write
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Kind of the value
        #[arg(long, short = 'k', default_value = "integer")]
        kind: ValueKind,
    },

    /// Resolve a value template and write the number it yields
    Expr {
        /// Numeric path ("1.2.3") or monitored label
        target: String,

        /// Template text; "$(name)" placeholders are replaced by --var values
        #[arg(allow_hyphen_values = true)]
        template: String,

        /// Template variable as NAME=VALUE (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },

    /// Increase a value towards its maximum
    Inc(StepArgs),

    /// Decrease a value towards its minimum
    Dec(StepArgs),

    /// Flip a boolean parameter
    Toggle {
        /// Numeric path ("1.2.3") or monitored label
        target: String,
    },

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Command {
    /// The write or read target, for commands that address one parameter.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Set { target, .. }
            | Self::Expr { target, .. }
            | Self::Toggle { target }
            | Self::Inc(StepArgs { target, .. })
            | Self::Dec(StepArgs { target, .. }) => Some(target),
            Self::Get { label } => Some(label),
            Self::Crawl | Self::Config(_) | Self::Completions(_) => None,
        }
    }
}

#[derive(Debug, Args)]
pub struct StepArgs {
    /// Numeric path ("1.2.3") or monitored label
    pub target: String,

    /// Step size (non-negative)
    #[arg(long, short = 'd', default_value = "1")]
    pub delta: f64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or replace a profile from flags
    Init(InitArgs),

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a key on the active profile
    Set {
        /// Profile key, e.g. "host" or "parameter_filters"
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Name of the profile to write
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Crawl the tree at session start
    #[arg(long)]
    pub crawl: bool,

    /// Replace an existing profile of the same name
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

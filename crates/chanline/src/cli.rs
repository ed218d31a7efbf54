//! Clap derive structures for the `chanline` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Depends only on clap so `build.rs` can include it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// chanline -- IPTV playback with adaptive quality and GPU transcoding
#[derive(Debug, Parser)]
#[command(
    name = "chanline",
    version,
    about = "Play IPTV channels with adaptive quality and hardware transcoding",
    long_about = "Orchestrates IPTV playback pipelines.\n\n\
        Probes the transcode engine for hardware acceleration, measures the\n\
        network, routes streams through an optional proxy, and adapts output\n\
        quality while a channel plays.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "CHANLINE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "CHANLINE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Neither read nor update the state cache
    #[arg(long, global = true)]
    pub no_cache: bool,
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

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe the transcode engine for codecs and hardware acceleration
    Probe(ProbeArgs),

    /// Measure and watch network quality
    #[command(alias = "net")]
    Network(NetworkArgs),

    /// Configure and test the outbound proxy
    Proxy(ProxyArgs),

    /// Browse the channel catalog
    #[command(alias = "ch")]
    Channels(ChannelsArgs),

    /// Play a channel until interrupted
    Play(PlayArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PROBE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Show the cached snapshot instead of probing
    #[arg(long)]
    pub cached: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NETWORK
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Take one measurement and classify it
    Status,

    /// Stream classified readings as the monitor takes them
    Watch {
        /// Stop after this many readings
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PROXY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ProxyArgs {
    #[command(subcommand)]
    pub command: ProxyCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProxyCommand {
    /// Show the configured proxy
    Show,

    /// Verify a proxy and save it to the config file
    Set {
        /// Proxy host name or address
        host: String,

        #[command(flatten)]
        endpoint: ProxyEndpointArgs,

        /// Store the password in the config file instead of the keyring
        #[arg(long)]
        plaintext: bool,

        /// Save without probing the route first
        #[arg(long)]
        no_check: bool,
    },

    /// Probe a proxy without saving it
    Test {
        /// Proxy host (defaults to the configured proxy)
        host: Option<String>,

        #[command(flatten)]
        endpoint: ProxyEndpointArgs,
    },

    /// Disable the proxy and forget its stored password
    Clear,
}

#[derive(Debug, Clone, Args)]
pub struct ProxyEndpointArgs {
    /// Proxy port
    #[arg(long, short = 'P', default_value = "8080")]
    pub port: u32,

    /// Proxy protocol
    #[arg(long, default_value = "http")]
    pub scheme: ProxySchemeArg,

    /// Username for proxy authentication
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Environment variable holding the password (otherwise prompted)
    #[arg(long, requires = "username")]
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProxySchemeArg {
    Http,
    Https,
    Socks5,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CHANNELS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ChannelsArgs {
    #[command(subcommand)]
    pub command: ChannelsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ChannelsCommand {
    /// List catalog channels
    #[command(alias = "ls")]
    List {
        /// Only channels in this category
        #[arg(long, short = 'c')]
        category: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PLAY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Channel id, channel name, or a stream URL
    pub channel: String,

    /// Requested quality: auto, SD, HD, FHD or 4K [default: from config]
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,

    /// Stop after this long (e.g. "90s", "1h 30m")
    #[arg(long, short = 'd')]
    pub duration: Option<String>,

    /// Best quality an ad-hoc stream URL offers
    #[arg(long, default_value = "FHD")]
    pub nominal: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config and state cache locations
    Path,

    /// Set a configuration value
    Set {
        /// Config key (section.field, e.g., "quality.default")
        key: String,

        /// Value to set
        value: String,
    },

    /// Store the configured proxy user's password in the system keyring
    SetPassword,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

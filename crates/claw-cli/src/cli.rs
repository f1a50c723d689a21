//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// claw - talk to a claw gateway from the terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "claw")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Gateway WebSocket URL.
    #[arg(short, long, env = "CLAW_GATEWAY_URL")]
    pub gateway: Option<String>,

    /// Gateway bearer token.
    #[arg(long, env = "CLAW_GATEWAY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// HTTP endpoint serving `{gatewayUrl, gatewayToken}`.
    #[arg(long, env = "CLAW_SETTINGS_URL")]
    pub settings_url: Option<String>,

    /// JSON configuration file.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Seconds to wait for the gateway handshake.
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    pub connect_timeout: u64,

    /// Emit logs as JSON on stderr.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Connect, print gateway identity and health, then disconnect.
    Status,

    /// Invoke one gateway method and print its result.
    Call(CallArgs),

    /// Stream gateway events until interrupted.
    Watch(WatchArgs),
}

/// Arguments for the call command.
#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    /// Method name, e.g. `sessions.list`.
    pub method: String,

    /// Parameters as a JSON document.
    #[arg(short, long, value_name = "JSON")]
    pub params: Option<String>,

    /// Give up after this many seconds.
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the watch command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Print health snapshots instead of events.
    #[arg(long)]
    pub health: bool,

    /// Only print events with these names.
    #[arg(short, long = "event", value_name = "NAME")]
    pub events: Vec<String>,

    /// Exit after this many lines.
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

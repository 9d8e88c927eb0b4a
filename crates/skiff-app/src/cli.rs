//! Command-line surface. The binary takes no positional arguments; clap
//! rejects any with a usage message and exit status 2.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Desktop-style BitTorrent session with a line-oriented console view.
#[derive(Debug, Clone, Parser)]
#[command(name = "skiff", version, about)]
pub struct Cli {
    /// JSON settings file.
    #[arg(long, env = "SKIFF_CONFIG")]
    pub config: Option<PathBuf>,
    /// Log filter directive; overrides settings and environment.
    #[arg(long)]
    pub log_level: Option<String>,
    /// Log output format; overrides settings and environment.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
    /// Print the torrent table after every tick.
    #[arg(long)]
    pub follow: bool,
}

/// Log formats selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl LogFormatArg {
    /// Setting value understood by the configuration layer.
    #[must_use]
    pub const fn as_setting(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Farmhand - bounded-concurrency background farming
#[derive(Parser, Debug)]
#[command(
    name = "fh",
    about = "Farm card drops and watch market orders with a fixed concurrency budget",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Farm card drops for every badge with cards left
    Cards {
        /// Session fixture (YAML)
        #[arg(short = 'x', long)]
        fixture: PathBuf,

        /// Games played at once (overrides config)
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,

        /// Farm badges in reverse order
        #[arg(short, long)]
        reverse: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Watch the buy and sell order books
    Market {
        /// Session fixture (YAML)
        #[arg(short = 'x', long)]
        fixture: PathBuf,

        /// Order books polled at once (overrides config)
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,

        /// Polls per order book, 0 for no limit (overrides config)
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Log file location
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("farmhand")
        .join("logs")
        .join("farmhand.log")
}

/// Output format for progress lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

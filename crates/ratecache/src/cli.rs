//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};

/// Cached room rate lookups with stampede protection.
#[derive(Debug, Parser)]
#[command(name = "ratecache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Redis connection URL. The in-process backend is used when unset.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Rate API base URL.
    #[arg(long, env = "RATE_API_URL")]
    pub api_url: Option<String>,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Raw JSON output.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Look up a room rate through the cache.
    Rate {
        /// Hotel name.
        #[arg(long)]
        hotel: String,
        /// Room type.
        #[arg(long)]
        room: String,
        /// Pricing period.
        #[arg(long)]
        period: String,
        /// Concurrent lookups to issue for the same rate.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        concurrency: u32,
    },
    /// List cache keys with their values and TTLs.
    DumpKeys {
        /// Glob pattern keys must match.
        #[arg(long, default_value = "*")]
        pattern: String,
    },
}

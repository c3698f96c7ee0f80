//! CLI argument definitions for the sidewatch daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Sidewatch security event fan-out daemon.
///
/// Ingests KubeArmor alerts and logs from the relay service and direct
/// HTTP submissions, enriches them, and fans them out to the configured sinks.
#[derive(Parser, Debug)]
#[command(name = "sidewatch")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to sidewatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/sidewatch/sidewatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

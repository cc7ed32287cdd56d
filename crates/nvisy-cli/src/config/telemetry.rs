//! Logging configuration.

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

/// Output format of log records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored output.
    #[default]
    Pretty,
    /// One JSON object per record.
    Json,
}

/// Logging options.
///
/// Log records always go to stderr so that reports printed to stdout stay
/// machine readable. The level filter comes from `RUST_LOG`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
pub struct TelemetryConfig {
    /// Format of log records.
    #[arg(long, env = "SPLIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    #[serde(default)]
    pub log_format: LogFormat,
}

//! Output configuration.

use clap::Args;
use serde::{Deserialize, Serialize};

/// Controls what the CLI writes and prints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
pub struct OutputConfig {
    /// Replace fragment files that already exist in the output directory.
    #[arg(long, env = "SPLIT_OVERWRITE")]
    #[serde(default)]
    pub overwrite: bool,

    /// Print the report as JSON instead of a table.
    #[arg(long)]
    #[serde(default)]
    pub json: bool,

    /// Only plan the split; nothing is assembled or written.
    #[arg(long)]
    #[serde(default)]
    pub dry_run: bool,
}

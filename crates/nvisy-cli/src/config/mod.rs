//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── input: PathBuf                # Document to split
//! ├── output_dir: Option<PathBuf>   # Where fragments are written
//! ├── splitter: SplitterConfig      # Budget, engine, encryption policy
//! ├── output: OutputConfig          # Overwrite, JSON, dry run
//! └── telemetry: TelemetryConfig    # Log format
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! # Split into 1 MiB fragments next to the input
//! nvisy-split report.pdf --max-chunk-bytes 1048576
//!
//! # Or via environment variables
//! SPLIT_ENGINE=prune SPLIT_REFINE_OVERSIZED=true nvisy-split report.pdf -o parts/
//! ```

mod output;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::Parser;
use nvisy_splitter::{SplitterConfig, format_file_size};
pub use output::OutputConfig;
use serde::{Deserialize, Serialize};
pub use telemetry::{LogFormat, TelemetryConfig};

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "nvisy-split")]
#[command(about = "Split a PDF into size-bounded fragments")]
#[command(version)]
pub struct Cli {
    /// Document to split.
    pub input: PathBuf,

    /// Directory fragments are written to; defaults to the input's directory.
    #[arg(short, long, env = "SPLIT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Splitting configuration (budget, engine, encryption policy).
    #[clap(flatten)]
    pub splitter: SplitterConfig,

    /// Output behavior.
    #[clap(flatten)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[clap(flatten)]
    pub telemetry: TelemetryConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments so that its
    /// values act as defaults for the `env` attributes.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Returns the name fragments are derived from.
    pub fn source_name(&self) -> String {
        self.input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Returns the directory fragments are written to.
    pub fn output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .input
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        }
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.splitter
            .validate()
            .context("invalid splitter configuration")?;

        if self.input.as_os_str().is_empty() {
            anyhow::bail!("input path must not be empty");
        }

        Ok(())
    }

    /// Logs configuration at info level.
    pub fn log(&self) {
        Self::log_build_info();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            input = %self.input.display(),
            output_dir = %self.output_dir().display(),
            max_chunk_size = %format_file_size(self.splitter.max_chunk_bytes),
            engine = %self.splitter.engine,
            ignore_encryption_markers = self.splitter.ignore_encryption_markers,
            refine_oversized = self.splitter.refine_oversized,
            max_concurrent_chunks = self.splitter.max_concurrent_chunks,
            overwrite = self.output.overwrite,
            dry_run = self.output.dry_run,
            "Split configuration"
        );
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

//! Splitter configuration.

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::engine::EngineKind;
use crate::error::{Result, SplitError};

/// Default byte budget per fragment: 2.7 MiB.
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 2_831_155;

/// Default maximum number of chunks assembled simultaneously.
pub const DEFAULT_MAX_CONCURRENT_CHUNKS: usize = 8;

/// Configuration consumed by [`Splitter`].
///
/// [`Splitter`]: crate::Splitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct SplitterConfig {
    /// Maximum serialized size of each fragment in bytes.
    ///
    /// The planner targets this budget from an average page size, so
    /// individual fragments can still exceed it unless refinement is enabled.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "max-chunk-bytes",
            env = "SPLIT_MAX_CHUNK_BYTES",
            default_value_t = DEFAULT_MAX_CHUNK_BYTES
        )
    )]
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,

    /// Whether documents carrying encryption markers are loaded anyway.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "ignore-encryption-markers",
            env = "SPLIT_IGNORE_ENCRYPTION_MARKERS",
            default_value_t = true,
            action = clap::ArgAction::Set
        )
    )]
    #[serde(default = "default_true")]
    pub ignore_encryption_markers: bool,

    /// Page engine used to build fragments.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "engine",
            env = "SPLIT_ENGINE",
            default_value_t = EngineKind::Copy
        )
    )]
    #[serde(default)]
    pub engine: EngineKind,

    /// Whether oversized multi-page fragments are re-split after measuring.
    #[cfg_attr(
        feature = "config",
        arg(long = "refine-oversized", env = "SPLIT_REFINE_OVERSIZED")
    )]
    #[serde(default)]
    pub refine_oversized: bool,

    /// Maximum number of chunks assembled simultaneously.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "max-concurrent-chunks",
            env = "SPLIT_MAX_CONCURRENT_CHUNKS",
            default_value_t = DEFAULT_MAX_CONCURRENT_CHUNKS
        )
    )]
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,
}

fn default_max_chunk_bytes() -> u64 {
    DEFAULT_MAX_CHUNK_BYTES
}

fn default_max_concurrent_chunks() -> usize {
    DEFAULT_MAX_CONCURRENT_CHUNKS
}

fn default_true() -> bool {
    true
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            ignore_encryption_markers: true,
            engine: EngineKind::default(),
            refine_oversized: false,
            max_concurrent_chunks: DEFAULT_MAX_CONCURRENT_CHUNKS,
        }
    }
}

impl SplitterConfig {
    /// Creates a configuration with the given byte budget.
    pub fn new(max_chunk_bytes: u64) -> Self {
        Self {
            max_chunk_bytes,
            ..Default::default()
        }
    }

    /// Sets whether encryption markers are ignored.
    pub fn with_ignore_encryption_markers(mut self, ignore: bool) -> Self {
        self.ignore_encryption_markers = ignore;
        self
    }

    /// Sets the page engine.
    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    /// Enables or disables re-splitting of oversized fragments.
    pub fn with_refine_oversized(mut self, refine: bool) -> Self {
        self.refine_oversized = refine;
        self
    }

    /// Sets the assembly concurrency limit.
    pub fn with_max_concurrent_chunks(mut self, max_concurrent_chunks: usize) -> Self {
        self.max_concurrent_chunks = max_concurrent_chunks;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::InvalidConfig`] when the byte budget or the
    /// concurrency limit is zero, or when the concurrency limit exceeds
    /// [`Semaphore::MAX_PERMITS`].
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_bytes == 0 {
            return Err(SplitError::invalid_config(
                "maximum chunk size must be positive",
            ));
        }

        if self.max_concurrent_chunks == 0 {
            return Err(SplitError::invalid_config(
                "maximum concurrent chunks must be positive",
            ));
        }

        if self.max_concurrent_chunks > Semaphore::MAX_PERMITS {
            return Err(SplitError::invalid_config(format!(
                "maximum concurrent chunks must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(())
    }
}

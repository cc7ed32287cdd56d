#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod document;
pub mod engine;
mod error;
mod format;
mod fragment;
mod plan;
mod size;
mod splitter;

#[cfg(test)]
mod fixtures;

pub use config::{DEFAULT_MAX_CHUNK_BYTES, DEFAULT_MAX_CONCURRENT_CHUNKS, SplitterConfig};
pub use document::{LoadOptions, SourceDocument};
pub use engine::{EngineKind, PageEngine};
pub use error::{AssemblyError, BoxedError, ErrorKind, Result, SplitError};
pub use format::DocumentFormat;
pub use fragment::{Fragment, assemble, fragment_name};
pub use plan::{ChunkPlan, PageRange};
pub use size::format_file_size;
pub use splitter::{
    ChunkOutcome, ChunkSummary, SplitReport, SplitStatus, SplitSummary, Splitter,
};

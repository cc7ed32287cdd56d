//! Page engines.
//!
//! A [`PageEngine`] turns a page range of a [`SourceDocument`] into a new,
//! standalone [`ExtractedDocument`]. Two strategies are available:
//!
//! - [`EngineKind::Copy`] builds an empty document and deep-copies the range's
//!   pages and everything they reference into it.
//! - [`EngineKind::Prune`] clones the whole source, deletes every page outside
//!   the range and drops objects that became unreachable.
//!
//! Engines live in a process-wide runtime that must be [`initialize`]d once
//! before [`resolve`] hands them out.

mod copy;
mod prune;

use std::sync::{Arc, OnceLock};

use lopdf::Document;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

pub use self::copy::CopyEngine;
pub use self::prune::PruneEngine;
use crate::document::SourceDocument;
use crate::error::{AssemblyError, Result, SplitError};
use crate::plan::PageRange;

/// Tracing target for page engines.
pub(crate) const TRACING_TARGET: &str = "nvisy_splitter::engine";

/// Strategy used to build fragment documents.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Deep-copy the range's pages into a fresh document.
    #[default]
    Copy,
    /// Clone the source and remove pages outside the range.
    Prune,
}

/// Capability interface over a page-addressable document backend.
pub trait PageEngine: Send + Sync + std::fmt::Debug {
    /// Returns which strategy this engine implements.
    fn kind(&self) -> EngineKind;

    /// Returns the number of pages the engine sees in the source.
    fn page_count(&self, source: &SourceDocument) -> usize {
        source.page_count()
    }

    /// Builds a standalone document holding only the pages in `range`.
    ///
    /// Must not mutate `source`; engines are called concurrently for
    /// different ranges of the same document.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Copy`] if the range is out of bounds or the
    /// page objects cannot be read.
    fn copy_page_range(
        &self,
        source: &SourceDocument,
        range: PageRange,
    ) -> Result<ExtractedDocument, AssemblyError>;
}

/// A standalone document produced by a [`PageEngine`], ready to serialize.
#[derive(Debug)]
pub struct ExtractedDocument {
    document: Document,
    page_count: usize,
}

impl ExtractedDocument {
    /// Wraps a document built by an engine together with its page count.
    pub fn new(document: Document, page_count: usize) -> Self {
        Self {
            document,
            page_count,
        }
    }

    /// Returns the number of pages in the extracted document.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Serializes the document into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Serialize`] if writing fails.
    pub fn serialize(mut self) -> Result<Vec<u8>, AssemblyError> {
        let mut buffer = Vec::new();
        self.document
            .save_to(&mut buffer)
            .map_err(|err| AssemblyError::Serialize(err.into()))?;
        Ok(buffer)
    }
}

/// Engines shared by every split in the process.
#[derive(Debug)]
struct EngineRuntime {
    copy: Arc<CopyEngine>,
    prune: Arc<PruneEngine>,
}

static RUNTIME: OnceLock<EngineRuntime> = OnceLock::new();

/// Initializes the process-wide engine runtime.
///
/// Idempotent: returns `true` only for the call that performed the
/// initialization.
pub fn initialize() -> bool {
    let mut initialized = false;
    RUNTIME.get_or_init(|| {
        initialized = true;
        tracing::info!(
            target: TRACING_TARGET,
            engines = ?[EngineKind::Copy, EngineKind::Prune],
            "Page engines initialized"
        );
        EngineRuntime {
            copy: Arc::new(CopyEngine::new()),
            prune: Arc::new(PruneEngine::new()),
        }
    });
    initialized
}

/// Returns whether [`initialize`] has completed.
pub fn is_ready() -> bool {
    RUNTIME.get().is_some()
}

/// Returns the engine implementing `kind`.
///
/// # Errors
///
/// Returns [`SplitError::EngineNotReady`] before [`initialize`] has run.
pub fn resolve(kind: EngineKind) -> Result<Arc<dyn PageEngine>> {
    let runtime = RUNTIME.get().ok_or(SplitError::EngineNotReady)?;
    let engine: Arc<dyn PageEngine> = match kind {
        EngineKind::Copy => runtime.copy.clone(),
        EngineKind::Prune => runtime.prune.clone(),
    };
    Ok(engine)
}

/// Looks up the source page ids for a range.
fn page_ids_in(
    source: &SourceDocument,
    range: PageRange,
) -> Result<&[lopdf::ObjectId], AssemblyError> {
    if range.is_empty() {
        return Err(AssemblyError::EmptyFragment);
    }

    source.page_ids(range).ok_or_else(|| {
        AssemblyError::copy(format!(
            "{range} is outside a document of {} pages",
            source.page_count()
        ))
    })
}

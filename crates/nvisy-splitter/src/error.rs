//! Splitter error types.

use std::borrow::Cow;

use serde::Serialize;
use strum::{AsRefStr, IntoStaticStr};

use crate::format::DocumentFormat;
use crate::plan::PageRange;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for splitter operations.
pub type Result<T, E = SplitError> = std::result::Result<T, E>;

/// Categories of [`SplitError`], used as a stable label in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input bytes are not a splittable document.
    UnsupportedFormat,
    /// Document structure could not be parsed.
    CorruptDocument,
    /// Document is encrypted and the policy rejects it.
    EncryptedUnsupported,
    /// Document has no pages.
    EmptyDocument,
    /// Configuration is invalid.
    InvalidConfig,
    /// Page engines were used before initialization.
    EngineNotReady,
    /// A single chunk could not be assembled.
    ChunkAssembly,
}

/// Error type for split operations.
///
/// Everything except [`SplitError::ChunkAssembly`] is fatal to the whole
/// operation. Chunk assembly errors are scoped to one fragment and surface
/// through [`SplitReport::failures`].
///
/// [`SplitReport::failures`]: crate::SplitReport::failures
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    /// The byte signature does not match a splittable format.
    #[error("unsupported format: {}", detected.map_or("unknown", |f| f.extension()))]
    UnsupportedFormat {
        /// Format recognised from the signature, if any.
        detected: Option<DocumentFormat>,
    },

    /// Structural parsing failed.
    #[error("corrupt document: {message}")]
    CorruptDocument {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxedError>,
    },

    /// The document requires a password and encryption markers are not ignored.
    #[error("encrypted documents are not supported")]
    EncryptedUnsupported,

    /// The document contains no pages.
    #[error("document has no pages")]
    EmptyDocument,

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    /// The page engine runtime has not been initialized.
    #[error("page engines are not initialized")]
    EngineNotReady,

    /// Copying or serializing one chunk failed.
    #[error("chunk {index} ({range}) failed: {source}")]
    ChunkAssembly {
        /// Zero-based position of the chunk in the final plan.
        index: usize,
        /// Page range the chunk covers.
        range: PageRange,
        #[source]
        source: AssemblyError,
    },
}

impl SplitError {
    /// Creates a corrupt document error with a message.
    pub fn corrupt(message: impl Into<Cow<'static, str>>) -> Self {
        Self::CorruptDocument {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a corrupt document error with a message and source.
    pub fn corrupt_with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::CorruptDocument {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::CorruptDocument { .. } => ErrorKind::CorruptDocument,
            Self::EncryptedUnsupported => ErrorKind::EncryptedUnsupported,
            Self::EmptyDocument => ErrorKind::EmptyDocument,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::EngineNotReady => ErrorKind::EngineNotReady,
            Self::ChunkAssembly { .. } => ErrorKind::ChunkAssembly,
        }
    }

    /// Returns whether the error only affects a single chunk.
    pub fn is_chunk_scoped(&self) -> bool {
        matches!(self, Self::ChunkAssembly { .. })
    }
}

/// Failure while assembling a single fragment.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// Copying pages into the fragment document failed.
    #[error("page copy failed: {message}")]
    Copy {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxedError>,
    },

    /// Serializing the fragment document failed.
    #[error("serialization failed: {0}")]
    Serialize(#[source] lopdf::Error),

    /// The fragment ended up with no pages after copying.
    #[error("fragment has no pages")]
    EmptyFragment,

    /// The assembly task panicked or was cancelled.
    #[error("assembly task failed: {0}")]
    Task(Cow<'static, str>),
}

impl AssemblyError {
    /// Creates a page copy error with a message.
    pub fn copy(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Copy {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a page copy error with a message and source.
    pub fn copy_with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Copy {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

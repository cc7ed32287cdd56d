//! Document loading.

use lopdf::{Document, ObjectId};

use crate::error::{Result, SplitError};
use crate::format::DocumentFormat;
use crate::plan::PageRange;
use crate::size::format_file_size;

/// Tracing target for document loading.
pub(crate) const TRACING_TARGET: &str = "nvisy_splitter::loader";

const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

/// Options controlling how input bytes are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Whether documents carrying encryption markers are loaded anyway.
    pub ignore_encryption_markers: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            ignore_encryption_markers: true,
        }
    }
}

/// A parsed, read-only source document.
///
/// Owns the parsed object graph and the page table in page order. Nothing in
/// this crate mutates a loaded document, so it can be shared across assembly
/// tasks behind an `Arc`.
#[derive(Debug)]
pub struct SourceDocument {
    name: String,
    format: DocumentFormat,
    document: Document,
    page_ids: Vec<ObjectId>,
    total_byte_size: u64,
    encrypted: bool,
}

impl SourceDocument {
    /// Parses input bytes into a page-addressable document.
    ///
    /// The caller's buffer is only read. `name` is the human-readable source
    /// name that fragment names are derived from.
    ///
    /// # Errors
    ///
    /// - [`SplitError::UnsupportedFormat`] if the signature is not a PDF.
    /// - [`SplitError::EncryptedUnsupported`] if encryption markers are present
    ///   and `options.ignore_encryption_markers` is false, or if the document
    ///   cannot be opened without a password.
    /// - [`SplitError::CorruptDocument`] if the structure cannot be parsed.
    pub fn load(bytes: &[u8], name: impl Into<String>, options: LoadOptions) -> Result<Self> {
        let name = name.into();

        let detected = DocumentFormat::sniff(bytes);
        let format = detected
            .filter(DocumentFormat::is_splittable)
            .ok_or(SplitError::UnsupportedFormat { detected })?;

        let has_marker = contains_encrypt_marker(bytes);
        let document = match Document::load_mem(bytes) {
            Ok(document) => document,
            Err(err) if has_marker && !options.ignore_encryption_markers => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    name = %name,
                    error = %err,
                    "Encrypted document failed to parse"
                );
                return Err(SplitError::EncryptedUnsupported);
            }
            Err(err) => {
                return Err(SplitError::corrupt_with_source(
                    "failed to parse document structure",
                    err,
                ));
            }
        };

        // lopdf only decrypts documents whose user password is empty; anything
        // else parses into a bare encryption dictionary.
        if document.trailer.has(b"Encrypt") && document.encryption_state.is_none() {
            tracing::debug!(
                target: TRACING_TARGET,
                name = %name,
                "Document requires a password"
            );
            return Err(SplitError::EncryptedUnsupported);
        }

        let encrypted = has_marker || document.trailer.has(b"Encrypt");
        if encrypted && !options.ignore_encryption_markers {
            return Err(SplitError::EncryptedUnsupported);
        }

        document
            .catalog()
            .map_err(|err| SplitError::corrupt_with_source("document catalog is missing", err))?;

        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        let total_byte_size = bytes.len() as u64;

        tracing::debug!(
            target: TRACING_TARGET,
            name = %name,
            version = %document.version,
            page_count = page_ids.len(),
            size = %format_file_size(total_byte_size),
            encrypted,
            "Loaded source document"
        );

        if encrypted {
            tracing::warn!(
                target: TRACING_TARGET,
                name = %name,
                "Ignoring encryption markers on source document"
            );
        }

        Ok(Self {
            name,
            format,
            document,
            page_ids,
            total_byte_size,
            encrypted,
        })
    }

    /// Returns the human-readable source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the detected document format.
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Returns the number of pages.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Returns the size of the original serialized input in bytes.
    pub fn total_byte_size(&self) -> u64 {
        self.total_byte_size
    }

    /// Returns whether the input carried encryption markers.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Returns the average bytes per page, or zero for an empty document.
    pub fn avg_page_size(&self) -> f64 {
        if self.page_ids.is_empty() {
            return 0.0;
        }
        self.total_byte_size as f64 / self.page_ids.len() as f64
    }

    /// Returns the parsed object graph.
    pub(crate) fn document(&self) -> &Document {
        &self.document
    }

    /// Returns the page object ids for a range, or `None` if out of bounds.
    pub(crate) fn page_ids(&self, range: PageRange) -> Option<&[ObjectId]> {
        self.page_ids.get(range.indices())
    }
}

fn contains_encrypt_marker(bytes: &[u8]) -> bool {
    bytes
        .windows(ENCRYPT_MARKER.len())
        .any(|window| window == ENCRYPT_MARKER)
}

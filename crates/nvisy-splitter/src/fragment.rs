//! Fragment assembly.

use std::ffi::OsStr;
use std::path::Path;

use bytes::Bytes;

use crate::document::SourceDocument;
use crate::engine::PageEngine;
use crate::error::AssemblyError;
use crate::plan::PageRange;
use crate::size::format_file_size;

/// Tracing target for fragment assembly.
pub(crate) const TRACING_TARGET: &str = "nvisy_splitter::assembler";

/// Name used when the source name has no usable stem.
const FALLBACK_STEM: &str = "document";

/// One standalone output document covering a contiguous page range.
///
/// The content is the fragment's own serialization and shares nothing with
/// the source document.
#[derive(Debug, Clone)]
pub struct Fragment {
    name: String,
    range: PageRange,
    page_count: usize,
    content: Bytes,
}

impl Fragment {
    /// Returns the derived file name, e.g. `report_part2.pdf`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the source page range the fragment covers.
    pub fn range(&self) -> PageRange {
        self.range
    }

    /// Returns the number of pages in the fragment.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Returns the measured size of the serialized fragment.
    pub fn byte_size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Returns the serialized fragment.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Consumes the fragment, returning its serialized bytes.
    pub fn into_content(self) -> Bytes {
        self.content
    }
}

/// A serialized chunk that has not been named yet.
///
/// Ordinals are only final once refinement is done, so naming happens last.
#[derive(Debug)]
pub(crate) struct AssembledChunk {
    pub(crate) page_count: usize,
    pub(crate) content: Bytes,
}

impl AssembledChunk {
    pub(crate) fn byte_size(&self) -> u64 {
        self.content.len() as u64
    }

    pub(crate) fn into_fragment(self, name: String, range: PageRange) -> Fragment {
        Fragment {
            name,
            range,
            page_count: self.page_count,
            content: self.content,
        }
    }
}

/// Assembles and names the fragment for one range.
///
/// `ordinal` is the one-based position of the fragment in the output.
///
/// # Errors
///
/// Returns an [`AssemblyError`] if copying or serializing fails, or if the
/// fragment ends up without pages.
pub fn assemble(
    engine: &dyn PageEngine,
    source: &SourceDocument,
    range: PageRange,
    ordinal: usize,
) -> Result<Fragment, AssemblyError> {
    let chunk = assemble_chunk(engine, source, range)?;
    let name = fragment_name(source.name(), ordinal, source.format().extension());
    Ok(chunk.into_fragment(name, range))
}

/// Copies the range into a new document and serializes it.
#[tracing::instrument(
    skip(engine, source),
    fields(engine = %engine.kind(), %range),
    target = TRACING_TARGET,
    name = "assemble_chunk",
    level = "debug"
)]
pub(crate) fn assemble_chunk(
    engine: &dyn PageEngine,
    source: &SourceDocument,
    range: PageRange,
) -> Result<AssembledChunk, AssemblyError> {
    let extracted = engine.copy_page_range(source, range)?;
    let page_count = extracted.page_count();
    if page_count == 0 {
        return Err(AssemblyError::EmptyFragment);
    }

    let content = Bytes::from(extracted.serialize()?);

    tracing::debug!(
        target: TRACING_TARGET,
        page_count,
        size = %format_file_size(content.len() as u64),
        "Assembled chunk"
    );

    Ok(AssembledChunk {
        page_count,
        content,
    })
}

/// Derives `<stem>_part<ordinal>.<extension>` from a source name.
///
/// Directory components and the last extension of `source_name` are dropped.
/// A bare extension such as `.pdf` has no stem and maps to `document`.
pub fn fragment_name(source_name: &str, ordinal: usize, extension: &str) -> String {
    let path = Path::new(source_name);
    let stem = path
        .file_stem()
        .filter(|&stem| !is_bare_extension(path, stem))
        .map(|stem| stem.to_string_lossy())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(FALLBACK_STEM.into());

    format!("{stem}_part{ordinal}.{extension}")
}

/// Returns whether a dotfile name like `.pdf` is really just an extension.
fn is_bare_extension(path: &Path, stem: &OsStr) -> bool {
    path.extension().is_none() && stem.as_encoded_bytes().starts_with(b".")
}

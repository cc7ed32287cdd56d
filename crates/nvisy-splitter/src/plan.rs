//! Partition planning.
//!
//! The planner estimates a per-page byte cost from the source size and page
//! count, then groups pages into equally wide contiguous ranges. The estimate
//! is an average: fragments built from image-heavy pages can still exceed the
//! budget, which is what [`ChunkPlan::refine`] exists for.

use std::fmt;
use std::ops::Range;

use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};
use crate::size::format_file_size;

/// Tracing target for planning.
pub(crate) const TRACING_TARGET: &str = "nvisy_splitter::planner";

/// Half-open range of zero-based page indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRange {
    /// First page index (inclusive).
    pub start: usize,
    /// One past the last page index.
    pub end: usize,
}

impl PageRange {
    /// Creates a new page range.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the number of pages in the range.
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns whether the range covers no pages.
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Returns whether the page index falls inside the range.
    pub const fn contains(&self, page: usize) -> bool {
        page >= self.start && page < self.end
    }

    /// Returns the page indices as a standard range.
    pub const fn indices(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for PageRange {
    /// Formats the range with one-based, inclusive page numbers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == 1 {
            write!(f, "page {}", self.start + 1)
        } else {
            write!(f, "pages {}-{}", self.start + 1, self.end)
        }
    }
}

/// Ordered, contiguous partition of a document's pages.
///
/// Ranges are non-empty, ascending and cover `[0, page_count)` exactly once.
/// Dereferences to the slice of ranges.
#[derive(Debug, Clone, PartialEq, Deref, Serialize)]
pub struct ChunkPlan {
    page_count: usize,
    total_byte_size: u64,
    max_chunk_bytes: u64,
    avg_page_size: f64,
    pages_per_chunk: usize,
    #[deref]
    ranges: Vec<PageRange>,
}

impl ChunkPlan {
    /// Plans contiguous chunks using the average-page-size heuristic.
    ///
    /// `pages_per_chunk` is `floor(max_chunk_bytes / avg_page_size)` clamped
    /// to `[1, page_count]`; a page estimated above the budget still gets a
    /// chunk of its own. A zero-byte source plans a single chunk.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::EmptyDocument`] when `page_count` is zero and
    /// [`SplitError::InvalidConfig`] when `max_chunk_bytes` is zero.
    pub fn new(page_count: usize, total_byte_size: u64, max_chunk_bytes: u64) -> Result<Self> {
        if page_count == 0 {
            return Err(SplitError::EmptyDocument);
        }

        if max_chunk_bytes == 0 {
            return Err(SplitError::invalid_config("maximum chunk size must be positive"));
        }

        let avg_page_size = total_byte_size as f64 / page_count as f64;
        let pages_per_chunk = pages_per_chunk(avg_page_size, max_chunk_bytes, page_count);
        let ranges = partition(PageRange::new(0, page_count), pages_per_chunk);

        tracing::info!(
            target: TRACING_TARGET,
            source_size = %format_file_size(total_byte_size),
            page_count,
            avg_page_size = %format_file_size(avg_page_size as u64),
            max_chunk_size = %format_file_size(max_chunk_bytes),
            pages_per_chunk,
            total_chunks = ranges.len(),
            "Planned document split"
        );

        Ok(Self {
            page_count,
            total_byte_size,
            max_chunk_bytes,
            avg_page_size,
            pages_per_chunk,
            ranges,
        })
    }

    /// Re-plans one range from its measured fragment size.
    ///
    /// Multi-page ranges always come back as at least two sub-ranges, so
    /// repeated refinement terminates at single pages. A single-page range is
    /// returned unchanged.
    pub fn refine(range: PageRange, measured_bytes: u64, max_chunk_bytes: u64) -> Vec<PageRange> {
        let len = range.len();
        if len <= 1 {
            return vec![range];
        }

        let avg_page_size = measured_bytes as f64 / len as f64;
        let width = pages_per_chunk(avg_page_size, max_chunk_bytes.max(1), len).min(len - 1);
        let ranges = partition(range, width);

        tracing::debug!(
            target: TRACING_TARGET,
            %range,
            measured_size = %format_file_size(measured_bytes),
            pages_per_chunk = width,
            sub_ranges = ranges.len(),
            "Refined oversized range"
        );

        ranges
    }

    /// Builds a plan from already computed ranges, keeping the heuristic inputs.
    pub(crate) fn with_ranges(&self, ranges: Vec<PageRange>) -> Self {
        Self {
            ranges,
            ..self.clone()
        }
    }

    /// Returns the number of pages in the planned document.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Returns the source size the estimate was derived from.
    pub fn total_byte_size(&self) -> u64 {
        self.total_byte_size
    }

    /// Returns the configured byte budget per fragment.
    pub fn max_chunk_bytes(&self) -> u64 {
        self.max_chunk_bytes
    }

    /// Returns the estimated bytes per page.
    pub fn avg_page_size(&self) -> f64 {
        self.avg_page_size
    }

    /// Returns the planned width of each chunk; the last one may be narrower.
    pub fn pages_per_chunk(&self) -> usize {
        self.pages_per_chunk
    }

    /// Returns the number of planned chunks.
    pub fn total_chunks(&self) -> usize {
        self.ranges.len()
    }

    /// Returns the planned ranges in ascending order.
    pub fn ranges(&self) -> &[PageRange] {
        &self.ranges
    }
}

/// Computes the chunk width, clamped to `[1, max_width]`.
fn pages_per_chunk(avg_page_size: f64, max_chunk_bytes: u64, max_width: usize) -> usize {
    if avg_page_size <= 0.0 {
        return max_width;
    }

    let width = (max_chunk_bytes as f64 / avg_page_size).floor();
    if width >= max_width as f64 {
        max_width
    } else {
        (width as usize).max(1)
    }
}

/// Splits a range into consecutive sub-ranges of `width` pages.
fn partition(range: PageRange, width: usize) -> Vec<PageRange> {
    let width = width.max(1);
    (range.start..range.end)
        .step_by(width)
        .map(|start| PageRange::new(start, (start + width).min(range.end)))
        .collect()
}

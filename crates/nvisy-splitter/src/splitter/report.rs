//! Split results.

use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::error::{AssemblyError, ErrorKind, SplitError};
use crate::fragment::Fragment;
use crate::plan::{ChunkPlan, PageRange};

/// Overall outcome of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SplitStatus {
    /// Every chunk produced a fragment.
    Complete,
    /// Some chunks failed, some produced fragments.
    Partial,
    /// No chunk produced a fragment.
    Failed,
}

/// Result of assembling one planned chunk.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// Zero-based position in the final plan.
    pub index: usize,
    /// Source pages the chunk covers.
    pub range: PageRange,
    /// The fragment, or why it could not be built.
    pub result: Result<Fragment, AssemblyError>,
}

impl ChunkOutcome {
    /// Returns the fragment if assembly succeeded.
    pub fn fragment(&self) -> Option<&Fragment> {
        self.result.as_ref().ok()
    }

    /// Returns the failure if assembly failed.
    pub fn error(&self) -> Option<&AssemblyError> {
        self.result.as_ref().err()
    }

    /// Returns whether assembly succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Converts a failed outcome into a chunk-scoped [`SplitError`].
    pub fn into_error(self) -> Option<SplitError> {
        self.result.err().map(|source| SplitError::ChunkAssembly {
            index: self.index,
            range: self.range,
            source,
        })
    }
}

/// Ordered per-chunk outcomes of one split request.
#[derive(Debug)]
pub struct SplitReport {
    source_name: String,
    plan: ChunkPlan,
    outcomes: Vec<ChunkOutcome>,
    refined_chunks: usize,
}

impl SplitReport {
    pub(crate) fn new(
        source_name: String,
        plan: ChunkPlan,
        outcomes: Vec<ChunkOutcome>,
        refined_chunks: usize,
    ) -> Self {
        Self {
            source_name,
            plan,
            outcomes,
            refined_chunks,
        }
    }

    /// Returns the source name fragments were named after.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Returns the final plan, including refined ranges.
    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    /// Returns every chunk outcome in page order.
    pub fn outcomes(&self) -> &[ChunkOutcome] {
        &self.outcomes
    }

    /// Returns how many planned chunks were re-split for exceeding the budget.
    pub fn refined_chunks(&self) -> usize {
        self.refined_chunks
    }

    /// Returns the overall status.
    pub fn status(&self) -> SplitStatus {
        let succeeded = self.outcomes.iter().filter(|o| o.is_success()).count();
        match succeeded {
            0 => SplitStatus::Failed,
            n if n == self.outcomes.len() => SplitStatus::Complete,
            _ => SplitStatus::Partial,
        }
    }

    /// Returns the produced fragments in page order.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.outcomes.iter().filter_map(ChunkOutcome::fragment)
    }

    /// Returns the failed chunk outcomes in page order.
    pub fn failures(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    /// Returns the combined size of all produced fragments.
    pub fn total_fragment_bytes(&self) -> u64 {
        self.fragments().map(Fragment::byte_size).sum()
    }

    /// Returns the fragments whose measured size exceeds the budget.
    pub fn oversized_fragments(&self) -> impl Iterator<Item = &Fragment> {
        let budget = self.plan.max_chunk_bytes();
        self.fragments()
            .filter(move |fragment| fragment.byte_size() > budget)
    }

    /// Splits the report into fragments and chunk-scoped errors.
    pub fn into_parts(self) -> (Vec<Fragment>, Vec<SplitError>) {
        let mut fragments = Vec::new();
        let mut errors = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(fragment) => fragments.push(fragment),
                Err(source) => errors.push(SplitError::ChunkAssembly {
                    index: outcome.index,
                    range: outcome.range,
                    source,
                }),
            }
        }
        (fragments, errors)
    }

    /// Returns the fragments, dropping failures.
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.into_parts().0
    }

    /// Turns a total failure into an error, keeping partial successes.
    ///
    /// # Errors
    ///
    /// Returns the first chunk failure when no fragment was produced.
    pub fn into_result(self) -> Result<Self, SplitError> {
        if self.status() != SplitStatus::Failed {
            return Ok(self);
        }

        self.outcomes
            .into_iter()
            .find_map(ChunkOutcome::into_error)
            .map_or(Err(SplitError::EmptyDocument), Err)
    }

    /// Returns a serializable summary without fragment contents.
    pub fn summary(&self) -> SplitSummary {
        SplitSummary {
            source: self.source_name.clone(),
            status: self.status(),
            page_count: self.plan.page_count(),
            source_byte_size: self.plan.total_byte_size(),
            max_chunk_bytes: self.plan.max_chunk_bytes(),
            avg_page_size: self.plan.avg_page_size(),
            pages_per_chunk: self.plan.pages_per_chunk(),
            refined_chunks: self.refined_chunks,
            chunks: self.outcomes.iter().map(ChunkSummary::from).collect(),
        }
    }
}

/// Serializable overview of a [`SplitReport`].
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub source: String,
    pub status: SplitStatus,
    pub page_count: usize,
    pub source_byte_size: u64,
    pub max_chunk_bytes: u64,
    pub avg_page_size: f64,
    pub pages_per_chunk: usize,
    pub refined_chunks: usize,
    pub chunks: Vec<ChunkSummary>,
}

/// Serializable overview of one [`ChunkOutcome`].
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub index: usize,
    pub range: PageRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ChunkOutcome> for ChunkSummary {
    fn from(outcome: &ChunkOutcome) -> Self {
        Self {
            index: outcome.index,
            range: outcome.range,
            name: outcome.fragment().map(|f| f.name().to_owned()),
            byte_size: outcome.fragment().map(Fragment::byte_size),
            error_kind: outcome.error().map(|_| ErrorKind::ChunkAssembly),
            error: outcome.error().map(ToString::to_string),
        }
    }
}

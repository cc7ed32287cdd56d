//! Split orchestration.
//!
//! A [`Splitter`] loads the source once, plans the chunk ranges and assembles
//! every range on the blocking pool. Chunks are independent: at most
//! `max_concurrent_chunks` are assembled at a time and the report lists them
//! in page order whatever order they finished in.

mod report;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub use self::report::{ChunkOutcome, ChunkSummary, SplitReport, SplitStatus, SplitSummary};
use crate::config::SplitterConfig;
use crate::document::{LoadOptions, SourceDocument};
use crate::engine::{self, PageEngine};
use crate::error::{AssemblyError, Result, SplitError};
use crate::fragment::{AssembledChunk, assemble_chunk, fragment_name};
use crate::plan::{ChunkPlan, PageRange};
use crate::size::format_file_size;

/// Tracing target for split orchestration.
pub(crate) const TRACING_TARGET: &str = "nvisy_splitter::splitter";

type ChunkResult = std::result::Result<AssembledChunk, AssemblyError>;

/// Splits documents into size-bounded fragments.
#[derive(Debug, Clone)]
pub struct Splitter {
    config: SplitterConfig,
    engine: Arc<dyn PageEngine>,
}

impl Splitter {
    /// Creates a splitter using the engine selected in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::InvalidConfig`] if the configuration is invalid
    /// and [`SplitError::EngineNotReady`] if [`engine::initialize`] has not
    /// run yet.
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate()?;
        let engine = engine::resolve(config.engine)?;
        Ok(Self { config, engine })
    }

    /// Creates a splitter with an explicit page engine.
    ///
    /// The `engine` field of `config` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::InvalidConfig`] if the configuration is invalid.
    pub fn from_engine(config: SplitterConfig, engine: Arc<dyn PageEngine>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, engine })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Splits a document into fragments.
    ///
    /// `name` is only used to derive fragment names. Fatal errors (format,
    /// parsing, encryption policy, empty document) abort the whole split;
    /// per-chunk failures are reported in the returned [`SplitReport`].
    ///
    /// # Errors
    ///
    /// Returns a [`SplitError`] if the document cannot be loaded or planned.
    pub async fn split(
        &self,
        bytes: impl Into<Bytes>,
        name: impl Into<String>,
    ) -> Result<SplitReport> {
        let bytes: Bytes = bytes.into();
        let name = name.into();

        tracing::info!(
            target: TRACING_TARGET,
            source = %name,
            size = %format_file_size(bytes.len() as u64),
            engine = %self.engine.kind(),
            "Splitting document"
        );

        let (source, plan) = self.load_and_plan(bytes, name).await?;
        let source = Arc::new(source);
        let (slots, refined_chunks) = self.assemble_plan(&source, &plan).await;
        Ok(self.finish(&source, &plan, slots, refined_chunks))
    }

    /// Loads a document and plans its chunks without assembling anything.
    ///
    /// # Errors
    ///
    /// Returns a [`SplitError`] if the document cannot be loaded or planned.
    pub async fn plan(&self, bytes: impl Into<Bytes>, name: impl Into<String>) -> Result<ChunkPlan> {
        let (_, plan) = self.load_and_plan(bytes.into(), name.into()).await?;
        Ok(plan)
    }

    async fn load_and_plan(&self, bytes: Bytes, name: String) -> Result<(SourceDocument, ChunkPlan)> {
        let options = LoadOptions {
            ignore_encryption_markers: self.config.ignore_encryption_markers,
        };
        let max_chunk_bytes = self.config.max_chunk_bytes;

        tokio::task::spawn_blocking(move || {
            let source = SourceDocument::load(&bytes, name, options)?;
            let plan = ChunkPlan::new(source.page_count(), source.total_byte_size(), max_chunk_bytes)?;
            Ok::<_, SplitError>((source, plan))
        })
        .await
        .map_err(|err| SplitError::corrupt_with_source("document parsing aborted", err))?
    }

    /// Assembles every planned range, re-splitting oversized ones if enabled.
    async fn assemble_plan(
        &self,
        source: &Arc<SourceDocument>,
        plan: &ChunkPlan,
    ) -> (Vec<Slot>, usize) {
        let max_chunk_bytes = self.config.max_chunk_bytes;
        let mut slots = plan.iter().copied().map(Slot::pending).collect::<Vec<_>>();
        let mut refined_chunks = 0;

        loop {
            let pending = slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.result.is_none())
                .map(|(index, slot)| (index, slot.range))
                .collect::<Vec<_>>();

            if pending.is_empty() {
                break;
            }

            for (index, result) in self.assemble_ranges(source, &pending).await {
                slots[index].result = Some(result);
            }

            for &(index, _) in &pending {
                slots[index].result.get_or_insert_with(|| {
                    Err(AssemblyError::Task("assembly task produced no result".into()))
                });
            }

            if !self.config.refine_oversized {
                break;
            }

            let mut next = Vec::with_capacity(slots.len());
            for slot in slots {
                let measured = match &slot.result {
                    Some(Ok(chunk)) if slot.range.len() > 1 => chunk.byte_size(),
                    _ => 0,
                };

                if measured <= max_chunk_bytes {
                    next.push(slot);
                    continue;
                }

                let sub_ranges = ChunkPlan::refine(slot.range, measured, max_chunk_bytes);
                tracing::warn!(
                    target: TRACING_TARGET,
                    range = %slot.range,
                    size = %format_file_size(measured),
                    max_chunk_size = %format_file_size(max_chunk_bytes),
                    sub_ranges = sub_ranges.len(),
                    "Fragment exceeds size budget, re-splitting"
                );

                refined_chunks += 1;
                next.extend(sub_ranges.into_iter().map(Slot::pending));
            }
            slots = next;
        }

        (slots, refined_chunks)
    }

    /// Assembles the given ranges concurrently, returning results keyed by slot.
    async fn assemble_ranges(
        &self,
        source: &Arc<SourceDocument>,
        pending: &[(usize, PageRange)],
    ) -> Vec<(usize, ChunkResult)> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_chunks));
        let mut tasks = JoinSet::new();
        let mut results = Vec::with_capacity(pending.len());

        for &(index, range) in pending {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                tracing::error!(target: TRACING_TARGET, "Semaphore closed, skipping chunk");
                results.push((index, Err(AssemblyError::Task("semaphore closed".into()))));
                continue;
            };

            let engine = self.engine.clone();
            let source = source.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    assemble_chunk(engine.as_ref(), &source, range)
                }))
                .unwrap_or_else(|payload| Err(AssemblyError::Task(panic_message(payload).into())));
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        error = %err,
                        "Assembly task did not complete"
                    );
                }
            }
        }

        results
    }

    /// Names the fragments by final position and builds the report.
    fn finish(
        &self,
        source: &SourceDocument,
        plan: &ChunkPlan,
        slots: Vec<Slot>,
        refined_chunks: usize,
    ) -> SplitReport {
        let extension = source.format().extension();
        let ranges = slots.iter().map(|slot| slot.range).collect::<Vec<_>>();

        let outcomes = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                let result = slot
                    .result
                    .unwrap_or_else(|| Err(AssemblyError::Task("chunk was never assembled".into())))
                    .map(|chunk| {
                        let name = fragment_name(source.name(), index + 1, extension);
                        chunk.into_fragment(name, slot.range)
                    });

                if let Err(err) = &result {
                    tracing::error!(
                        target: TRACING_TARGET,
                        index,
                        range = %slot.range,
                        error = %err,
                        "Failed to assemble chunk"
                    );
                }

                ChunkOutcome {
                    index,
                    range: slot.range,
                    result,
                }
            })
            .collect();

        let report = SplitReport::new(
            source.name().to_owned(),
            plan.with_ranges(ranges),
            outcomes,
            refined_chunks,
        );

        tracing::info!(
            target: TRACING_TARGET,
            source = %report.source_name(),
            status = %report.status(),
            fragments = report.fragments().count(),
            failures = report.failures().count(),
            oversized = report.oversized_fragments().count(),
            refined_chunks,
            total_size = %format_file_size(report.total_fragment_bytes()),
            "Split finished"
        );

        report
    }
}

/// A planned range and, once assembled, its result.
#[derive(Debug)]
struct Slot {
    range: PageRange,
    result: Option<ChunkResult>,
}

impl Slot {
    fn pending(range: PageRange) -> Self {
        Self {
            range,
            result: None,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CopyEngine, EngineKind, ExtractedDocument};
    use crate::fixtures;
    use crate::fragment::Fragment;

    /// Delegates to the copy engine but fails one range.
    #[derive(Debug)]
    struct FailingEngine {
        failing: PageRange,
        inner: CopyEngine,
    }

    impl PageEngine for FailingEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Copy
        }

        fn copy_page_range(
            &self,
            source: &SourceDocument,
            range: PageRange,
        ) -> std::result::Result<ExtractedDocument, AssemblyError> {
            if range == self.failing {
                return Err(AssemblyError::copy("broken content stream"));
            }
            self.inner.copy_page_range(source, range)
        }
    }

    #[derive(Debug)]
    struct PanickingEngine;

    impl PageEngine for PanickingEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Copy
        }

        fn copy_page_range(
            &self,
            _source: &SourceDocument,
            _range: PageRange,
        ) -> std::result::Result<ExtractedDocument, AssemblyError> {
            panic!("engine exploded");
        }
    }

    fn splitter(config: SplitterConfig) -> Splitter {
        engine::initialize();
        Splitter::new(config).unwrap()
    }

    fn all_markers(report: &SplitReport) -> Vec<String> {
        report
            .fragments()
            .flat_map(|fragment| fixtures::page_markers(fragment.content()))
            .collect()
    }

    #[tokio::test]
    async fn test_large_pages_get_one_chunk_each() {
        let bytes = fixtures::text_pdf(10);
        // Budget just above the average page size.
        let budget = bytes.len() as u64 / 10 + 1;
        let report = splitter(SplitterConfig::new(budget))
            .split(bytes, "scan.pdf")
            .await
            .unwrap();

        assert_eq!(report.status(), SplitStatus::Complete);
        assert_eq!(report.plan().pages_per_chunk(), 1);
        assert_eq!(report.fragments().count(), 10);
        assert!(report.fragments().all(|fragment| fragment.page_count() == 1));
        assert_eq!(all_markers(&report), fixtures::expected_markers(0, 10));
    }

    #[tokio::test]
    async fn test_small_pages_are_grouped() {
        let bytes = fixtures::text_pdf(10);
        // Budget just above five average pages.
        let budget = bytes.len() as u64 / 2 + 1;
        let report = splitter(SplitterConfig::new(budget))
            .split(bytes, "report.pdf")
            .await
            .unwrap();

        assert_eq!(report.plan().pages_per_chunk(), 5);
        let fragments = report.fragments().collect::<Vec<_>>();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].name(), "report_part1.pdf");
        assert_eq!(fragments[1].name(), "report_part2.pdf");
        assert_eq!(fragments[0].range(), PageRange::new(0, 5));
        assert_eq!(
            fixtures::page_markers(fragments[1].content()),
            fixtures::expected_markers(5, 10)
        );
    }

    #[tokio::test]
    async fn test_order_is_preserved_under_concurrency() {
        let bytes = fixtures::text_pdf(24);
        let config = SplitterConfig::new(1).with_max_concurrent_chunks(3);
        let report = splitter(config).split(bytes, "many.pdf").await.unwrap();

        assert_eq!(report.outcomes().len(), 24);
        for (position, outcome) in report.outcomes().iter().enumerate() {
            assert_eq!(outcome.index, position);
            assert_eq!(outcome.range, PageRange::new(position, position + 1));
        }
        assert_eq!(all_markers(&report), fixtures::expected_markers(0, 24));
    }

    #[tokio::test]
    async fn test_single_page_document() {
        let bytes = fixtures::text_pdf(1);
        let report = splitter(SplitterConfig::new(1))
            .split(bytes, "one.pdf")
            .await
            .unwrap();

        let fragments = report.into_fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].page_count(), 1);
        assert_eq!(fragments[0].name(), "one_part1.pdf");
    }

    #[tokio::test]
    async fn test_whole_document_fits() {
        let bytes = fixtures::text_pdf(7);
        let report = splitter(SplitterConfig::default())
            .split(bytes, "small.pdf")
            .await
            .unwrap();

        assert_eq!(report.plan().ranges(), &[PageRange::new(0, 7)]);
        assert_eq!(all_markers(&report), fixtures::expected_markers(0, 7));
    }

    #[tokio::test]
    async fn test_oversized_fragment_is_kept_without_refinement() {
        let bytes = fixtures::padded_pdf(&[0, 0, 0, 0, 0, 0, 0, 60_000]);
        let report = splitter(SplitterConfig::new(20_000))
            .split(bytes, "heavy.pdf")
            .await
            .unwrap();

        assert_eq!(report.status(), SplitStatus::Complete);
        assert_eq!(report.refined_chunks(), 0);
        assert_eq!(report.fragments().count(), 4);
        assert_eq!(report.oversized_fragments().count(), 1);
    }

    #[tokio::test]
    async fn test_refinement_splits_oversized_fragments() {
        let bytes = fixtures::padded_pdf(&[0, 0, 0, 0, 0, 0, 0, 60_000]);
        let config = SplitterConfig::new(20_000).with_refine_oversized(true);
        let report = splitter(config).split(bytes, "heavy.pdf").await.unwrap();

        assert_eq!(report.refined_chunks(), 1);
        assert_eq!(report.fragments().count(), 5);
        assert_eq!(
            report.plan().ranges().last(),
            Some(&PageRange::new(7, 8))
        );
        // The single heavy page cannot be split any further.
        assert_eq!(report.oversized_fragments().count(), 1);
        assert_eq!(all_markers(&report), fixtures::expected_markers(0, 8));

        let names = report.fragments().map(Fragment::name).collect::<Vec<_>>();
        assert_eq!(names.last(), Some(&"heavy_part5.pdf"));
    }

    #[tokio::test]
    async fn test_engines_produce_same_pages() {
        let bytes = Bytes::from(fixtures::nested_pdf(&[3, 2, 4]));
        let budget = bytes.len() as u64 / 3;

        let mut markers = Vec::new();
        for kind in [EngineKind::Copy, EngineKind::Prune] {
            let config = SplitterConfig::new(budget).with_engine(kind);
            let report = splitter(config).split(bytes.clone(), "tree.pdf").await.unwrap();
            assert_eq!(report.status(), SplitStatus::Complete);
            markers.push(all_markers(&report));
        }

        assert_eq!(markers[0], fixtures::expected_markers(0, 9));
        assert_eq!(markers[0], markers[1]);
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_its_ordinal() {
        let engine = Arc::new(FailingEngine {
            failing: PageRange::new(2, 4),
            inner: CopyEngine::new(),
        });
        let bytes = fixtures::text_pdf(6);
        let budget = bytes.len() as u64 / 3 + 1;
        let splitter = Splitter::from_engine(SplitterConfig::new(budget), engine).unwrap();
        let report = splitter.split(bytes, "mixed.pdf").await.unwrap();

        assert_eq!(report.status(), SplitStatus::Partial);
        let failures = report.failures().collect::<Vec<_>>();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].range, PageRange::new(2, 4));

        let names = report.fragments().map(Fragment::name).collect::<Vec<_>>();
        assert_eq!(names, ["mixed_part1.pdf", "mixed_part3.pdf"]);

        let (fragments, errors) = report.into_parts();
        assert_eq!(fragments.len(), 2);
        assert!(matches!(
            errors.as_slice(),
            [SplitError::ChunkAssembly { index: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn test_panicking_engine_fails_every_chunk() {
        let bytes = fixtures::text_pdf(3);
        let splitter =
            Splitter::from_engine(SplitterConfig::new(1), Arc::new(PanickingEngine)).unwrap();
        let report = splitter.split(bytes, "doomed.pdf").await.unwrap();

        assert_eq!(report.status(), SplitStatus::Failed);
        assert_eq!(report.failures().count(), 3);
        assert!(
            report
                .failures()
                .all(|outcome| matches!(outcome.error(), Some(AssemblyError::Task(_))))
        );

        let err = report.into_result().unwrap_err();
        assert!(err.is_chunk_scoped());
        assert!(err.to_string().contains("engine exploded"));
    }

    #[tokio::test]
    async fn test_fatal_errors_abort_the_split() {
        let lenient = splitter(SplitterConfig::default());

        let err = lenient.split(&b"plain text"[..], "a.txt").await.unwrap_err();
        assert!(matches!(err, SplitError::UnsupportedFormat { detected: None }));

        let err = lenient.split(fixtures::empty_pdf(), "empty.pdf").await.unwrap_err();
        assert!(matches!(err, SplitError::EmptyDocument));

        let strict = splitter(SplitterConfig::default().with_ignore_encryption_markers(false));
        let err = strict
            .split(fixtures::encrypted_marker_pdf(2), "locked.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::EncryptedUnsupported));
    }

    #[tokio::test]
    async fn test_encryption_markers_are_ignored_by_default() {
        let report = splitter(SplitterConfig::default())
            .split(fixtures::encrypted_marker_pdf(2), "locked.pdf")
            .await
            .unwrap();
        assert_eq!(report.status(), SplitStatus::Complete);
    }

    #[tokio::test]
    async fn test_encrypted_source_splits_into_plain_fragments() {
        let bytes = Bytes::from(fixtures::encrypted_pdf(4, ""));

        for kind in [EngineKind::Copy, EngineKind::Prune] {
            let report = splitter(SplitterConfig::new(1).with_engine(kind))
                .split(bytes.clone(), "locked.pdf")
                .await
                .unwrap();
            assert_eq!(report.status(), SplitStatus::Complete);
            assert_eq!(report.fragments().count(), 4);
            assert_eq!(all_markers(&report), fixtures::expected_markers(0, 4));

            for fragment in report.fragments() {
                let document = lopdf::Document::load_mem(fragment.content()).unwrap();
                assert!(!document.trailer.has(b"Encrypt"));
            }
        }

        let strict = splitter(SplitterConfig::new(1).with_ignore_encryption_markers(false));
        let err = strict.split(bytes, "locked.pdf").await.unwrap_err();
        assert!(matches!(err, SplitError::EncryptedUnsupported));
    }

    #[tokio::test]
    async fn test_password_protected_source_is_rejected() {
        let err = splitter(SplitterConfig::default())
            .split(fixtures::encrypted_pdf(2, "secret"), "locked.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::EncryptedUnsupported));
    }

    #[tokio::test]
    async fn test_prune_engine_handles_long_documents() {
        let bytes = fixtures::text_pdf(300);
        let config = SplitterConfig::new(1).with_engine(EngineKind::Prune);
        let report = splitter(config).split(bytes, "long.pdf").await.unwrap();

        assert_eq!(report.status(), SplitStatus::Complete);
        assert_eq!(report.fragments().count(), 300);
        assert_eq!(all_markers(&report), fixtures::expected_markers(0, 300));
    }

    #[tokio::test]
    async fn test_plan_matches_split() {
        let bytes = Bytes::from(fixtures::text_pdf(9));
        let budget = bytes.len() as u64 / 3 + 1;
        let splitter = splitter(SplitterConfig::new(budget));

        let plan = splitter.plan(bytes.clone(), "nine.pdf").await.unwrap();
        let report = splitter.split(bytes, "nine.pdf").await.unwrap();
        assert_eq!(plan.ranges(), report.plan().ranges());
        assert_eq!(plan.total_chunks(), 3);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        engine::initialize();
        assert!(matches!(
            Splitter::new(SplitterConfig::new(0)),
            Err(SplitError::InvalidConfig(_))
        ));
        assert!(matches!(
            Splitter::new(SplitterConfig::default().with_max_concurrent_chunks(0)),
            Err(SplitError::InvalidConfig(_))
        ));
        assert!(matches!(
            Splitter::new(SplitterConfig::default().with_max_concurrent_chunks(usize::MAX)),
            Err(SplitError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_serializes_without_content() {
        let engine = Arc::new(FailingEngine {
            failing: PageRange::new(0, 1),
            inner: CopyEngine::new(),
        });
        let splitter = Splitter::from_engine(SplitterConfig::new(1), engine).unwrap();
        let report = splitter.split(fixtures::text_pdf(2), "pair.pdf").await.unwrap();

        let summary = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(summary["status"], "partial");
        assert_eq!(summary["page_count"], 2);
        assert_eq!(summary["chunks"][0]["error_kind"], "chunk_assembly");
        assert_eq!(summary["chunks"][1]["name"], "pair_part2.pdf");
        assert!(summary["chunks"][1].get("content").is_none());
    }
}

//! Clone-and-prune page engine.

use std::collections::HashSet;

use lopdf::{Dictionary, Object, ObjectId};

use super::copy::materialize_inherited;
use super::{EngineKind, ExtractedDocument, PageEngine, TRACING_TARGET, page_ids_in};
use crate::document::SourceDocument;
use crate::error::AssemblyError;
use crate::plan::PageRange;

/// Builds fragments by removing every page outside the range from a clone.
///
/// Keeps document-level structures (outlines, names, metadata) that the copy
/// engine drops, at the cost of cloning the whole object graph per fragment.
/// The kept pages are hung directly off the root `Pages` node and references
/// to removed pages are dropped in a single pass over the graph.
#[derive(Debug, Default)]
pub struct PruneEngine {
    _private: (),
}

impl PruneEngine {
    /// Creates a new prune engine.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl PageEngine for PruneEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Prune
    }

    fn copy_page_range(
        &self,
        source: &SourceDocument,
        range: PageRange,
    ) -> Result<ExtractedDocument, AssemblyError> {
        let kept = page_ids_in(source, range)?;
        let all_pages = source
            .page_ids(PageRange::new(0, source.page_count()))
            .unwrap_or_default();
        let kept_set = kept.iter().copied().collect::<HashSet<_>>();
        let excluded = all_pages
            .iter()
            .copied()
            .filter(|id| !kept_set.contains(id))
            .collect::<HashSet<_>>();

        let root_id = source
            .document()
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|err| AssemblyError::copy_with_source("page tree root is missing", err))?;

        let mut document = source.document().clone();
        // Content is written back unencrypted.
        document.trailer.remove(b"Encrypt");

        for &page_id in kept {
            let Some(Object::Dictionary(page)) = document.objects.get_mut(&page_id) else {
                return Err(AssemblyError::copy(format!(
                    "page object {} {} is unreadable",
                    page_id.0, page_id.1
                )));
            };
            materialize_inherited(source.document(), page);
            page.set("Parent", Object::Reference(root_id));
        }

        for id in &excluded {
            document.objects.remove(id);
        }
        for object in document.objects.values_mut() {
            strip_references(object, &excluded);
        }

        let Some(Object::Dictionary(root)) = document.objects.get_mut(&root_id) else {
            return Err(AssemblyError::copy("page tree root is not a dictionary"));
        };
        root.remove(b"Parent");
        root.set("Count", Object::Integer(kept.len() as i64));
        root.set(
            "Kids",
            Object::Array(kept.iter().copied().map(Object::Reference).collect()),
        );

        let pruned_objects = document.prune_objects().len();
        let page_count = document.get_pages().len();

        tracing::trace!(
            target: TRACING_TARGET,
            %range,
            deleted_pages = excluded.len(),
            pruned_objects,
            "Pruned page range"
        );

        Ok(ExtractedDocument::new(document, page_count))
    }
}

/// Removes every reference to `ids`, dropping array items and dictionary
/// entries that point at them.
fn strip_references(object: &mut Object, ids: &HashSet<ObjectId>) {
    match object {
        Object::Array(items) => {
            items.retain(|item| !points_into(item, ids));
            for item in items.iter_mut() {
                strip_references(item, ids);
            }
        }
        Object::Dictionary(dict) => strip_dictionary(dict, ids),
        Object::Stream(stream) => strip_dictionary(&mut stream.dict, ids),
        _ => {}
    }
}

fn strip_dictionary(dict: &mut Dictionary, ids: &HashSet<ObjectId>) {
    let keys = dict
        .iter()
        .filter(|(_, value)| points_into(value, ids))
        .map(|(key, _)| key.clone())
        .collect::<Vec<_>>();
    for key in keys {
        dict.remove(&key);
    }
    for (_, value) in dict.iter_mut() {
        strip_references(value, ids);
    }
}

fn points_into(object: &Object, ids: &HashSet<ObjectId>) -> bool {
    matches!(object, Object::Reference(id) if ids.contains(id))
}

//! Deep-copy page engine.

use std::collections::{BTreeMap, HashSet, VecDeque};

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::{EngineKind, ExtractedDocument, PageEngine, TRACING_TARGET, page_ids_in};
use crate::document::SourceDocument;
use crate::error::AssemblyError;
use crate::plan::PageRange;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page tree depth when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

/// Builds fragments by copying pages into a fresh document.
///
/// Each page dictionary is copied together with every object it references,
/// transitively. Inherited attributes are materialised on the copied page so
/// it no longer depends on the source page tree. References to pages outside
/// the range, and to page tree nodes, become `null`.
#[derive(Debug, Default)]
pub struct CopyEngine {
    _private: (),
}

impl CopyEngine {
    /// Creates a new copy engine.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl PageEngine for CopyEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Copy
    }

    fn copy_page_range(
        &self,
        source: &SourceDocument,
        range: PageRange,
    ) -> Result<ExtractedDocument, AssemblyError> {
        let page_ids = page_ids_in(source, range)?;
        let mut copier = ObjectCopier::new(source.document());
        let pages_id = copier.target.new_object_id();

        // Reserve ids up front so cross references between pages of the same
        // range resolve to the copies.
        let reserved = page_ids
            .iter()
            .map(|&page_id| copier.reserve(page_id))
            .collect::<Vec<_>>();

        let mut kids = Vec::with_capacity(page_ids.len());
        for (&page_id, new_id) in page_ids.iter().zip(reserved) {
            let mut page = source
                .document()
                .get_dictionary(page_id)
                .map_err(|err| {
                    AssemblyError::copy_with_source(
                        format!("page object {} {} is unreadable", page_id.0, page_id.1),
                        err,
                    )
                })?
                .clone();

            materialize_inherited(source.document(), &mut page);
            page.remove(b"Parent");

            let mut page = copier.remap_dictionary(&page);
            page.set("Parent", Object::Reference(pages_id));

            copier.target.objects.insert(new_id, Object::Dictionary(page));
            kids.push(Object::Reference(new_id));
        }

        let copied_objects = copier.drain();
        let page_count = kids.len();
        let mut target = copier.target;

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(page_count as i64));
        pages.set("Kids", Object::Array(kids));
        target.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = target.add_object(catalog);
        target.trailer.set("Root", Object::Reference(catalog_id));

        tracing::trace!(
            target: TRACING_TARGET,
            %range,
            copied_objects,
            "Copied page range"
        );

        Ok(ExtractedDocument::new(target, page_count))
    }
}

/// Copies objects from a source document into a new one, renumbering them.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: Document,
    mapping: BTreeMap<ObjectId, ObjectId>,
    pending: VecDeque<(ObjectId, ObjectId)>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            target: Document::with_version(source.version.clone()),
            mapping: BTreeMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Allocates a target id for a source object the caller copies itself.
    fn reserve(&mut self, source_id: ObjectId) -> ObjectId {
        let target_id = self.target.new_object_id();
        self.mapping.insert(source_id, target_id);
        target_id
    }

    /// Copies every object queued by remapping; returns how many were copied.
    fn drain(&mut self) -> usize {
        let source = self.source;
        let mut copied = 0;
        while let Some((source_id, target_id)) = self.pending.pop_front() {
            let object = match source.get_object(source_id) {
                Ok(object) => self.remap(object),
                Err(_) => Object::Null,
            };
            self.target.objects.insert(target_id, object);
            copied += 1;
        }
        copied
    }

    fn remap_dictionary(&mut self, dictionary: &Dictionary) -> Dictionary {
        let mut remapped = Dictionary::new();
        for (key, value) in dictionary.iter() {
            let value = self.remap(value);
            remapped.set(key.clone(), value);
        }
        remapped
    }

    fn remap(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.remap_reference(*id),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.remap(item)).collect())
            }
            Object::Dictionary(dictionary) => Object::Dictionary(self.remap_dictionary(dictionary)),
            Object::Stream(stream) => {
                let mut stream = stream.clone();
                stream.dict = self.remap_dictionary(&stream.dict);
                Object::Stream(stream)
            }
            other => other.clone(),
        }
    }

    fn remap_reference(&mut self, source_id: ObjectId) -> Object {
        if let Some(&target_id) = self.mapping.get(&source_id) {
            return Object::Reference(target_id);
        }

        let source = self.source;
        let Ok(object) = source.get_object(source_id) else {
            return Object::Null;
        };

        if is_page_tree_node(object) {
            return Object::Null;
        }

        let target_id = self.target.new_object_id();
        self.mapping.insert(source_id, target_id);
        self.pending.push_back((source_id, target_id));
        Object::Reference(target_id)
    }
}

/// Returns whether the object is a `Page` or `Pages` dictionary.
fn is_page_tree_node(object: &Object) -> bool {
    object
        .as_dict()
        .and_then(|dict| dict.get(b"Type"))
        .and_then(Object::as_name)
        .is_ok_and(|name| name == b"Page" || name == b"Pages")
}

/// Copies inheritable attributes from ancestor nodes onto the page.
pub(super) fn materialize_inherited(document: &Document, page: &mut Dictionary) {
    for key in INHERITABLE_KEYS {
        if page.has(key) {
            continue;
        }

        if let Some(value) = inherited_value(document, page, key) {
            page.set(key, value);
        }
    }
}

fn inherited_value(document: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut visited = HashSet::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    while let Some(parent_id) = parent {
        if !visited.insert(parent_id) || visited.len() > MAX_TREE_DEPTH {
            return None;
        }

        let node = document.get_dictionary(parent_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

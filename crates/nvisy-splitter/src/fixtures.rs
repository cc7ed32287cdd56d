//! In-memory PDF builders for tests.

use lopdf::content::{Content, Operation};
use lopdf::{
    Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId, Permissions, Stream,
    StringFormat,
};

/// Builds a flat document whose pages print `Page N` (one-based).
pub(crate) fn text_pdf(page_count: usize) -> Vec<u8> {
    padded_pdf(&vec![0; page_count])
}

/// Builds a flat document where page `i` carries `padding[i]` extra bytes in a
/// form XObject referenced from its resources.
pub(crate) fn padded_pdf(padding: &[usize]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(helvetica());

    let kids = padding
        .iter()
        .enumerate()
        .map(|(index, &pad)| {
            let mut resources = font_resources(font_id);
            if pad > 0 {
                let xobject_id = doc.add_object(padding_xobject(pad));
                let mut xobjects = Dictionary::new();
                xobjects.set("Pad", Object::Reference(xobject_id));
                resources.set("XObject", Object::Dictionary(xobjects));
            }

            let mut page = page_dictionary(&mut doc, pages_id, index);
            page.set("MediaBox", media_box());
            page.set("Resources", Object::Dictionary(resources));
            Object::Reference(doc.add_object(page))
        })
        .collect::<Vec<_>>();

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    finish(doc, pages_id)
}

/// Builds a document with a two-level page tree.
///
/// `MediaBox` and `Resources` live on the root `Pages` node only, so every
/// page inherits them.
pub(crate) fn nested_pdf(group_sizes: &[usize]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let root_id = doc.new_object_id();
    let font_id = doc.add_object(helvetica());

    let mut index = 0;
    let mut groups = Vec::new();
    for &size in group_sizes {
        let group_id = doc.new_object_id();
        let kids = (0..size)
            .map(|_| {
                let page = page_dictionary(&mut doc, group_id, index);
                index += 1;
                Object::Reference(doc.add_object(page))
            })
            .collect::<Vec<_>>();

        let mut group = Dictionary::new();
        group.set("Type", Object::Name(b"Pages".to_vec()));
        group.set("Parent", Object::Reference(root_id));
        group.set("Count", Object::Integer(size as i64));
        group.set("Kids", Object::Array(kids));
        doc.objects.insert(group_id, Object::Dictionary(group));
        groups.push(Object::Reference(group_id));
    }

    let mut root = Dictionary::new();
    root.set("Type", Object::Name(b"Pages".to_vec()));
    root.set("Count", Object::Integer(index as i64));
    root.set("Kids", Object::Array(groups));
    root.set("MediaBox", media_box());
    root.set("Resources", Object::Dictionary(font_resources(font_id)));
    doc.objects.insert(root_id, Object::Dictionary(root));

    finish(doc, root_id)
}

/// Builds a document whose pages link to the first page of the document.
///
/// Every page carries a link annotation with a `/Dest` pointing at page one,
/// which must not drag page one into fragments that exclude it.
pub(crate) fn cross_linked_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(helvetica());

    let page_ids = (0..page_count)
        .map(|_| doc.new_object_id())
        .collect::<Vec<ObjectId>>();

    for (index, &page_id) in page_ids.iter().enumerate() {
        let mut annotation = Dictionary::new();
        annotation.set("Type", Object::Name(b"Annot".to_vec()));
        annotation.set("Subtype", Object::Name(b"Link".to_vec()));
        annotation.set("Rect", media_box());
        annotation.set("P", Object::Reference(page_id));
        annotation.set(
            "Dest",
            Object::Array(vec![
                Object::Reference(page_ids[0]),
                Object::Name(b"Fit".to_vec()),
            ]),
        );
        let annotation_id = doc.add_object(annotation);

        let mut page = page_dictionary(&mut doc, pages_id, index);
        page.set("MediaBox", media_box());
        page.set("Resources", Object::Dictionary(font_resources(font_id)));
        page.set("Annots", Object::Array(vec![Object::Reference(annotation_id)]));
        doc.objects.insert(page_id, Object::Dictionary(page));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(page_count as i64));
    pages.set(
        "Kids",
        Object::Array(page_ids.iter().copied().map(Object::Reference).collect()),
    );
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    finish(doc, pages_id)
}

/// Builds a readable document that still carries a raw `/Encrypt` marker.
///
/// The marker sits in an unreferenced object, so the trailer itself is clean
/// and the document parses without a password.
pub(crate) fn encrypted_marker_pdf(page_count: usize) -> Vec<u8> {
    let bytes = text_pdf(page_count);
    let mut doc = Document::load_mem(&bytes).expect("fixture loads");
    doc.add_object(Object::Name(b"Encrypt".to_vec()));
    save(&mut doc)
}

/// Builds an RC4-128 encrypted copy of [`text_pdf`].
///
/// lopdf opens the result by itself only when `user_password` is empty.
pub(crate) fn encrypted_pdf(page_count: usize, user_password: &str) -> Vec<u8> {
    let bytes = text_pdf(page_count);
    let mut doc = Document::load_mem(&bytes).expect("fixture loads");
    let id = b"nvisy-fixture-id".to_vec();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Literal),
            Object::String(id, StringFormat::Literal),
        ]),
    );

    let version = EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).expect("encryption state");
    doc.encrypt(&state).expect("fixture encrypts");
    save(&mut doc)
}

/// Builds a structurally valid document with an empty page tree.
pub(crate) fn empty_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(0));
    pages.set("Kids", Object::Array(Vec::new()));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    finish(doc, pages_id)
}

/// Reads back the `Page N` markers of every page, in page order.
pub(crate) fn page_markers(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("fragment loads");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc.get_page_content(page_id).expect("page content");
            let content = Content::decode(&content).expect("content decodes");
            content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .flat_map(|op| op.operands.iter())
                .find_map(|operand| match operand {
                    Object::String(text, _) => Some(String::from_utf8_lossy(text).into_owned()),
                    _ => None,
                })
                .expect("page marker")
        })
        .collect()
}

/// Returns the expected markers for pages `[start, end)`.
pub(crate) fn expected_markers(start: usize, end: usize) -> Vec<String> {
    (start..end).map(|i| format!("Page {}", i + 1)).collect()
}

fn page_dictionary(doc: &mut Document, parent: ObjectId, index: usize) -> Dictionary {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
            Operation::new(
                "Tj",
                vec![Object::String(
                    format!("Page {}", index + 1).into_bytes(),
                    StringFormat::Literal,
                )],
            ),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        content.encode().expect("content encodes"),
    ));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(parent));
    page.set("Contents", Object::Reference(content_id));
    page
}

fn helvetica() -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font
}

fn font_resources(font_id: ObjectId) -> Dictionary {
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

fn padding_xobject(size: usize) -> Stream {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(1),
            Object::Integer(1),
        ]),
    );
    let mut stream = Stream::new(dict, vec![b' '; size]);
    stream.allows_compression = false;
    stream
}

fn media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ])
}

fn finish(mut doc: Document, pages_id: ObjectId) -> Vec<u8> {
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));
    save(&mut doc)
}

fn save(doc: &mut Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("fixture saves");
    buffer
}

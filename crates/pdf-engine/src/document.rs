use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::draw::StandardFont;
use crate::{PageSize, PdfEngineError};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guards against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Load documents whose trailer declares an `Encrypt` dictionary instead
    /// of rejecting them. Streams that really are encrypted stay unreadable.
    pub ignore_encryption: bool,
}

/// Operations queued for one page, appended as a separate content stream on save.
#[derive(Debug, Default)]
pub(crate) struct PageCanvas {
    pub(crate) operations: Vec<Operation>,
    pub(crate) fonts: HashMap<StandardFont, Vec<u8>>,
    pub(crate) states: HashMap<u32, Vec<u8>>,
    pub(crate) images: HashMap<ObjectId, Vec<u8>>,
}

#[derive(Debug)]
pub struct PdfDocument {
    pub(crate) doc: Document,
    pages_root: ObjectId,
    pages: Vec<ObjectId>,
    pub(crate) fonts: HashMap<StandardFont, ObjectId>,
    pub(crate) canvases: BTreeMap<ObjectId, PageCanvas>,
}

impl PdfDocument {
    pub fn load(bytes: &[u8], options: LoadOptions) -> Result<Self, PdfEngineError> {
        let doc = Document::load_mem(bytes)?;
        check_encryption(&doc, options)?;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(PdfEngineError::NoPages);
        }
        let pages_root = pages_root(&doc)?;

        info!("loaded document with {} pages ({} bytes)", pages.len(), bytes.len());
        Ok(Self { doc, pages_root, pages, fonts: HashMap::new(), canvases: BTreeMap::new() })
    }

    /// An empty document with a flat page tree.
    pub fn create() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_root = doc.new_object_id();
        doc.objects.insert(
            pages_root,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(Vec::new())),
                ("Count", Object::Integer(0)),
            ])),
        );
        let catalog = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_root)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog));

        Self {
            doc,
            pages_root,
            pages: Vec::new(),
            fonts: HashMap::new(),
            canvases: BTreeMap::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn page_id(&self, page: usize) -> Result<ObjectId, PdfEngineError> {
        self.pages
            .get(page)
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange { page, page_count: self.pages.len() })
    }

    /// Unrotated size of the page's media box.
    pub fn page_size(&self, page: usize) -> Result<PageSize, PdfEngineError> {
        let (_, size) = self.media_box(page)?;
        Ok(size)
    }

    /// Lower-left corner and size of the page's media box. Missing or
    /// malformed boxes fall back to US Letter at the origin.
    pub(crate) fn media_box(&self, page: usize) -> Result<((f32, f32), PageSize), PdfEngineError> {
        let page_id = self.page_id(page)?;
        let parsed = self
            .inherited(page_id, b"MediaBox")
            .map(|object| self.resolve(object))
            .and_then(|object| object.as_array().ok())
            .and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = array[0].as_float().ok()?;
                let y0 = array[1].as_float().ok()?;
                let x1 = array[2].as_float().ok()?;
                let y1 = array[3].as_float().ok()?;
                Some((
                    (x0.min(x1), y0.min(y1)),
                    PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() },
                ))
            });
        Ok(parsed.unwrap_or(((0.0, 0.0), PageSize::default())))
    }

    /// Intrinsic `/Rotate` of the page, normalized into `0..360`.
    pub fn rotation(&self, page: usize) -> Result<i64, PdfEngineError> {
        let page_id = self.page_id(page)?;
        let degrees = self
            .inherited(page_id, b"Rotate")
            .map(|object| self.resolve(object))
            .and_then(|object| object.as_i64().ok())
            .unwrap_or(0);
        Ok(degrees.rem_euclid(360))
    }

    pub fn set_rotation(&mut self, page: usize, degrees: i64) -> Result<(), PdfEngineError> {
        if degrees % 90 != 0 {
            return Err(PdfEngineError::InvalidRotation(degrees));
        }
        let page_id = self.page_id(page)?;
        let dict = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
        dict.set("Rotate", Object::Integer(degrees.rem_euclid(360)));
        Ok(())
    }

    /// Appends an empty page and returns its index.
    pub fn add_blank_page(&mut self, size: PageSize) -> usize {
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_root)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(size.width_pt),
                    Object::Real(size.height_pt),
                ]),
            ),
            ("Resources", Object::Dictionary(Dictionary::new())),
        ]);
        let page_id = self.doc.add_object(page);
        self.pages.push(page_id);
        self.sync_page_tree();
        self.pages.len() - 1
    }

    /// Copies `indices` of `source`, in order, to the end of this document and
    /// returns the new page indices. Inherited attributes are materialized on
    /// each copied page, so the copies do not depend on the source page tree.
    pub fn copy_pages_from(
        &mut self,
        source: &PdfDocument,
        indices: &[usize],
    ) -> Result<Vec<usize>, PdfEngineError> {
        let mut remap: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
        let mut roots = BTreeSet::new();
        let mut copies = Vec::with_capacity(indices.len());
        for &index in indices {
            let source_id = source.page_id(index)?;
            let target_id = self.doc.new_object_id();
            remap.entry(source_id).or_insert(target_id);
            roots.insert(source_id);
            copies.push((target_id, source.flattened_page(source_id)?));
        }

        let mut pending = Vec::new();
        for (_, dict) in &copies {
            push_dictionary_references(dict, &mut pending);
        }
        for id in collect_dependencies(&source.doc, pending, &remap) {
            let target_id = self.doc.new_object_id();
            remap.insert(id, target_id);
        }

        for (source_id, target_id) in &remap {
            if roots.contains(source_id) {
                continue;
            }
            if let Ok(object) = source.doc.get_object(*source_id) {
                self.doc.objects.insert(*target_id, remap_references(object, &remap));
            }
        }

        let mut added = Vec::with_capacity(copies.len());
        for (target_id, dict) in copies {
            let mut page = remap_dictionary(&dict, &remap);
            page.set("Parent", Object::Reference(self.pages_root));
            self.doc.objects.insert(target_id, Object::Dictionary(page));
            self.pages.push(target_id);
            added.push(self.pages.len() - 1);
        }
        self.sync_page_tree();

        debug!("copied {} pages ({} objects)", added.len(), remap.len());
        Ok(added)
    }

    /// Decoded content operations of a page as currently serialized; queued
    /// drawing is not visible until [`PdfDocument::save`].
    pub fn page_operations(&self, page: usize) -> Result<Vec<Operation>, PdfEngineError> {
        let page_id = self.page_id(page)?;
        let bytes = self.doc.get_page_content(page_id)?;
        Ok(Content::decode(&bytes)?.operations)
    }

    /// Flushes queued drawing and serializes the document.
    pub fn save(&mut self) -> Result<Vec<u8>, PdfEngineError> {
        let canvases = std::mem::take(&mut self.canvases);
        for (page_id, canvas) in canvases {
            self.append_operations(page_id, canvas.operations)?;
        }

        self.doc.prune_objects();
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer).map_err(|err| PdfEngineError::Save(err.to_string()))?;
        info!("serialized document with {} pages ({} bytes)", self.pages.len(), buffer.len());
        Ok(buffer)
    }

    /// Wraps the existing content in `q`/`Q` so its graphics state cannot leak
    /// into the appended stream.
    fn append_operations(
        &mut self,
        page_id: ObjectId,
        operations: Vec<Operation>,
    ) -> Result<(), PdfEngineError> {
        if operations.is_empty() {
            return Ok(());
        }

        let existing: Vec<Object> = match self.doc.get_dictionary(page_id)?.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let encoded = Content { operations }.encode()?;
        let overlay = self.doc.add_object(Stream::new(Dictionary::new(), encoded));

        let mut contents = Vec::with_capacity(existing.len() + 3);
        if !existing.is_empty() {
            let open = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let close = self.doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
            contents.push(Object::Reference(open));
            contents.extend(existing);
            contents.push(Object::Reference(close));
        }
        contents.push(Object::Reference(overlay));

        let dict = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
        dict.set("Contents", Object::Array(contents));
        Ok(())
    }

    /// The page dictionary with inherited attributes copied in and `Parent` removed.
    fn flattened_page(&self, page_id: ObjectId) -> Result<Dictionary, PdfEngineError> {
        let mut dict = self.doc.get_dictionary(page_id)?.clone();
        for key in INHERITABLE {
            if !dict.has(key) {
                if let Some(value) = self.inherited(page_id, key) {
                    dict.set(key.to_vec(), value.clone());
                }
            }
        }
        dict.remove(b"Parent");
        Ok(dict)
    }

    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = page_id;
        for _ in 0..MAX_TREE_DEPTH {
            let dict = self.doc.get_dictionary(current).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        }
        None
    }

    pub(crate) fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    /// Rewrites the root's `Kids`/`Count` from the page list. Pages copied or
    /// added here always hang directly off the root.
    fn sync_page_tree(&mut self) {
        let kids = self.pages.iter().map(|id| Object::Reference(*id)).collect();
        if let Some(Object::Dictionary(root)) = self.doc.objects.get_mut(&self.pages_root) {
            root.set("Kids", Object::Array(kids));
            root.set("Count", Object::Integer(self.pages.len() as i64));
        }
    }
}

/// Only the trailer decides whether a document is encrypted; the same bytes
/// may legitimately appear in page text or metadata.
fn check_encryption(doc: &Document, options: LoadOptions) -> Result<(), PdfEngineError> {
    if !doc.trailer.has(b"Encrypt") {
        return Ok(());
    }
    if options.ignore_encryption {
        warn!("document declares encryption, loading it anyway");
        return Ok(());
    }
    Err(PdfEngineError::Encrypted)
}

fn pages_root(doc: &Document) -> Result<ObjectId, PdfEngineError> {
    let catalog = doc.trailer.get(b"Root").and_then(Object::as_reference)?;
    Ok(doc.get_dictionary(catalog)?.get(b"Pages").and_then(Object::as_reference)?)
}

fn is_page_node(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name.as_slice() == b"Page" || name.as_slice() == b"Pages")
}

fn push_dictionary_references(dict: &Dictionary, out: &mut Vec<ObjectId>) {
    let page_node = is_page_node(dict);
    for (key, value) in dict.iter() {
        if page_node && key.as_slice() == b"Parent" {
            continue;
        }
        push_references(value, out);
    }
}

fn push_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|item| push_references(item, out)),
        Object::Dictionary(dict) => push_dictionary_references(dict, out),
        Object::Stream(stream) => push_dictionary_references(&stream.dict, out),
        _ => {}
    }
}

/// Every object reachable from `pending`, without climbing into the page tree
/// and without revisiting anything already in `known`.
fn collect_dependencies(
    doc: &Document,
    mut pending: Vec<ObjectId>,
    known: &BTreeMap<ObjectId, ObjectId>,
) -> BTreeSet<ObjectId> {
    let mut seen = BTreeSet::new();
    while let Some(id) = pending.pop() {
        if known.contains_key(&id) || !seen.insert(id) {
            continue;
        }
        if let Ok(object) = doc.get_object(id) {
            push_references(object, &mut pending);
        }
    }
    seen
}

/// References without a counterpart in `remap` become `null` rather than
/// pointing at unrelated objects in the target document.
fn remap_references(object: &Object, remap: &BTreeMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(id) => remap.get(id).map_or(Object::Null, |id| Object::Reference(*id)),
        Object::Array(items) => {
            Object::Array(items.iter().map(|item| remap_references(item, remap)).collect())
        }
        Object::Dictionary(dict) => Object::Dictionary(remap_dictionary(dict, remap)),
        Object::Stream(stream) => {
            let mut copy = stream.clone();
            copy.dict = remap_dictionary(&stream.dict, remap);
            Object::Stream(copy)
        }
        other => other.clone(),
    }
}

fn remap_dictionary(dict: &Dictionary, remap: &BTreeMap<ObjectId, ObjectId>) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        out.set(key.clone(), remap_references(value, remap));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_blank_pdf, TextParams};
    use pretty_assertions::assert_eq;

    fn shown_text(doc: &PdfDocument, page: usize) -> Vec<String> {
        doc.page_operations(page)
            .expect("content should decode")
            .into_iter()
            .filter(|op| op.operator == "Tj")
            .flat_map(|op| op.operands)
            .filter_map(|operand| match operand {
                Object::String(bytes, _) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                _ => None,
            })
            .collect()
    }

    fn three_pages() -> PdfDocument {
        let bytes = build_blank_pdf(&[
            PageSize::LETTER,
            PageSize::new(400.0, 500.0),
            PageSize::new(200.0, 300.0),
        ])
        .expect("build should succeed");
        PdfDocument::load(&bytes, LoadOptions::default()).expect("load should succeed")
    }

    /// A two-level page tree whose leaves inherit MediaBox and Rotate.
    fn nested_tree_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let root_id = doc.new_object_id();
        let middle_id = doc.new_object_id();
        let leaf = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(middle_id)),
        ]));
        doc.objects.insert(
            middle_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Parent", Object::Reference(root_id)),
                ("Kids", Object::Array(vec![Object::Reference(leaf)])),
                ("Count", Object::Integer(1)),
                ("Rotate", Object::Integer(90)),
            ])),
        );
        doc.objects.insert(
            root_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(vec![Object::Reference(middle_id)])),
                ("Count", Object::Integer(1)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(100),
                        Object::Integer(200),
                    ]),
                ),
            ])),
        );
        let catalog = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(root_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("save should succeed");
        buffer
    }

    #[test]
    fn reads_sizes_of_each_page() {
        let doc = three_pages();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page_size(1).expect("page exists"), PageSize::new(400.0, 500.0));
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let doc = three_pages();
        let err = doc.page_size(3).expect_err("page 3 does not exist");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 3, page_count: 3 }));
    }

    #[test]
    fn encrypt_text_in_content_and_metadata_is_not_encryption() {
        let mut doc = PdfDocument::create();
        let page = doc.add_blank_page(PageSize::LETTER);
        doc.draw_text(page, &TextParams::new("See /Encrypt docs", 72.0, 700.0, 12.0))
            .expect("page exists");
        let info = doc.doc.add_object(Dictionary::from_iter(vec![(
            "Title",
            Object::String(b"/Encrypt /EncryptMetadata".to_vec(), lopdf::StringFormat::Literal),
        )]));
        doc.doc.trailer.set("Info", Object::Reference(info));
        let bytes = doc.save().expect("save should succeed");
        assert!(bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt"));

        let doc = PdfDocument::load(&bytes, LoadOptions::default()).expect("plain document loads");
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn encrypt_entry_in_trailer_is_rejected_unless_ignored() {
        let mut doc = Document::with_version("1.7");
        let encrypt = doc.add_object(Dictionary::from_iter(vec![
            ("Filter", Object::Name(b"Standard".to_vec())),
            ("V", Object::Integer(2)),
        ]));
        doc.trailer.set("Encrypt", Object::Reference(encrypt));

        let err = check_encryption(&doc, LoadOptions::default()).expect_err("encrypted");
        assert!(matches!(err, PdfEngineError::Encrypted));
        assert!(check_encryption(&doc, LoadOptions { ignore_encryption: true }).is_ok());

        doc.trailer.remove(b"Encrypt");
        assert!(check_encryption(&doc, LoadOptions::default()).is_ok());
    }

    #[test]
    fn copying_pages_keeps_requested_order() {
        let source = three_pages();
        let mut output = PdfDocument::create();
        let added = output.copy_pages_from(&source, &[2, 0]).expect("copy should succeed");
        assert_eq!(added, vec![0, 1]);

        let bytes = output.save().expect("save should succeed");
        let reloaded = PdfDocument::load(&bytes, LoadOptions::default()).expect("reload");
        assert_eq!(reloaded.page_count(), 2);
        assert_eq!(reloaded.page_size(0).expect("page exists"), PageSize::new(200.0, 300.0));
        assert_eq!(reloaded.page_size(1).expect("page exists"), PageSize::LETTER);
    }

    #[test]
    fn copied_pages_keep_their_content() {
        let source = three_pages();
        let mut output = PdfDocument::create();
        output.copy_pages_from(&source, &[1]).expect("copy should succeed");
        let bytes = output.save().expect("save should succeed");
        let reloaded = PdfDocument::load(&bytes, LoadOptions::default()).expect("reload");

        assert_eq!(shown_text(&reloaded, 0), vec!["Page 2".to_owned()]);
    }

    #[test]
    fn inherited_attributes_are_materialized_on_copy() {
        let source = PdfDocument::load(&nested_tree_pdf(), LoadOptions::default())
            .expect("load should succeed");
        assert_eq!(source.rotation(0).expect("page exists"), 90);
        assert_eq!(source.page_size(0).expect("page exists"), PageSize::new(100.0, 200.0));

        let mut output = PdfDocument::create();
        output.copy_pages_from(&source, &[0]).expect("copy should succeed");
        let bytes = output.save().expect("save should succeed");
        let reloaded = PdfDocument::load(&bytes, LoadOptions::default()).expect("reload");

        assert_eq!(reloaded.rotation(0).expect("page exists"), 90);
        assert_eq!(reloaded.page_size(0).expect("page exists"), PageSize::new(100.0, 200.0));
    }

    #[test]
    fn rotation_must_be_a_quarter_turn() {
        let mut doc = three_pages();
        doc.set_rotation(0, -90).expect("quarter turns are valid");
        assert_eq!(doc.rotation(0).expect("page exists"), 270);

        let err = doc.set_rotation(0, 45).expect_err("45 is not a quarter turn");
        assert!(matches!(err, PdfEngineError::InvalidRotation(45)));
    }

    #[test]
    fn drawing_is_appended_after_existing_content() {
        let mut doc = three_pages();
        doc.draw_text(0, &TextParams::new("Added", 10.0, 10.0, 12.0)).expect("draw");
        let bytes = doc.save().expect("save should succeed");
        let reloaded = PdfDocument::load(&bytes, LoadOptions::default()).expect("reload");

        assert_eq!(shown_text(&reloaded, 0), vec!["Page 1".to_owned(), "Added".to_owned()]);
    }
}

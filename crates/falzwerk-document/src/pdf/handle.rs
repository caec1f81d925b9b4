// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document handle: open (and decrypt) a PDF from bytes, flatten its page
// tree into an ordered list of page objects, and serialize it back.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::types::PageInfo;
use lopdf::xref::XrefEntry;
use lopdf::{Dictionary, Document, Object, ObjectId, Reader};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use super::objects::{as_dict, rect_array, rect_object, resolve, resolved_number};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// US Letter, used when neither the page nor any ancestor declares a MediaBox.
pub(crate) const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

const MAX_TREE_DEPTH: usize = 64;
const HEADER_WINDOW: usize = 1024;

/// An opened, decrypted PDF whose page sequence can be edited in place.
///
/// The page tree is flattened on open: every page carries its own MediaBox,
/// CropBox, Resources and Rotate, and the sequence is a plain list of page
/// object IDs hung directly under the root `/Pages` node when saved.
pub struct PdfHandle {
    document: Document,
    pages_root: ObjectId,
    pages: Vec<ObjectId>,
    /// Page objects removed from the sequence; stripped out on save.
    retired: BTreeSet<ObjectId>,
    fingerprint: String,
}

impl PdfHandle {
    // -- Construction ---------------------------------------------------------

    /// Parse `data` as a PDF, decrypting it with `password` when needed.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn open(data: &[u8], password: Option<&str>) -> Result<Self> {
        let fingerprint = fingerprint_of(data);

        let window = &data[..data.len().min(HEADER_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(FalzwerkError::InvalidPdf(
                "missing %PDF- header".to_string(),
            ));
        }

        let mut document = Document::load_mem(data)
            .map_err(|err| FalzwerkError::InvalidPdf(format!("failed to parse PDF: {}", err)))?;

        if document.is_encrypted() {
            document = unlock(data, document, password)?;
            debug!(%fingerprint, "PDF decrypted");
        }

        let pages_root = document
            .catalog()
            .ok()
            .and_then(|catalog| catalog.get(b"Pages").ok())
            .and_then(|pages| pages.as_reference().ok())
            .ok_or_else(|| FalzwerkError::InvalidPdf("missing page tree".to_string()))?;

        let pages = flatten_page_tree(&mut document, pages_root)?;

        info!(%fingerprint, pages = pages.len(), "PDF opened");

        Ok(Self {
            document,
            pages_root,
            pages,
            retired: BTreeSet::new(),
            fingerprint,
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Short SHA-256 digest of the bytes this handle was opened from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Geometry of the 1-indexed page `number`.
    pub fn page_info(&self, number: u32) -> Result<PageInfo> {
        let index = self.page_index(number)?;
        let [x0, y0, x1, y1] = self.media_box(self.pages[index]);
        Ok(PageInfo {
            number,
            width: x1 - x0,
            height: y1 - y0,
            rotation: self.rotation(self.pages[index]),
        })
    }

    /// The page's MediaBox, normalized so the first corner is the lower-left.
    pub(crate) fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        self.page_dict(page_id)
            .and_then(|dict| dict.get(b"MediaBox").ok())
            .and_then(|value| rect_array(&self.document, value))
            .unwrap_or(DEFAULT_MEDIA_BOX)
    }

    /// The visible area: the CropBox when the page has one, else the MediaBox.
    pub(crate) fn crop_box(&self, page_id: ObjectId) -> [f32; 4] {
        self.page_dict(page_id)
            .and_then(|dict| dict.get(b"CropBox").ok())
            .and_then(|value| rect_array(&self.document, value))
            .unwrap_or_else(|| self.media_box(page_id))
    }

    /// The page's /Rotate, normalized into `0..360`.
    pub(crate) fn rotation(&self, page_id: ObjectId) -> i64 {
        self.page_dict(page_id)
            .and_then(|dict| dict.get(b"Rotate").ok())
            .and_then(|value| resolved_number(&self.document, value))
            .map(|degrees| (degrees as i64).rem_euclid(360))
            .unwrap_or(0)
    }

    pub(crate) fn page_dict(&self, page_id: ObjectId) -> Option<&Dictionary> {
        self.document
            .get_object(page_id)
            .ok()
            .and_then(|object| as_dict(&self.document, object))
    }

    // -- Page numbering -------------------------------------------------------

    /// Map a 1-indexed page number onto the 0-indexed sequence.
    pub(crate) fn page_index(&self, number: u32) -> Result<usize> {
        let count = self.pages.len();
        if number == 0 || number as usize > count {
            return Err(FalzwerkError::InvalidPages(format!(
                "page {} out of range (document has {} pages)",
                number, count
            )));
        }
        Ok(number as usize - 1)
    }

    /// Validate every number before anything is touched; returns the indices
    /// in request order.
    pub(crate) fn page_indices(&self, numbers: &[u32]) -> Result<Vec<usize>> {
        let invalid: Vec<String> = numbers
            .iter()
            .filter(|&&n| n == 0 || n as usize > self.pages.len())
            .map(|n| n.to_string())
            .collect();
        if !invalid.is_empty() {
            return Err(FalzwerkError::InvalidPages(format!(
                "pages out of range: {} (document has {} pages)",
                invalid.join(", "),
                self.pages.len()
            )));
        }
        Ok(numbers.iter().map(|&n| n as usize - 1).collect())
    }

    // -- Internals for the editors --------------------------------------------

    pub(crate) fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub(crate) fn pages(&self) -> &[ObjectId] {
        &self.pages
    }

    pub(crate) fn pages_root(&self) -> ObjectId {
        self.pages_root
    }

    /// Insert `page_id` into the sequence at 0-indexed `index`.
    pub(crate) fn insert_page(&mut self, index: usize, page_id: ObjectId) {
        let index = index.min(self.pages.len());
        self.pages.insert(index, page_id);
    }

    /// Drop the pages at the given 0-indexed positions from the sequence.
    pub(crate) fn remove_pages(&mut self, indices: &BTreeSet<usize>) {
        let mut position = 0;
        let retired = &mut self.retired;
        self.pages.retain(|&id| {
            let keep = !indices.contains(&position);
            if !keep {
                retired.insert(id);
            }
            position += 1;
            keep
        });
    }

    // -- Serialization --------------------------------------------------------

    /// Serialize the handle into a standalone, unencrypted PDF.
    #[instrument(skip_all, fields(fingerprint = %self.fingerprint, pages = self.pages.len()))]
    pub fn save(mut self) -> Result<Vec<u8>> {
        self.write_page_tree()?;
        self.scrub_retired();

        let pruned = self.document.prune_objects();
        debug!(pruned = pruned.len(), "Unreachable objects dropped");

        self.document.renumber_objects();
        self.document.compress();

        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| FalzwerkError::ProcessingFailed(format!("failed to serialise PDF: {}", err)))?;

        debug!(output_bytes = output.len(), "PDF serialised");
        Ok(output)
    }

    fn write_page_tree(&mut self) -> Result<()> {
        let kids: Vec<Object> = self.pages.iter().map(|&id| Object::Reference(id)).collect();
        let count = self.pages.len() as i64;
        let root = self.pages_root;

        for &page_id in &self.pages {
            if let Ok(Object::Dictionary(page)) = self.document.get_object_mut(page_id) {
                page.set("Parent", Object::Reference(root));
            }
        }

        let node = self
            .document
            .get_object_mut(root)
            .and_then(|object| object.as_dict_mut())
            .map_err(|err| FalzwerkError::ProcessingFailed(format!("page tree root unusable: {}", err)))?;
        node.set("Kids", Object::Array(kids));
        node.set("Count", Object::Integer(count));
        Ok(())
    }

    /// Replace every reference to a retired page with null (outline and link
    /// destinations, mostly) and delete the page objects themselves.
    fn scrub_retired(&mut self) {
        let live: HashSet<ObjectId> = self.pages.iter().copied().collect();
        let retired: BTreeSet<ObjectId> = self
            .retired
            .iter()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        if retired.is_empty() {
            return;
        }

        let mut scrubbed = 0usize;
        for object in self.document.objects.values_mut() {
            scrubbed += null_references(object, &retired);
        }
        for id in &retired {
            self.document.objects.remove(id);
        }
        debug!(retired = retired.len(), scrubbed, "Retired pages removed");
    }
}

fn fingerprint_of(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(&digest[..8])
}

fn unlock(data: &[u8], mut document: Document, password: Option<&str>) -> Result<Document> {
    // lopdf decrypts during load when the user password is empty.
    if document.encryption_state.is_some() {
        if let Some(password) = password {
            document
                .authenticate_password(password)
                .map_err(|_| FalzwerkError::InvalidPassword)?;
        }
        if let Some(Object::Reference(id)) = document.trailer.remove(b"Encrypt") {
            document.objects.remove(&id);
        }
        return Ok(document);
    }

    // Only the user password yields lopdf's file key; an owner password
    // would authenticate and then decrypt to garbage.
    let password = password.ok_or(FalzwerkError::EncryptedPdf)?;
    document
        .authenticate_user_password(password)
        .map_err(|_| FalzwerkError::InvalidPassword)?;

    let mut document = reload_encrypted_objects(data, document);
    document
        .decrypt(password)
        .map_err(|err| FalzwerkError::InvalidPdf(format!("failed to decrypt PDF: {}", err)))?;
    Ok(document)
}

/// Without a working empty password lopdf keeps only the encryption
/// dictionary. Read every other object back in, still encrypted, so that
/// `Document::decrypt` has something to work on.
fn reload_encrypted_objects(data: &[u8], document: Document) -> Document {
    let start = data.windows(5).position(|w| w == b"%PDF-").unwrap_or(0);
    let reader = Reader {
        buffer: &data[start..],
        document,
        encryption_state: None,
        raw_objects: BTreeMap::new(),
    };

    let mut loaded = Vec::new();
    for (&number, entry) in &reader.document.reference_table.entries {
        let XrefEntry::Normal { generation, .. } = *entry else {
            continue;
        };
        let id = (number, generation);
        if reader.document.objects.contains_key(&id) {
            continue;
        }
        match reader.get_object(id, &mut HashSet::new()) {
            // Cross-reference streams are never encrypted and are rebuilt on save.
            Ok(Object::Stream(stream)) if stream.dict.has_type(b"XRef") => {}
            Ok(object) => loaded.push((id, object)),
            Err(err) => warn!(object = id.0, %err, "Skipping unreadable object"),
        }
    }

    let mut document = reader.document;
    document.objects.extend(loaded);
    document
}

fn null_references(object: &mut Object, targets: &BTreeSet<ObjectId>) -> usize {
    match object {
        Object::Reference(id) if targets.contains(id) => {
            *object = Object::Null;
            1
        }
        Object::Array(items) => items.iter_mut().map(|item| null_references(item, targets)).sum(),
        Object::Dictionary(dict) => dict
            .iter_mut()
            .map(|(_, value)| null_references(value, targets))
            .sum(),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .map(|(_, value)| null_references(value, targets))
            .sum(),
        _ => 0,
    }
}

/// Walk the page tree depth-first, materializing inherited attributes on each
/// leaf, and return the leaves in document order.
fn flatten_page_tree(document: &mut Document, root: ObjectId) -> Result<Vec<ObjectId>> {
    let mut pages = Vec::new();
    let mut seen = HashSet::new();
    let inherited: Vec<(Vec<u8>, Object)> = Vec::new();
    collect_pages(document, root, &inherited, 0, &mut seen, &mut pages)?;

    // Leaves now carry everything; stale root attributes would only confuse
    // pages imported later.
    if let Ok(Object::Dictionary(node)) = document.get_object_mut(root) {
        for key in INHERITABLE {
            node.remove(key);
        }
    }

    for &page_id in &pages {
        materialize_defaults(document, page_id);
    }
    Ok(pages)
}

fn collect_pages(
    document: &mut Document,
    node_id: ObjectId,
    inherited: &[(Vec<u8>, Object)],
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    pages: &mut Vec<ObjectId>,
) -> Result<()> {
    if depth > MAX_TREE_DEPTH {
        return Err(FalzwerkError::InvalidPdf("page tree too deep".to_string()));
    }
    if !seen.insert(node_id) {
        warn!(?node_id, "Page tree cycle ignored");
        return Ok(());
    }

    let node = document
        .get_object(node_id)
        .ok()
        .and_then(|object| as_dict(document, object))
        .cloned()
        .ok_or_else(|| FalzwerkError::InvalidPdf(format!("page tree node {:?} missing", node_id)))?;

    let kids: Option<Vec<ObjectId>> = node.get(b"Kids").ok().and_then(|kids| {
        match resolve(document, kids) {
            Object::Array(items) => Some(items.iter().filter_map(|k| k.as_reference().ok()).collect()),
            _ => None,
        }
    });
    let is_leaf = match node.get(b"Type").ok().and_then(|t| t.as_name().ok()) {
        Some(b"Page") => true,
        Some(b"Pages") => false,
        _ => kids.is_none(),
    };

    if is_leaf {
        if let Ok(Object::Dictionary(page)) = document.get_object_mut(node_id) {
            for (key, value) in inherited {
                if !page.has(key) {
                    page.set(key.clone(), value.clone());
                }
            }
        }
        pages.push(node_id);
        return Ok(());
    }

    let mut scope = inherited.to_vec();
    for key in INHERITABLE {
        if let Ok(value) = node.get(key) {
            scope.retain(|(k, _)| k.as_slice() != key);
            scope.push((key.to_vec(), value.clone()));
        }
    }
    for kid in kids.unwrap_or_default() {
        collect_pages(document, kid, &scope, depth + 1, seen, pages)?;
    }
    Ok(())
}

fn materialize_defaults(document: &mut Document, page_id: ObjectId) {
    let media_box = document
        .get_object(page_id)
        .ok()
        .and_then(|object| as_dict(document, object))
        .and_then(|page| page.get(b"MediaBox").ok())
        .and_then(|value| rect_array(document, value));

    if let Ok(Object::Dictionary(page)) = document.get_object_mut(page_id) {
        if media_box.is_none() {
            page.set("MediaBox", rect_object(DEFAULT_MEDIA_BOX));
        }
        if !page.has(b"Resources") {
            page.set("Resources", Object::Dictionary(Dictionary::new()));
        }
        page.set("Type", Object::Name(b"Page".to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use falzwerk_core::ErrorKind;

    #[test]
    fn open_reports_page_count_and_geometry() {
        let handle = PdfHandle::open(&fixtures::numbered_pdf(3), None).unwrap();
        assert_eq!(handle.page_count(), 3);
        let info = handle.page_info(2).unwrap();
        assert_eq!(info.number, 2);
        assert_eq!((info.width, info.height), (612.0, 792.0));
        assert_eq!(info.rotation, 0);
        assert_eq!(handle.fingerprint().len(), 16);
    }

    #[test]
    fn rejects_bytes_without_header() {
        let err = PdfHandle::open(b"hello world, definitely not a pdf", None)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidPdf);
    }

    #[test]
    fn rejects_truncated_documents() {
        let bytes = fixtures::numbered_pdf(2);
        let err = PdfHandle::open(&bytes[..40], None).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidPdf);
    }

    #[test]
    fn page_info_out_of_range_is_invalid_pages() {
        let handle = PdfHandle::open(&fixtures::numbered_pdf(2), None).unwrap();
        assert_eq!(handle.page_info(0).unwrap_err().kind(), ErrorKind::InvalidPages);
        assert_eq!(handle.page_info(3).unwrap_err().kind(), ErrorKind::InvalidPages);
    }

    #[test]
    fn nested_tree_is_flattened_with_inherited_attributes() {
        let handle = PdfHandle::open(&fixtures::nested_tree_pdf(), None).unwrap();
        assert_eq!(handle.page_count(), 3);
        // The middle node declares an A5 MediaBox and a rotation.
        let inherited = handle.page_info(2).unwrap();
        assert_eq!((inherited.width, inherited.height), (420.0, 595.0));
        assert_eq!(inherited.rotation, 90);
        assert_eq!(fixtures::page_labels(&handle), vec!["Page 1", "Page 2", "Page 3"]);

        let reopened = PdfHandle::open(&handle.save().unwrap(), None).unwrap();
        let info = reopened.page_info(2).unwrap();
        assert_eq!((info.width, info.height, info.rotation), (420.0, 595.0, 90));
        assert_eq!(reopened.page_info(1).unwrap().rotation, 0);
    }

    #[test]
    fn encrypted_without_password_is_rejected() {
        let encrypted = fixtures::encrypted_pdf(fixtures::ENCRYPTED_PASSWORD);
        let err = PdfHandle::open(&encrypted, None).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::EncryptedPdf);
    }

    #[test]
    fn encrypted_with_wrong_password_is_rejected() {
        let encrypted = fixtures::encrypted_pdf(fixtures::ENCRYPTED_PASSWORD);
        let err = PdfHandle::open(&encrypted, Some("wrong")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidPassword);
    }

    #[test]
    fn encrypted_with_correct_password_saves_unencrypted() {
        let encrypted = fixtures::encrypted_pdf(fixtures::ENCRYPTED_PASSWORD);
        let handle = PdfHandle::open(&encrypted, Some(fixtures::ENCRYPTED_PASSWORD)).unwrap();
        assert_eq!(handle.page_count(), 2);
        assert_eq!(fixtures::page_labels(&handle), vec!["Secret 1", "Secret 2"]);

        let saved = handle.save().unwrap();
        assert!(!Document::load_mem(&saved).unwrap().is_encrypted());
        let reopened = PdfHandle::open(&saved, None).unwrap();
        assert_eq!(fixtures::page_labels(&reopened), vec!["Secret 1", "Secret 2"]);
    }

    #[test]
    fn owner_password_is_not_a_user_password() {
        let encrypted = fixtures::encrypted_pdf(fixtures::ENCRYPTED_PASSWORD);
        let err = PdfHandle::open(&encrypted, Some(fixtures::OWNER_PASSWORD))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidPassword);
    }

    #[test]
    fn empty_user_password_opens_without_asking() {
        let encrypted = fixtures::encrypted_pdf("");
        let handle = PdfHandle::open(&encrypted, None).unwrap();
        assert_eq!(fixtures::page_labels(&handle), vec!["Secret 1", "Secret 2"]);
        let saved = handle.save().unwrap();
        assert!(!Document::load_mem(&saved).unwrap().is_encrypted());

        let err = PdfHandle::open(&encrypted, Some("wrong")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidPassword);
    }

    #[test]
    fn retired_pages_are_gone_from_saved_output() {
        let mut handle = PdfHandle::open(&fixtures::numbered_pdf(3), None).unwrap();
        handle.remove_pages(&BTreeSet::from([1]));
        let saved = handle.save().unwrap();
        let doc = Document::load_mem(&saved).unwrap();
        let page_objects = doc
            .objects
            .values()
            .filter(|object| {
                object
                    .as_dict()
                    .ok()
                    .and_then(|d| d.get(b"Type").ok())
                    .and_then(|t| t.as_name().ok())
                    == Some(b"Page".as_slice())
            })
            .count();
        assert_eq!(page_objects, 2);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cross-document object import. Copies a page and everything it references
// from one lopdf document into another, remapping object IDs.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use super::objects::has_type;

/// Copies objects out of `source`, remembering what it has already copied so
/// resources shared between pages land in the target exactly once.
pub(crate) struct ObjectImporter<'a> {
    source: &'a Document,
    mapping: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectImporter<'a> {
    pub(crate) fn new(source: &'a Document) -> Self {
        Self {
            source,
            mapping: HashMap::new(),
        }
    }

    /// Number of distinct source objects copied so far.
    pub(crate) fn imported_objects(&self) -> usize {
        self.mapping.len()
    }

    /// Copy page `page_id` into `target` under `parent` and return the new
    /// page's ID.
    ///
    /// Every call produces a fresh page object, so the same source page can be
    /// imported repeatedly; its content and resources are shared.
    pub(crate) fn import_page(
        &mut self,
        target: &mut Document,
        page_id: ObjectId,
        parent: ObjectId,
    ) -> Option<ObjectId> {
        let page = self.source.get_dictionary(page_id).ok()?;

        let mut copy = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.translate(target, value));
        }
        copy.set("Parent", Object::Reference(parent));

        let new_id = target.add_object(Object::Dictionary(copy));
        debug!(?page_id, ?new_id, "Page imported");
        Some(new_id)
    }

    fn import_object(&mut self, target: &mut Document, id: ObjectId) -> Object {
        // Other pages and page tree nodes are never dragged along by links
        // or annotation back-pointers.
        if has_type(self.source, id, b"Page") || has_type(self.source, id, b"Pages") {
            return Object::Null;
        }
        if let Some(&mapped) = self.mapping.get(&id) {
            return Object::Reference(mapped);
        }
        let Ok(original) = self.source.get_object(id) else {
            return Object::Null;
        };

        // Reserve the target ID first so cycles resolve to it.
        let new_id = target.new_object_id();
        self.mapping.insert(id, new_id);
        let copied = self.translate(target, original);
        target.objects.insert(new_id, copied);
        Object::Reference(new_id)
    }

    fn translate(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.import_object(target, *id),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.translate(target, item)).collect())
            }
            Object::Dictionary(dict) => Object::Dictionary(self.translate_dict(target, dict)),
            Object::Stream(stream) => {
                let dict = self.translate_dict(target, &stream.dict);
                let mut copy = Stream::new(dict, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn translate_dict(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            // Parent links point back up into structures we do not copy.
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.translate(target, value));
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn shared_resources_are_copied_once() {
        let source = Document::load_mem(&fixtures::numbered_pdf(3)).unwrap();
        let pages: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let mut target = Document::with_version("1.5");
        let parent = target.new_object_id();

        let mut importer = ObjectImporter::new(&source);
        let first = importer.import_page(&mut target, pages[0], parent).unwrap();
        let after_first = importer.imported_objects();
        let again = importer.import_page(&mut target, pages[0], parent).unwrap();
        importer.import_page(&mut target, pages[1], parent).unwrap();

        assert_ne!(first, again);
        // Content, resources dict and font for page 1; only page 2's content
        // stream is new after that.
        assert_eq!(after_first, 3);
        assert_eq!(importer.imported_objects(), 4);
    }

    #[test]
    fn references_to_other_pages_become_null() {
        let source = Document::load_mem(&fixtures::linked_pdf()).unwrap();
        let pages: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let mut target = Document::with_version("1.5");
        let parent = target.new_object_id();

        let mut importer = ObjectImporter::new(&source);
        let page = importer.import_page(&mut target, pages[0], parent).unwrap();

        let annots = target.get_dictionary(page).unwrap().get(b"Annots").unwrap();
        let link_id = annots.as_array().unwrap()[0].as_reference().unwrap();
        let dest = target
            .get_dictionary(link_id)
            .unwrap()
            .get(b"Dest")
            .unwrap()
            .as_array()
            .unwrap();
        assert!(matches!(dest[0], Object::Null));
    }
}

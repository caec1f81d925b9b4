// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page editor: delete, insert, import, extract, and rotate pages of an open
// handle. Page numbers are 1-indexed and every request is validated in full
// before the page sequence is touched.

use std::collections::BTreeSet;

use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::types::{
    DeleteDetails, ExtractDetails, InsertBlankDetails, InsertPdfDetails, InsertPosition,
    RotateDetails, Rotation,
};
use lopdf::{Dictionary, Object, Stream};
use tracing::{info, instrument};

use super::handle::PdfHandle;
use super::import::ObjectImporter;
use super::objects::rect_object;

impl PdfHandle {
    // -- Removal --------------------------------------------------------------

    /// Remove the named pages. Duplicates count once.
    #[instrument(skip_all, fields(fingerprint = %self.fingerprint(), requested = pages.len()))]
    pub fn delete_pages(&mut self, pages: &[u32]) -> Result<DeleteDetails> {
        if pages.is_empty() {
            return Err(FalzwerkError::InvalidPages(
                "no pages specified for deletion".to_string(),
            ));
        }
        let doomed: BTreeSet<usize> = self.page_indices(pages)?.into_iter().collect();
        if doomed.len() >= self.page_count() {
            return Err(FalzwerkError::InvalidPages(
                "cannot delete all pages from document".to_string(),
            ));
        }

        self.remove_pages(&doomed);

        info!(
            deleted = doomed.len(),
            remaining = self.page_count(),
            "Pages deleted"
        );
        Ok(DeleteDetails {
            deleted_pages: doomed.len(),
            remaining_pages: self.page_count(),
        })
    }

    /// Keep only the named pages, in ascending original order.
    #[instrument(skip_all, fields(fingerprint = %self.fingerprint(), requested = pages.len()))]
    pub fn extract_pages(&mut self, pages: &[u32]) -> Result<ExtractDetails> {
        if pages.is_empty() {
            return Err(FalzwerkError::InvalidPages(
                "no pages specified for extraction".to_string(),
            ));
        }
        let original = self.page_count();
        let keep: BTreeSet<usize> = self.page_indices(pages)?.into_iter().collect();
        let dropped: BTreeSet<usize> = (0..original).filter(|i| !keep.contains(i)).collect();

        self.remove_pages(&dropped);

        info!(extracted = keep.len(), original, "Pages extracted");
        Ok(ExtractDetails {
            extracted_pages: keep.len(),
            original_pages: original,
        })
    }

    // -- Insertion ------------------------------------------------------------

    /// Insert an empty page next to `reference_page`.
    ///
    /// Missing dimensions are taken from the reference page's MediaBox.
    #[instrument(skip_all, fields(
        fingerprint = %self.fingerprint(),
        position = ?position,
        reference_page = reference_page,
    ))]
    pub fn insert_blank_page(
        &mut self,
        position: InsertPosition,
        reference_page: u32,
        width: Option<f32>,
        height: Option<f32>,
    ) -> Result<InsertBlankDetails> {
        let reference = self.page_index(reference_page)?;
        for (label, value) in [("width", width), ("height", height)] {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(FalzwerkError::InvalidInput(format!(
                        "page {} must be a positive number, got {}",
                        label, value
                    )));
                }
            }
        }

        let [x0, y0, x1, y1] = self.media_box(self.pages()[reference]);
        let width = width.unwrap_or(x1 - x0);
        let height = height.unwrap_or(y1 - y0);

        let root = self.pages_root();
        let document = self.document_mut();
        let content_id = document.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(root));
        page.set("MediaBox", rect_object([0.0, 0.0, width, height]));
        page.set("Resources", Object::Dictionary(Dictionary::new()));
        page.set("Contents", Object::Reference(content_id));
        let page_id = document.add_object(Object::Dictionary(page));

        let index = insertion_index(position, reference);
        self.insert_page(index, page_id);

        info!(inserted_at = index + 1, width, height, "Blank page inserted");
        Ok(InsertBlankDetails {
            new_page_count: self.page_count(),
            inserted_at: index + 1,
        })
    }

    /// Import pages from `source` next to `reference_page`.
    ///
    /// `pages_to_insert` gives the source pages in the order they are
    /// inserted; `None` or an empty list takes every source page.
    #[instrument(skip_all, fields(
        fingerprint = %self.fingerprint(),
        source = %source.fingerprint(),
        position = ?position,
        reference_page = reference_page,
    ))]
    pub fn insert_pdf_pages(
        &mut self,
        source: &PdfHandle,
        position: InsertPosition,
        reference_page: u32,
        pages_to_insert: Option<&[u32]>,
    ) -> Result<InsertPdfDetails> {
        let reference = self.page_index(reference_page)?;
        let selected: Vec<usize> = match pages_to_insert {
            Some(numbers) if !numbers.is_empty() => source.page_indices(numbers)?,
            _ => (0..source.page_count()).collect(),
        };
        if selected.is_empty() {
            return Err(FalzwerkError::InvalidPages(
                "source PDF has no pages to insert".to_string(),
            ));
        }

        let root = self.pages_root();
        let mut importer = ObjectImporter::new(source.document());
        let mut imported = Vec::with_capacity(selected.len());
        for &index in &selected {
            let page_id = source.pages()[index];
            let new_id = importer
                .import_page(self.document_mut(), page_id, root)
                .ok_or_else(|| {
                    FalzwerkError::ProcessingFailed(format!(
                        "source page {} could not be read",
                        index + 1
                    ))
                })?;
            imported.push(new_id);
        }

        let start = insertion_index(position, reference);
        for (offset, page_id) in imported.iter().enumerate() {
            self.insert_page(start + offset, *page_id);
        }

        info!(
            inserted = imported.len(),
            objects_copied = importer.imported_objects(),
            new_page_count = self.page_count(),
            "Source pages inserted"
        );
        Ok(InsertPdfDetails {
            new_page_count: self.page_count(),
            inserted_pages: imported.len(),
        })
    }

    // -- Orientation ----------------------------------------------------------

    /// Set the absolute rotation of each named page.
    #[instrument(skip_all, fields(fingerprint = %self.fingerprint(), rotation = rotation))]
    pub fn rotate_pages(&mut self, pages: &[u32], rotation: i64) -> Result<RotateDetails> {
        let rotation = Rotation::try_from(rotation)?;
        if pages.is_empty() {
            return Err(FalzwerkError::InvalidPages(
                "no pages specified for rotation".to_string(),
            ));
        }
        let targets: BTreeSet<usize> = self.page_indices(pages)?.into_iter().collect();

        for &index in &targets {
            let page_id = self.pages()[index];
            let page = self
                .document_mut()
                .get_object_mut(page_id)
                .and_then(|object| object.as_dict_mut())
                .map_err(|err| {
                    FalzwerkError::ProcessingFailed(format!(
                        "page {} is not a dictionary: {}",
                        index + 1,
                        err
                    ))
                })?;
            page.set("Rotate", Object::Integer(rotation.degrees()));
        }

        info!(rotated = targets.len(), degrees = rotation.degrees(), "Pages rotated");
        Ok(RotateDetails {
            rotated_pages: targets.len(),
            rotation: rotation.degrees(),
        })
    }
}

fn insertion_index(position: InsertPosition, reference: usize) -> usize {
    match position {
        InsertPosition::Before => reference,
        InsertPosition::After => reference + 1,
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redaction engine: rewrites page content streams so that glyphs, paths,
// images and shadings under a region are gone, then paints the fill
// rectangles and any replacement text.

use std::collections::{BTreeMap, HashSet};

use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::types::{Color, RedactionDetails, RedactionSpec, Region, ReplacementText, TextOverlay};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, info, instrument, warn};

use super::content::{self, PageContent};
use super::geometry::{Matrix, Rect};
use super::interpreter::{Glyph, GlyphRun, Interpreter, Primitive, RunElement, Step};
use crate::pdf::PdfHandle;
use crate::pdf::objects::{as_dict, dict_entry, name, resolve};

/// A glyph goes when strictly more than this share of its box is covered.
const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.5;
const MAX_FORM_DEPTH: usize = 12;
const REPLACEMENT_FONT: &str = "FzHelv";
const REDACTED_FORM_PREFIX: &str = "FzForm";

/// Removes content intersecting rectangular regions from pages.
#[derive(Debug, Clone, Copy)]
pub struct Redactor {
    overlap_threshold: f32,
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }
}

/// Everything one page receives.
#[derive(Default)]
struct PagePlan {
    fills: Vec<(Region, Color)>,
    texts: Vec<TextOverlay>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Removed {
    glyphs: usize,
    paths: usize,
    images: usize,
}

impl Removed {
    fn total(&self) -> usize {
        self.glyphs + self.paths + self.images
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `redactions` and `replacements` to the handle's pages.
    ///
    /// Every page number, region, color and text overlay is validated before any
    /// page is modified.
    #[instrument(skip_all, fields(
        fingerprint = %handle.fingerprint(),
        redactions = redactions.len(),
        replacements = replacements.len(),
    ))]
    pub fn redact(
        &self,
        handle: &mut PdfHandle,
        redactions: &[RedactionSpec],
        replacements: &[ReplacementText],
    ) -> Result<RedactionDetails> {
        let plans = plan_pages(handle, redactions, replacements)?;
        let mut details = RedactionDetails {
            redacted_areas: redactions.len(),
            ..RedactionDetails::default()
        };

        for (index, plan) in &plans {
            let page_id = handle.pages()[*index];
            let removed = self.redact_page(handle, page_id, plan)?;
            debug!(
                page = index + 1,
                glyphs = removed.glyphs,
                paths = removed.paths,
                images = removed.images,
                "Page redacted"
            );
            details.removed_glyphs += removed.glyphs;
            details.removed_paths += removed.paths;
            details.removed_images += removed.images;
            details.replacement_texts += plan.texts.len();
        }
        details.pages_affected = plans.len();

        info!(
            pages = details.pages_affected,
            removed_glyphs = details.removed_glyphs,
            removed_paths = details.removed_paths,
            removed_images = details.removed_images,
            "Redaction applied"
        );
        Ok(details)
    }

    fn redact_page(&self, handle: &mut PdfHandle, page_id: ObjectId, plan: &PagePlan) -> Result<Removed> {
        // Regions are measured from the top-left of the visible area,
        // ignoring /Rotate.
        let [cx0, _, _, cy1] = handle.crop_box(page_id);
        let to_user = |region: &Region| {
            Rect::new(
                cx0 + region.x,
                cy1 - region.y - region.height,
                cx0 + region.x + region.width,
                cy1 - region.y,
            )
        };
        let regions: Vec<Rect> = plan.fills.iter().map(|(region, _)| to_user(region)).collect();

        // Analysis only reads the document; new objects are collected and
        // inserted afterwards under pre-allocated IDs.
        let doc = handle.document();
        let page = handle
            .page_dict(page_id)
            .ok_or_else(|| FalzwerkError::ProcessingFailed("page object is not a dictionary".to_string()))?;
        let resources = page
            .get(b"Resources")
            .ok()
            .and_then(|value| as_dict(doc, value))
            .map(|dict| privatize_resources(doc, dict))
            .unwrap_or_default();
        let bytes = doc.get_page_content(page_id).map_err(|err| {
            FalzwerkError::ProcessingFailed(format!("failed to read page content: {}", err))
        })?;
        let PageContent {
            operations,
            inline_images,
        } = PageContent::decode(&bytes)?;

        let mut excision = Excision {
            doc,
            regions: &regions,
            threshold: self.overlap_threshold,
            next_id: doc.max_id + 1,
            new_objects: Vec::new(),
            removed: Removed::default(),
        };
        let rewritten = excision.rewrite(&operations, &resources, Matrix::IDENTITY, None, 0)?;
        let Excision {
            next_id,
            new_objects,
            removed,
            ..
        } = excision;

        let mut resources = resources;
        for (name, id) in &rewritten.forms {
            set_resource(&mut resources, b"XObject", name.clone(), Object::Reference(*id));
        }

        let mut page_ops = Vec::with_capacity(rewritten.operations.len() + 8);
        page_ops.push(Operation::new("q", vec![]));
        page_ops.extend(rewritten.operations);
        page_ops.push(Operation::new("Q", vec![]));
        for ((_, color), rect) in plan.fills.iter().zip(&regions) {
            page_ops.extend(fill_operations(rect, color));
        }
        let mut objects = new_objects;
        let mut next_id = next_id;
        if !plan.texts.is_empty() {
            let font_name = unused_name(&resources, b"Font", REPLACEMENT_FONT);
            let font_id = (next_id, 0);
            next_id += 1;
            set_resource(&mut resources, b"Font", font_name.clone(), Object::Reference(font_id));
            objects.push((font_id, Object::Dictionary(replacement_font())));
            for overlay in &plan.texts {
                page_ops.extend(text_operations(overlay, &font_name, cx0, cy1));
            }
        }
        let encoded = content::encode(&page_ops, &inline_images)?;
        self.commit(handle, page_id, resources, &page_ops, encoded, objects, next_id, removed)
    }

    #[allow(clippy::too_many_arguments)]
    fn commit(
        &self,
        handle: &mut PdfHandle,
        page_id: ObjectId,
        mut resources: Dictionary,
        operations: &[Operation],
        encoded: Vec<u8>,
        objects: Vec<(ObjectId, Object)>,
        next_id: u32,
        removed: Removed,
    ) -> Result<Removed> {
        prune_resources(handle.document(), &mut resources, operations, 0);

        let doc = handle.document_mut();
        for (id, object) in objects {
            doc.objects.insert(id, object);
        }
        doc.max_id = doc.max_id.max(next_id.saturating_sub(1));
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page = doc
            .get_object_mut(page_id)
            .and_then(|object| object.as_dict_mut())
            .map_err(|err| FalzwerkError::ProcessingFailed(format!("page object unusable: {}", err)))?;
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));
        Ok(removed)
    }
}

/// Validate the whole request and group it by 0-indexed page.
fn plan_pages(
    handle: &PdfHandle,
    redactions: &[RedactionSpec],
    replacements: &[ReplacementText],
) -> Result<BTreeMap<usize, PagePlan>> {
    if redactions.is_empty() {
        return Err(FalzwerkError::InvalidInput(
            "no redactions specified".to_string(),
        ));
    }
    let numbers: Vec<u32> = redactions
        .iter()
        .map(|redaction| redaction.page)
        .chain(replacements.iter().map(|text| text.page))
        .collect();
    handle.page_indices(&numbers)?;

    for redaction in redactions {
        redaction.validate()?;
    }
    for text in replacements {
        text.overlay.validate()?;
    }

    let mut plans: BTreeMap<usize, PagePlan> = BTreeMap::new();
    for redaction in redactions {
        let plan = plans.entry(redaction.page as usize - 1).or_default();
        plan.fills.push((redaction.region, redaction.fill));
        if let Some(overlay) = &redaction.replacement {
            plan.texts.push(overlay.clone());
        }
    }
    for text in replacements {
        plans
            .entry(text.page as usize - 1)
            .or_default()
            .texts
            .push(text.overlay.clone());
    }
    Ok(plans)
}

struct Rewritten {
    operations: Vec<Operation>,
    /// XObject resources to add: private redacted copies of forms.
    forms: Vec<(Vec<u8>, ObjectId)>,
}

/// Per-page rewriting context.
struct Excision<'a> {
    doc: &'a Document,
    regions: &'a [Rect],
    threshold: f32,
    next_id: u32,
    new_objects: Vec<(ObjectId, Object)>,
    removed: Removed,
}

impl<'a> Excision<'a> {
    fn hits(&self, rect: &Rect) -> bool {
        self.regions.iter().any(|region| region.intersects(rect))
    }

    fn glyph_hit(&self, glyph: &Glyph) -> bool {
        let area = glyph.bbox.area();
        if area <= f32::EPSILON {
            let (x, y) = glyph.origin;
            return self.regions.iter().any(|region| region.contains_point(x, y));
        }
        self.regions.iter().any(|region| {
            region
                .intersection(&glyph.bbox)
                .is_some_and(|overlap| overlap.area() / area > self.threshold)
        })
    }

    fn allocate(&mut self) -> ObjectId {
        let id = (self.next_id, 0);
        self.next_id += 1;
        id
    }

    fn rewrite(
        &mut self,
        operations: &[Operation],
        resources: &Dictionary,
        ctm: Matrix,
        clip: Option<Rect>,
        depth: usize,
    ) -> Result<Rewritten> {
        if depth > MAX_FORM_DEPTH {
            return Err(FalzwerkError::ProcessingFailed(
                "form XObjects nested too deeply".to_string(),
            ));
        }

        let doc = self.doc;
        let mut interpreter = Interpreter::new(doc, resources, ctm).with_clip(clip);
        let mut output = Vec::with_capacity(operations.len());
        let mut pending_path: Vec<Operation> = Vec::new();
        let mut forms = Vec::new();
        let mut taken_names: HashSet<Vec<u8>> = HashSet::new();

        for op in operations {
            match interpreter.step(op) {
                Step::State => {
                    output.append(&mut pending_path);
                    output.push(op.clone());
                }
                Step::PathSegment | Step::ClipMark => pending_path.push(op.clone()),
                Step::Paint(Primitive::Path(path)) => {
                    let hit = path.paints && path.bbox.is_some_and(|bbox| self.hits(&bbox));
                    if !hit {
                        output.append(&mut pending_path);
                        output.push(op.clone());
                    } else if path.clips {
                        self.removed.paths += 1;
                        output.append(&mut pending_path);
                        output.push(Operation::new("n", vec![]));
                    } else {
                        self.removed.paths += 1;
                        pending_path.clear();
                    }
                }
                Step::Paint(Primitive::GlyphRun(run)) => match self.rewrite_text(op, &run) {
                    Some(replacement) => output.extend(replacement),
                    None => output.push(op.clone()),
                },
                Step::Paint(Primitive::Image(image)) => {
                    if self.hits(&image.bbox) {
                        self.removed.images += 1;
                    } else {
                        output.push(op.clone());
                    }
                }
                Step::Paint(Primitive::Shading(fill)) => {
                    // Without a clip a shading covers everything.
                    if fill.bbox.is_none_or(|bbox| self.hits(&bbox)) {
                        self.removed.paths += 1;
                    } else {
                        output.push(op.clone());
                    }
                }
                Step::Form { name, ctm, bbox } => {
                    if !bbox.is_none_or(|bbox| self.hits(&bbox)) {
                        output.push(op.clone());
                        continue;
                    }
                    match self.redact_form(&name, resources, ctm, interpreter.clip(), depth)? {
                        Some(form_id) => {
                            let new_name = fresh_form_name(resources, &mut taken_names);
                            forms.push((new_name.clone(), form_id));
                            output.push(Operation::new("Do", vec![Object::Name(new_name)]));
                        }
                        None => output.push(op.clone()),
                    }
                }
            }
        }
        output.append(&mut pending_path);

        Ok(Rewritten {
            operations: output,
            forms,
        })
    }

    /// Redact form `/name` into a private copy. `None` when nothing in it
    /// was touched, so the original can stay.
    fn redact_form(
        &mut self,
        name: &[u8],
        resources: &Dictionary,
        ctm: Matrix,
        clip: Option<Rect>,
        depth: usize,
    ) -> Result<Option<ObjectId>> {
        let doc = self.doc;
        let Some(Object::Stream(form)) = dict_entry(doc, resources, b"XObject")
            .and_then(|xobjects| xobjects.get(name).ok())
            .map(|object| resolve(doc, object))
        else {
            return Ok(None);
        };

        let bytes = if form.dict.has(b"Filter") {
            form.decompressed_content().map_err(|err| {
                FalzwerkError::ProcessingFailed(format!("failed to decompress form: {}", err))
            })?
        } else {
            form.content.clone()
        };
        let PageContent {
            operations,
            inline_images,
        } = PageContent::decode(&bytes)?;

        // A form without its own resources draws with its parent's.
        let mut form_resources = form
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|value| as_dict(doc, value))
            .map(|dict| privatize_resources(doc, dict))
            .unwrap_or_else(|| privatize_resources(doc, resources));

        let before = self.removed;
        let rewritten = self.rewrite(&operations, &form_resources, ctm, clip, depth + 1)?;
        if self.removed.total() == before.total() {
            return Ok(None);
        }

        for (form_name, id) in &rewritten.forms {
            set_resource(&mut form_resources, b"XObject", form_name.clone(), Object::Reference(*id));
        }
        prune_resources(doc, &mut form_resources, &rewritten.operations, 0);

        let encoded = content::encode(&rewritten.operations, &inline_images)?;

        let mut dict = form.dict.clone();
        for key in [b"Filter".as_slice(), b"DecodeParms", b"Length"] {
            dict.remove(key);
        }
        dict.set("Resources", Object::Dictionary(form_resources));

        let id = self.allocate();
        self.new_objects.push((id, Object::Stream(Stream::new(dict, encoded))));
        Ok(Some(id))
    }

    /// Rebuild a text-showing operator without the covered glyphs, as `TJ`
    /// with each removed glyph replaced by an equal displacement.
    fn rewrite_text(&mut self, op: &Operation, run: &GlyphRun) -> Option<Vec<Operation>> {
        let doomed: Vec<Vec<bool>> = run
            .elements
            .iter()
            .map(|element| match element {
                RunElement::Glyphs { glyphs, .. } => glyphs.iter().map(|g| self.glyph_hit(g)).collect(),
                RunElement::Adjust(_) => Vec::new(),
            })
            .collect();
        let removed: usize = doomed.iter().flatten().filter(|&&d| d).count();
        if removed == 0 {
            return None;
        }
        self.removed.glyphs += removed;

        let mut items = Vec::new();
        for (element, doomed) in run.elements.iter().zip(&doomed) {
            match element {
                RunElement::Adjust(adjust) => items.push(adjust.clone()),
                RunElement::Glyphs { glyphs, format } => {
                    let mut kept: Vec<u8> = Vec::new();
                    for (glyph, &gone) in glyphs.iter().zip(doomed) {
                        if !gone {
                            kept.extend_from_slice(&glyph.code);
                            continue;
                        }
                        if !kept.is_empty() {
                            items.push(Object::String(std::mem::take(&mut kept), format.clone()));
                        }
                        if run.font_size.abs() > f32::EPSILON {
                            items.push(Object::Real(-glyph.advance * 1000.0 / run.font_size));
                        } else {
                            warn!("Glyph removed under a zero font size; pen position not preserved");
                        }
                    }
                    if !kept.is_empty() {
                        items.push(Object::String(kept, format.clone()));
                    }
                }
            }
        }

        let mut replacement = Vec::with_capacity(4);
        match op.operator.as_str() {
            "'" => replacement.push(Operation::new("T*", vec![])),
            "\"" => {
                let operand = |i: usize| op.operands.get(i).cloned().unwrap_or(Object::Integer(0));
                replacement.push(Operation::new("Tw", vec![operand(0)]));
                replacement.push(Operation::new("Tc", vec![operand(1)]));
                replacement.push(Operation::new("T*", vec![]));
            }
            _ => {}
        }
        replacement.push(Operation::new("TJ", vec![Object::Array(items)]));
        Some(replacement)
    }
}

/// Copy a resource dictionary so that its `/Font` and `/XObject` entries can
/// be edited without touching anything shared with other pages.
fn privatize_resources(doc: &Document, resources: &Dictionary) -> Dictionary {
    let mut private = resources.clone();
    for key in [b"Font".as_slice(), b"XObject"] {
        if let Some(dict) = dict_entry(doc, resources, key) {
            private.set(key.to_vec(), Object::Dictionary(dict.clone()));
        }
    }
    private
}

/// Set `/category /name value` in a resource dictionary, making the
/// category sub-dictionary direct if it is not already.
fn set_resource(resources: &mut Dictionary, category: &[u8], name: Vec<u8>, value: Object) {
    let mut entries = match resources.remove(category) {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    entries.set(name, value);
    resources.set(category.to_vec(), Object::Dictionary(entries));
}

fn unused_name(resources: &Dictionary, category: &[u8], base: &str) -> Vec<u8> {
    let taken = |candidate: &[u8]| {
        matches!(resources.get(category), Ok(Object::Dictionary(dict)) if dict.has(candidate))
    };
    let mut candidate = base.as_bytes().to_vec();
    let mut counter = 1;
    while taken(&candidate) {
        candidate = format!("{}{}", base, counter).into_bytes();
        counter += 1;
    }
    candidate
}

fn fresh_form_name(resources: &Dictionary, taken_names: &mut HashSet<Vec<u8>>) -> Vec<u8> {
    let mut counter = taken_names.len() + 1;
    loop {
        let candidate = format!("{}{}", REDACTED_FORM_PREFIX, counter).into_bytes();
        let clashes = matches!(resources.get(b"XObject"), Ok(Object::Dictionary(dict)) if dict.has(&candidate));
        if !clashes && taken_names.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Drop `/Font` and `/XObject` entries that `operations` never names.
///
/// Forms without their own resources draw with these, so their content is
/// scanned as well.
fn prune_resources(doc: &Document, resources: &mut Dictionary, operations: &[Operation], depth: usize) {
    let mut fonts = HashSet::new();
    let mut xobjects = HashSet::new();
    collect_used(doc, resources, operations, &mut fonts, &mut xobjects, depth);

    for (key, used) in [(b"Font".as_slice(), &fonts), (b"XObject".as_slice(), &xobjects)] {
        if let Ok(Object::Dictionary(dict)) = resources.get_mut(key) {
            let unused: Vec<Vec<u8>> = dict
                .iter()
                .map(|(name, _)| name.clone())
                .filter(|name| !used.contains(name))
                .collect();
            for name in unused {
                debug!(resource = %String::from_utf8_lossy(&name), "Unused resource dropped");
                dict.remove(&name);
            }
        }
    }
}

fn collect_used(
    doc: &Document,
    resources: &Dictionary,
    operations: &[Operation],
    fonts: &mut HashSet<Vec<u8>>,
    xobjects: &mut HashSet<Vec<u8>>,
    depth: usize,
) {
    for op in operations {
        let Some(operand) = op.operands.first().and_then(name) else {
            continue;
        };
        match op.operator.as_str() {
            "Tf" => {
                fonts.insert(operand.to_vec());
            }
            "Do" => {
                if !xobjects.insert(operand.to_vec()) || depth >= MAX_FORM_DEPTH {
                    continue;
                }
                let form = dict_entry(doc, resources, b"XObject")
                    .and_then(|dict| dict.get(operand).ok())
                    .map(|object| resolve(doc, object));
                if let Some(Object::Stream(form)) = form {
                    if form.dict.has(b"Resources") {
                        continue;
                    }
                    let bytes = if form.dict.has(b"Filter") {
                        form.decompressed_content().unwrap_or_default()
                    } else {
                        form.content.clone()
                    };
                    if let Ok(form_content) = PageContent::decode(&bytes) {
                        collect_used(doc, resources, &form_content.operations, fonts, xobjects, depth + 1);
                    }
                }
            }
            _ => {}
        }
    }
}

fn fill_operations(rect: &Rect, color: &Color) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "rg",
            vec![Object::Real(color.r), Object::Real(color.g), Object::Real(color.b)],
        ),
        Operation::new(
            "re",
            vec![
                Object::Real(rect.x0),
                Object::Real(rect.y0),
                Object::Real(rect.width()),
                Object::Real(rect.height()),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn text_operations(overlay: &TextOverlay, font: &[u8], page_x0: f32, page_top: f32) -> Vec<Operation> {
    let x = page_x0 + overlay.x;
    let baseline = page_top - overlay.y - overlay.font_size;
    vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font.to_vec()), Object::Real(overlay.font_size)],
        ),
        Operation::new(
            "rg",
            vec![
                Object::Real(overlay.color.r),
                Object::Real(overlay.color.g),
                Object::Real(overlay.color.b),
            ],
        ),
        Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                Object::Real(x),
                Object::Real(baseline),
            ],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(&overlay.text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn replacement_font() -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font
}

/// Encode text for a WinAnsi simple font; anything unmappable becomes `?`.
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => ch as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}

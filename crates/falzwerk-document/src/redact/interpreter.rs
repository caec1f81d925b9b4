// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content stream interpreter. Tracks enough graphics and text state to say,
// for each operator, what it draws and where, in page user space.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, StringFormat};

use super::content::INLINE_IMAGE;
use super::fonts::FontMetrics;
use super::geometry::{Matrix, Rect};
use crate::pdf::objects::{as_dict, dict_entry, name, number, rect_array, resolve};

/// One shown glyph.
#[derive(Debug, Clone)]
pub(crate) struct Glyph {
    /// The character code's bytes, exactly as they appeared in the string.
    pub code: Vec<u8>,
    pub bbox: Rect,
    pub origin: (f32, f32),
    /// Horizontal displacement in unscaled text space: `w0·Tfs + Tc (+ Tw)`.
    pub advance: f32,
}

/// Piece of a text-showing operand list.
#[derive(Debug, Clone)]
pub(crate) enum RunElement {
    Glyphs {
        glyphs: Vec<Glyph>,
        format: StringFormat,
    },
    /// A `TJ` positioning number, kept verbatim.
    Adjust(Object),
}

#[derive(Debug, Clone)]
pub(crate) struct GlyphRun {
    pub elements: Vec<RunElement>,
    pub font_size: f32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PathPaint {
    /// User-space bounds, already inflated by half the line width.
    pub bbox: Option<Rect>,
    /// The path is also installed as a clip (`W`/`W*` preceded the paint).
    pub clips: bool,
    /// `false` for `n`, which ends the path without marking the page.
    pub paints: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ImagePlacement {
    pub bbox: Rect,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ShadingFill {
    /// Current clip bounds; `None` when nothing clips the fill.
    pub bbox: Option<Rect>,
}

/// The closed set of things a content stream can draw.
#[derive(Debug, Clone)]
pub(crate) enum Primitive {
    GlyphRun(GlyphRun),
    Path(PathPaint),
    Image(ImagePlacement),
    Shading(ShadingFill),
}

/// What one operator amounts to.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// State change or anything we pass through untouched.
    State,
    /// Path construction (`m`, `l`, `re`, …).
    PathSegment,
    /// `W` or `W*`; takes effect at the next painting operator.
    ClipMark,
    Paint(Primitive),
    /// A form XObject invocation.
    Form {
        name: Vec<u8>,
        /// Form space to user space: `/Matrix × CTM`.
        ctm: Matrix,
        bbox: Option<Rect>,
    },
}

#[derive(Debug, Clone)]
struct TextState {
    font: Rc<FontMetrics>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Rc::new(FontMetrics::default()),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    line_width: f32,
    clip: Option<Rect>,
    text: TextState,
}

pub(crate) struct Interpreter<'a> {
    doc: &'a Document,
    resources: &'a Dictionary,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    path: Vec<(f32, f32)>,
    pending_clip: bool,
    fonts: HashMap<Vec<u8>, Rc<FontMetrics>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a Document, resources: &'a Dictionary, ctm: Matrix) -> Self {
        Self {
            doc,
            resources,
            state: GraphicsState {
                ctm,
                line_width: 1.0,
                clip: None,
                text: TextState::default(),
            },
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            path: Vec::new(),
            pending_clip: false,
            fonts: HashMap::new(),
        }
    }

    /// Start from an inherited clip, as a form drawn inside a clipped area does.
    pub fn with_clip(mut self, clip: Option<Rect>) -> Self {
        self.state.clip = clip;
        self
    }

    pub fn clip(&self) -> Option<Rect> {
        self.state.clip
    }

    pub fn step(&mut self, op: &Operation) -> Step {
        let operands = op.operands.as_slice();
        let num = |i: usize| operands.get(i).and_then(number).unwrap_or(0.0);

        match op.operator.as_str() {
            // -- Graphics state -------------------------------------------
            "q" => {
                self.stack.push(self.state.clone());
                Step::State
            }
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
                Step::State
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.state.ctm = m.multiply(&self.state.ctm);
                }
                Step::State
            }
            "w" => {
                self.state.line_width = num(0);
                Step::State
            }
            "gs" => {
                self.apply_ext_gstate(operands);
                Step::State
            }

            // -- Path construction ----------------------------------------
            "m" | "l" => {
                self.add_points(&[(num(0), num(1))]);
                Step::PathSegment
            }
            "c" => {
                self.add_points(&[(num(0), num(1)), (num(2), num(3)), (num(4), num(5))]);
                Step::PathSegment
            }
            "v" | "y" => {
                self.add_points(&[(num(0), num(1)), (num(2), num(3))]);
                Step::PathSegment
            }
            "re" => {
                let (x, y, w, h) = (num(0), num(1), num(2), num(3));
                self.add_points(&[(x, y), (x + w, y), (x + w, y + h), (x, y + h)]);
                Step::PathSegment
            }
            "h" => Step::PathSegment,
            "W" | "W*" => {
                self.pending_clip = true;
                Step::ClipMark
            }

            // -- Path painting --------------------------------------------
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                Step::Paint(Primitive::Path(self.finish_path(true)))
            }
            "n" => Step::Paint(Primitive::Path(self.finish_path(false))),

            // -- Text objects and state -----------------------------------
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
                Step::State
            }
            "Tf" => {
                let font = operands.first().and_then(name).map(|n| self.font(n));
                if let Some(font) = font {
                    self.state.text.font = font;
                }
                self.state.text.size = num(1);
                Step::State
            }
            "Tc" => {
                self.state.text.char_spacing = num(0);
                Step::State
            }
            "Tw" => {
                self.state.text.word_spacing = num(0);
                Step::State
            }
            "Tz" => {
                self.state.text.horizontal_scale = num(0) / 100.0;
                Step::State
            }
            "TL" => {
                self.state.text.leading = num(0);
                Step::State
            }
            "Ts" => {
                self.state.text.rise = num(0);
                Step::State
            }
            "Td" => {
                self.move_line(num(0), num(1));
                Step::State
            }
            "TD" => {
                self.state.text.leading = -num(1);
                self.move_line(num(0), num(1));
                Step::State
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
                Step::State
            }
            "T*" => {
                self.next_line();
                Step::State
            }

            // -- Text showing ---------------------------------------------
            "Tj" => Step::Paint(Primitive::GlyphRun(self.show_operands(operands))),
            "TJ" => {
                let items = match operands.first() {
                    Some(Object::Array(items)) => items.as_slice(),
                    _ => &[],
                };
                Step::Paint(Primitive::GlyphRun(self.show_operands(items)))
            }
            "'" => {
                self.next_line();
                Step::Paint(Primitive::GlyphRun(self.show_operands(operands)))
            }
            "\"" => {
                self.state.text.word_spacing = num(0);
                self.state.text.char_spacing = num(1);
                self.next_line();
                Step::Paint(Primitive::GlyphRun(self.show_operands(operands.get(2..).unwrap_or(&[]))))
            }

            // -- XObjects, inline images, shadings ------------------------
            "Do" => match operands.first().and_then(name) {
                Some(xobject) => self.invoke_xobject(xobject),
                None => Step::State,
            },
            INLINE_IMAGE => Step::Paint(Primitive::Image(ImagePlacement {
                bbox: self.state.ctm.transform_rect(&Rect::UNIT),
            })),
            "sh" => Step::Paint(Primitive::Shading(ShadingFill {
                bbox: self.state.clip,
            })),

            _ => Step::State,
        }
    }

    fn add_points(&mut self, points: &[(f32, f32)]) {
        let ctm = self.state.ctm;
        self.path
            .extend(points.iter().map(|&(x, y)| ctm.transform_point(x, y)));
    }

    fn finish_path(&mut self, paints: bool) -> PathPaint {
        let half_width = self.state.line_width.abs() * self.state.ctm.scale() / 2.0;
        let bbox = Rect::bounding(self.path.drain(..)).map(|rect| rect.inflate(half_width));
        let clips = std::mem::take(&mut self.pending_clip);
        if clips {
            self.state.clip = match (self.state.clip, bbox) {
                (Some(current), Some(path)) => Some(
                    current
                        .intersection(&path)
                        .unwrap_or(Rect::new(path.x0, path.y0, path.x0, path.y0)),
                ),
                (None, path) => path,
                (current, None) => current,
            };
        }
        PathPaint {
            bbox,
            clips,
            paints,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn show_operands(&mut self, operands: &[Object]) -> GlyphRun {
        let mut elements = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Object::String(bytes, format) => elements.push(RunElement::Glyphs {
                    glyphs: self.show_string(bytes),
                    format: format.clone(),
                }),
                other => {
                    if let Some(adjust) = number(other) {
                        let text = &self.state.text;
                        let tx = -adjust / 1000.0 * text.size * text.horizontal_scale;
                        self.text_matrix = Matrix::translation(tx, 0.0).multiply(&self.text_matrix);
                    }
                    elements.push(RunElement::Adjust(other.clone()));
                }
            }
        }
        GlyphRun {
            elements,
            font_size: self.state.text.size,
        }
    }

    fn show_string(&mut self, bytes: &[u8]) -> Vec<Glyph> {
        let text = self.state.text.clone();
        let font = &text.font;
        let code_len = font.code_len().max(1);
        let mut glyphs = Vec::with_capacity(bytes.len() / code_len + 1);

        for chunk in bytes.chunks(code_len) {
            let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
            let w0 = font.width(code) / 1000.0;
            let render = Matrix::new(
                text.size * text.horizontal_scale,
                0.0,
                0.0,
                text.size,
                0.0,
                text.rise,
            )
            .multiply(&self.text_matrix)
            .multiply(&self.state.ctm);

            let glyph_box = Rect::new(0.0, font.descent(), w0, font.ascent());
            let is_space = chunk.len() == 1 && code == 32;
            let advance = w0 * text.size
                + text.char_spacing
                + if is_space { text.word_spacing } else { 0.0 };

            glyphs.push(Glyph {
                code: chunk.to_vec(),
                bbox: render.transform_rect(&glyph_box),
                origin: render.transform_point(0.0, 0.0),
                advance,
            });

            self.text_matrix = Matrix::translation(advance * text.horizontal_scale, 0.0)
                .multiply(&self.text_matrix);
        }
        glyphs
    }

    fn font(&mut self, resource: &[u8]) -> Rc<FontMetrics> {
        if let Some(font) = self.fonts.get(resource) {
            return Rc::clone(font);
        }
        let metrics = dict_entry(self.doc, self.resources, b"Font")
            .and_then(|fonts| fonts.get(resource).ok())
            .and_then(|font| as_dict(self.doc, font))
            .map(|font| FontMetrics::load(self.doc, font))
            .unwrap_or_default();
        let metrics = Rc::new(metrics);
        self.fonts.insert(resource.to_vec(), Rc::clone(&metrics));
        metrics
    }

    fn apply_ext_gstate(&mut self, operands: &[Object]) {
        let Some(key) = operands.first().and_then(name) else {
            return;
        };
        let Some(params) = dict_entry(self.doc, self.resources, b"ExtGState")
            .and_then(|states| states.get(key).ok())
            .and_then(|state| as_dict(self.doc, state))
        else {
            return;
        };
        if let Some(width) = params.get(b"LW").ok().and_then(|lw| number(resolve(self.doc, lw))) {
            self.state.line_width = width;
        }
        let font = match params.get(b"Font").ok().map(|f| resolve(self.doc, f)) {
            Some(Object::Array(items)) if items.len() == 2 => Some(items.clone()),
            _ => None,
        };
        if let Some(items) = font {
            if let Some(dict) = as_dict(self.doc, &items[0]) {
                self.state.text.font = Rc::new(FontMetrics::load(self.doc, dict));
            }
            if let Some(size) = number(resolve(self.doc, &items[1])) {
                self.state.text.size = size;
            }
        }
    }

    fn invoke_xobject(&mut self, xobject: &[u8]) -> Step {
        let Some(dict) = dict_entry(self.doc, self.resources, b"XObject")
            .and_then(|xobjects| xobjects.get(xobject).ok())
            .and_then(|object| as_dict(self.doc, object))
        else {
            return Step::State;
        };

        match dict.get(b"Subtype").ok().and_then(name) {
            Some(b"Image") => Step::Paint(Primitive::Image(ImagePlacement {
                bbox: self.state.ctm.transform_rect(&Rect::UNIT),
            })),
            Some(b"Form") => {
                let matrix = dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| match resolve(self.doc, m) {
                        Object::Array(items) => Matrix::from_operands(items),
                        _ => None,
                    })
                    .unwrap_or(Matrix::IDENTITY);
                let ctm = matrix.multiply(&self.state.ctm);
                let bbox = dict
                    .get(b"BBox")
                    .ok()
                    .and_then(|b| rect_array(self.doc, b))
                    .map(|[x0, y0, x1, y1]| ctm.transform_rect(&Rect::new(x0, y0, x1, y1)));
                Step::Form {
                    name: xobject.to_vec(),
                    ctm,
                    bbox,
                }
            }
            _ => Step::State,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn courier_resources() -> Dictionary {
        dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! { "Subtype" => "Type1", "BaseFont" => "Courier" },
            },
        }
    }

    fn run(ops: &[Operation], resources: &Dictionary) -> Vec<Step> {
        let doc = Document::with_version("1.5");
        let mut interpreter = Interpreter::new(&doc, resources, Matrix::IDENTITY);
        ops.iter().map(|op| interpreter.step(op)).collect()
    }

    fn glyphs(step: &Step) -> Vec<Glyph> {
        match step {
            Step::Paint(Primitive::GlyphRun(run)) => run
                .elements
                .iter()
                .flat_map(|element| match element {
                    RunElement::Glyphs { glyphs, .. } => glyphs.clone(),
                    RunElement::Adjust(_) => Vec::new(),
                })
                .collect(),
            other => panic!("expected glyph run, got {other:?}"),
        }
    }

    #[test]
    fn glyph_boxes_follow_font_size_and_widths() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![100.into(), 200.into()]),
            Operation::new("Tj", vec![Object::string_literal("AB")]),
            Operation::new("ET", vec![]),
        ];
        let steps = run(&ops, &courier_resources());
        let shown = glyphs(&steps[3]);
        assert_eq!(shown.len(), 2);
        // Courier: 600/1000 em at 10pt = 6pt per glyph.
        assert_eq!(shown[0].bbox, Rect::new(100.0, 198.0, 106.0, 208.0));
        assert_eq!(shown[1].bbox, Rect::new(106.0, 198.0, 112.0, 208.0));
        assert_eq!(shown[1].advance, 6.0);
    }

    #[test]
    fn tj_adjustments_and_spacing_move_the_pen() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Tw", vec![4.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal(" "),
                    Object::Integer(-1000),
                    Object::string_literal("X"),
                ])],
            ),
        ];
        let steps = run(&ops, &courier_resources());
        let shown = glyphs(&steps[3]);
        // Space: 6 + word spacing 4; then -1000 moves 10 more.
        assert_eq!(shown[0].advance, 10.0);
        assert_eq!(shown[1].origin, (20.0, 0.0));
    }

    #[test]
    fn clip_then_n_reports_non_painting_clip_path() {
        let ops = vec![
            Operation::new("w", vec![2.into()]),
            Operation::new("re", vec![10.into(), 10.into(), 20.into(), 20.into()]),
            Operation::new("W", vec![]),
            Operation::new("n", vec![]),
            Operation::new("sh", vec!["Sh0".into()]),
        ];
        let steps = run(&ops, &Dictionary::new());
        match &steps[3] {
            Step::Paint(Primitive::Path(path)) => {
                assert!(path.clips);
                assert!(!path.paints);
                assert_eq!(path.bbox, Some(Rect::new(9.0, 9.0, 31.0, 31.0)));
            }
            other => panic!("expected path, got {other:?}"),
        }
        match &steps[4] {
            Step::Paint(Primitive::Shading(fill)) => {
                assert_eq!(fill.bbox, Some(Rect::new(9.0, 9.0, 31.0, 31.0)));
            }
            other => panic!("expected shading, got {other:?}"),
        }
    }

    #[test]
    fn saved_state_restores_ctm() {
        let resources = dictionary! {
            "XObject" => dictionary! {
                "Im1" => lopdf::Stream::new(
                    dictionary! { "Subtype" => "Image" },
                    Vec::new(),
                ),
            },
        };
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![50.into(), 0.into(), 0.into(), 50.into(), 300.into(), 300.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
            Operation::new("Do", vec!["Im1".into()]),
        ];
        let steps = run(&ops, &resources);
        let placed = |step: &Step| match step {
            Step::Paint(Primitive::Image(image)) => image.bbox,
            other => panic!("expected image, got {other:?}"),
        };
        assert_eq!(placed(&steps[2]), Rect::new(300.0, 300.0, 350.0, 350.0));
        assert_eq!(placed(&steps[4]), Rect::UNIT);
    }

    #[test]
    fn inline_image_fills_the_unit_square_under_the_ctm() {
        let ops = vec![
            Operation::new(
                "cm",
                vec![20.into(), 0.into(), 0.into(), 10.into(), 5.into(), 7.into()],
            ),
            Operation::new(INLINE_IMAGE, vec![0.into()]),
        ];
        let steps = run(&ops, &Dictionary::new());
        match &steps[1] {
            Step::Paint(Primitive::Image(image)) => {
                assert_eq!(image.bbox, Rect::new(5.0, 7.0, 25.0, 17.0));
            }
            other => panic!("expected image, got {other:?}"),
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory PDF builders shared by the unit tests.

use falzwerk_core::types::Region;
use lopdf::content::{Content, Operation};
use lopdf::{
    Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId, Permissions,
    Stream, StringFormat, dictionary,
};

use crate::pdf::PdfHandle;
use crate::redact::content::PageContent;

pub(crate) const ENCRYPTED_PASSWORD: &str = "secret";
pub(crate) const OWNER_PASSWORD: &str = "owner";

pub(crate) const LETTER: (f32, f32) = (612.0, 792.0);

/// Unfiltered 2×1 gray inline image.
pub(crate) const INLINE_GRAY: &[u8] = b"BI /W 2 /H 1 /CS /G /BPC 8 ID \x00\xFF EI";
/// 1×1 gray inline image behind an ASCIIHex filter.
pub(crate) const INLINE_HEX: &[u8] = b"BI /W 1 /H 1 /CS /G /BPC 8 /F /AHx ID 80> EI";

/// Builder that keeps the page tree bookkeeping out of each fixture.
pub(crate) struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl PdfBuilder {
    pub(crate) fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    pub(crate) fn courier(&mut self) -> ObjectId {
        self.add(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        })
    }

    pub(crate) fn gray_image(&mut self) -> ObjectId {
        self.add(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1_i64,
                "Height" => 1_i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8_i64,
            },
            vec![0x80],
        ))
    }

    pub(crate) fn page(
        &mut self,
        size: (f32, f32),
        resources: Object,
        operations: Vec<Operation>,
    ) -> ObjectId {
        let content = Content { operations }.encode().unwrap();
        self.raw_page(size, resources, content)
    }

    pub(crate) fn raw_page(&mut self, size: (f32, f32), resources: Object, content: Vec<u8>) -> ObjectId {
        let content_id = self.add(Stream::new(Dictionary::new(), content));
        let page_id = self.add(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(size.0), Object::Real(size.1)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id);
        page_id
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        save(self.build())
    }

    pub(crate) fn build(mut self) -> Document {
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.add(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc
    }
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap();
    output
}

/// Two pages ("Secret 1", "Secret 2") encrypted with 128-bit RC4. The owner
/// password is [`OWNER_PASSWORD`]; an empty `user_password` opens freely.
pub(crate) fn encrypted_pdf(user_password: &str) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.courier();
    let resources = builder.add(dictionary! {
        "Font" => dictionary! { "F1" => font },
    });
    for number in 1..=2 {
        let label = format!("Secret {}", number);
        builder.page(LETTER, Object::Reference(resources), text_ops("F1", 24, 72, 700, &label));
    }
    let mut doc = builder.build();

    let id = Object::String(b"falzwerkfixture1".to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));
    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: OWNER_PASSWORD,
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    })
    .unwrap();
    doc.encrypt(&state).unwrap();
    save(doc)
}

pub(crate) fn text_ops(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

pub(crate) fn placed_xobject(name: &str, x: i64, y: i64, size: i64) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![size.into(), 0.into(), 0.into(), size.into(), x.into(), y.into()],
        ),
        Operation::new("Do", vec![name.into()]),
        Operation::new("Q", vec![]),
    ]
}

pub(crate) fn filled_rect(x: i64, y: i64, w: i64, h: i64) -> Vec<Operation> {
    vec![
        Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
        Operation::new("f", vec![]),
    ]
}

/// Pages labelled "Page 1" … "Page n", all US Letter, sharing one font.
pub(crate) fn numbered_pdf(pages: usize) -> Vec<u8> {
    numbered_pdf_sized(&vec![LETTER; pages])
}

pub(crate) fn numbered_pdf_sized(sizes: &[(f32, f32)]) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.courier();
    let resources = builder.add(dictionary! {
        "Font" => dictionary! { "F1" => font },
    });
    for (index, &size) in sizes.iter().enumerate() {
        let label = format!("Page {}", index + 1);
        builder.page(size, Object::Reference(resources), text_ops("F1", 24, 72, 700, &label));
    }
    builder.finish()
}

/// Three pages; the second sits under an intermediate `/Pages` node that
/// declares an A5 MediaBox and a 90° rotation. Resources live on the root.
pub(crate) fn nested_tree_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let root_id = doc.new_object_id();
    let middle_id = doc.new_object_id();
    let font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let leaf = |doc: &mut Document, parent: ObjectId, label: &str| {
        let content = Content {
            operations: text_ops("F1", 24, 72, 700, label),
        }
        .encode()
        .unwrap();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => parent,
            "Contents" => content_id,
        })
    };
    let first = leaf(&mut doc, root_id, "Page 1");
    let second = leaf(&mut doc, middle_id, "Page 2");
    let third = leaf(&mut doc, root_id, "Page 3");

    doc.objects.insert(
        middle_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => root_id,
            "Kids" => vec![Object::Reference(second)],
            "Count" => 1_i64,
            "MediaBox" => Object::Array(vec![0.into(), 0.into(), 420.into(), 595.into()]),
            "Rotate" => 90_i64,
        }),
    );
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![
                Object::Reference(first),
                Object::Reference(middle_id),
                Object::Reference(third),
            ],
            "Count" => 3_i64,
            "MediaBox" => Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => root_id,
    });
    doc.trailer.set("Root", catalog_id);
    save(doc)
}

/// Three pages where page 1 links to page 3 through an annotation and the
/// outline points at page 3 as well.
pub(crate) fn linked_pdf() -> Vec<u8> {
    let mut doc = Document::load_mem(&numbered_pdf(3)).unwrap();
    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    let destination = vec![Object::Reference(pages[2]), "Fit".into()];

    let link = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => Object::Array(vec![72.into(), 690.into(), 200.into(), 720.into()]),
        "Dest" => destination.clone(),
    });
    doc.get_object_mut(pages[0])
        .and_then(|page| page.as_dict_mut())
        .unwrap()
        .set("Annots", vec![Object::Reference(link)]);

    let outlines_id = doc.new_object_id();
    let item = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Third"),
        "Parent" => outlines_id,
        "Dest" => destination,
    });
    doc.objects.insert(
        outlines_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => item,
            "Last" => item,
            "Count" => 1_i64,
        }),
    );
    let root = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(root)
        .and_then(|catalog| catalog.as_dict_mut())
        .unwrap()
        .set("Outlines", outlines_id);
    save(doc)
}

/// One US Letter page with two text lines, a filled square and two images.
///
/// In user space (origin bottom-left):
/// - "SECRET DATA" in Courier 12 at (72, 700): glyphs span x 72..151.2
/// - "PUBLIC INFO" in Courier 12 at (72, 500)
/// - filled square (100, 100)-(150, 150)
/// - `/Im1` placed at (300, 300)-(350, 350)
/// - `/Im2` placed at (400, 600)-(450, 650)
pub(crate) fn redaction_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.courier();
    let im1 = builder.gray_image();
    let im2 = builder.gray_image();
    let resources = Object::Dictionary(dictionary! {
        "Font" => dictionary! { "F1" => font },
        "XObject" => dictionary! { "Im1" => im1, "Im2" => im2 },
    });
    let mut operations = text_ops("F1", 12, 72, 700, "SECRET DATA");
    operations.extend(text_ops("F1", 12, 72, 500, "PUBLIC INFO"));
    operations.extend(filled_rect(100, 100, 50, 50));
    operations.extend(placed_xobject("Im1", 300, 300, 50));
    operations.extend(placed_xobject("Im2", 400, 600, 50));
    builder.page(LETTER, resources, operations);
    builder.finish()
}

/// One page whose only content is form `/Fm1`, drawn at identity. The form
/// paints a square at (200, 200)-(240, 240) and "FORM TEXT" at (200, 400).
pub(crate) fn form_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.courier();
    let mut form_ops = filled_rect(200, 200, 40, 40);
    form_ops.extend(text_ops("F1", 12, 200, 400, "FORM TEXT"));
    let form_content = Content { operations: form_ops }.encode().unwrap();
    let form = builder.add(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font },
            },
        },
        form_content,
    ));
    let resources = Object::Dictionary(dictionary! {
        "XObject" => dictionary! { "Fm1" => form },
    });
    builder.page(
        LETTER,
        resources,
        vec![Operation::new("Do", vec!["Fm1".into()])],
    );
    builder.finish()
}

/// "SECRET DATA" in Courier 12 at (72, 700), [`INLINE_GRAY`] placed at
/// (400, 100)-(450, 150) and [`INLINE_HEX`] at (100, 300)-(150, 350).
pub(crate) fn inline_image_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.courier();
    let resources = Object::Dictionary(dictionary! {
        "Font" => dictionary! { "F1" => font },
    });
    let mut content = Content {
        operations: text_ops("F1", 12, 72, 700, "SECRET DATA"),
    }
    .encode()
    .unwrap();
    for (image, x, y) in [(INLINE_GRAY, 400, 100), (INLINE_HEX, 100, 300)] {
        content.extend_from_slice(format!("q 50 0 0 50 {} {} cm\n", x, y).as_bytes());
        content.extend_from_slice(image);
        content.extend_from_slice(b"\nQ\n");
    }
    builder.raw_page(LETTER, resources, content);
    builder.finish()
}

/// Three Courier 12 lines 14pt apart from (72, 700): "KEEP" via `Tj`,
/// "SECRET" via `'` and "HIDDEN" via `"` with word spacing 2 and character
/// spacing 1.
pub(crate) fn quoted_text_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.courier();
    let resources = Object::Dictionary(dictionary! {
        "Font" => dictionary! { "F1" => font },
    });
    let operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![72.into(), 700.into()]),
        Operation::new("Tj", vec![Object::string_literal("KEEP")]),
        Operation::new("'", vec![Object::string_literal("SECRET")]),
        Operation::new("\"", vec![2.into(), 1.into(), Object::string_literal("HIDDEN")]),
        Operation::new("ET", vec![]),
    ];
    builder.page(LETTER, resources, operations);
    builder.finish()
}

/// Two clipped groups:
/// - clip (100, 100)-(300, 300) set with `W n`, then a square at
///   (400, 400)-(450, 450)
/// - a square at (100, 500)-(150, 550) that clips and fills at once (`W f`)
pub(crate) fn clip_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let content = b"q 100 100 200 200 re W n 400 400 50 50 re f Q\nq 100 500 50 50 re W f Q\n".to_vec();
    builder.raw_page(LETTER, Object::Dictionary(Dictionary::new()), content);
    builder.finish()
}

/// Shading `/Sh1` painted twice, clipped to (100, 100)-(150, 150) and to
/// (400, 400)-(450, 450).
pub(crate) fn shading_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let shading = builder.add(dictionary! {
        "ShadingType" => 2_i64,
        "ColorSpace" => "DeviceRGB",
        "Coords" => Object::Array(vec![0.into(), 0.into(), 1.into(), 0.into()]),
        "Function" => dictionary! {
            "FunctionType" => 2_i64,
            "Domain" => Object::Array(vec![0.into(), 1.into()]),
            "C0" => Object::Array(vec![0.into(), 0.into(), 0.into()]),
            "C1" => Object::Array(vec![1.into(), 1.into(), 1.into()]),
            "N" => 1_i64,
        },
    });
    let resources = Object::Dictionary(dictionary! {
        "Shading" => dictionary! { "Sh1" => shading },
    });
    let content =
        b"q 100 100 50 50 re W n /Sh1 sh Q\nq 400 400 50 50 re W n /Sh1 sh Q\n".to_vec();
    builder.raw_page(LETTER, resources, content);
    builder.finish()
}

/// "SECRET" in Courier 12 at (36, 300) under a CTM scaling by 2, so it
/// lands at (72, 600) in user space with 14.4pt glyphs. The page carries
/// `/Rotate rotate`.
pub(crate) fn scaled_text_pdf(rotate: i64) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.courier();
    let resources = Object::Dictionary(dictionary! {
        "Font" => dictionary! { "F1" => font },
    });
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("cm", vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()]),
    ];
    operations.extend(text_ops("F1", 12, 36, 300, "SECRET"));
    operations.push(Operation::new("Q", vec![]));
    let page_id = builder.page(LETTER, resources, operations);
    if let Ok(Object::Dictionary(page)) = builder.doc.get_object_mut(page_id) {
        page.set("Rotate", rotate);
    }
    builder.finish()
}

/// US Letter page cropped to (100, 100)-(512, 692) with "SECRET" in
/// Courier 12 at (172, 600).
pub(crate) fn cropped_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.courier();
    let resources = Object::Dictionary(dictionary! {
        "Font" => dictionary! { "F1" => font },
    });
    let page_id = builder.page(LETTER, resources, text_ops("F1", 12, 172, 600, "SECRET"));
    if let Ok(Object::Dictionary(page)) = builder.doc.get_object_mut(page_id) {
        page.set("CropBox", Object::Array(vec![100.into(), 100.into(), 512.into(), 692.into()]));
    }
    builder.finish()
}

/// Region in the top-left convention covering the user-space box
/// `(x0, y0)-(x1, y1)` on a US Letter page.
pub(crate) fn region_over(x0: f32, y0: f32, x1: f32, y1: f32) -> Region {
    Region::new(x0, LETTER.1 - y1, x1 - x0, y1 - y0)
}

/// Text shown by each page's own content stream, glyph strings concatenated.
pub(crate) fn page_labels(handle: &PdfHandle) -> Vec<String> {
    (0..handle.page_count())
        .map(|index| page_text(handle.document(), handle.pages()[index]))
        .collect()
}

pub(crate) fn page_text(doc: &Document, page_id: ObjectId) -> String {
    let bytes = doc.get_page_content(page_id).unwrap();
    operations_text(&PageContent::decode(&bytes).unwrap().operations)
}

pub(crate) fn operations_text(operations: &[Operation]) -> String {
    let mut text = String::new();
    for op in operations {
        if !matches!(op.operator.as_str(), "Tj" | "TJ" | "'" | "\"") {
            continue;
        }
        for operand in &op.operands {
            collect_strings(operand, &mut text);
        }
    }
    text
}

fn collect_strings(object: &Object, text: &mut String) {
    match object {
        Object::String(bytes, _) => text.extend(bytes.iter().map(|&b| b as char)),
        Object::Array(items) => items.iter().for_each(|item| collect_strings(item, text)),
        _ => {}
    }
}

/// Operators of a page's decoded content stream.
pub(crate) fn page_operations(doc: &Document, page_id: ObjectId) -> Vec<Operation> {
    let bytes = doc.get_page_content(page_id).unwrap();
    PageContent::decode(&bytes).unwrap().operations
}

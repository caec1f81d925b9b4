// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glyph metrics needed to place glyph boxes: advance widths per character
// code and the font's vertical extent.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::pdf::objects::{as_dict, dict_entry, name, number, resolve, resolved_number};

/// Width used when a font gives us nothing better, in 1/1000 em.
const DEFAULT_WIDTH: f32 = 500.0;
const DEFAULT_ASCENT: f32 = 0.8;
const DEFAULT_DESCENT: f32 = -0.2;
const COURIER_WIDTH: f32 = 600.0;

/// Helvetica advance widths for WinAnsi codes 32..=126.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

#[derive(Debug, Clone)]
enum Widths {
    /// `/FirstChar` + `/Widths` of a simple font.
    Simple {
        first_char: u32,
        widths: Vec<f32>,
        missing: f32,
    },
    /// `/W` + `/DW` of a CIDFont.
    Cid {
        widths: HashMap<u32, f32>,
        default: f32,
    },
    Helvetica,
    Monospaced(f32),
}

/// Metrics for one font resource.
#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    widths: Widths,
    /// Bytes per character code: 2 for composite fonts, 1 otherwise.
    code_len: usize,
    /// Glyph-space to text-space factor, scaled so widths read as 1/1000 em.
    width_scale: f32,
    ascent: f32,
    descent: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            widths: Widths::Monospaced(DEFAULT_WIDTH),
            code_len: 1,
            width_scale: 1.0,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
        }
    }
}

impl FontMetrics {
    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let subtype = font.get(b"Subtype").ok().and_then(name).unwrap_or_default();
        let base_font = font
            .get(b"BaseFont")
            .ok()
            .map(|value| resolve(doc, value))
            .and_then(name)
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();

        let (widths, code_len, descriptor_owner) = if subtype == b"Type0" {
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .map(|value| resolve(doc, value))
                .and_then(|value| match value {
                    Object::Array(items) => items.first().and_then(|first| as_dict(doc, first)),
                    _ => None,
                });
            let widths = descendant
                .map(|cid_font| cid_widths(doc, cid_font))
                .unwrap_or(Widths::Cid {
                    widths: HashMap::new(),
                    default: 1000.0,
                });
            (widths, 2, descendant.unwrap_or(font))
        } else {
            let widths = simple_widths(doc, font).unwrap_or_else(|| standard_widths(&base_font));
            (widths, 1, font)
        };

        let width_scale = if subtype == b"Type3" {
            font.get(b"FontMatrix")
                .ok()
                .map(|value| resolve(doc, value))
                .and_then(|value| match value {
                    Object::Array(items) => items.first().and_then(|a| resolved_number(doc, a)),
                    _ => None,
                })
                .map(|a| a * 1000.0)
                .unwrap_or(1.0)
        } else {
            1.0
        };

        let (ascent, descent) = vertical_extent(doc, descriptor_owner);
        debug!(base_font = %base_font, code_len, "Font metrics loaded");

        Self {
            widths,
            code_len,
            width_scale,
            ascent,
            descent,
        }
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    /// Advance width of `code` in 1/1000 em.
    pub fn width(&self, code: u32) -> f32 {
        let raw = match &self.widths {
            Widths::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|offset| widths.get(offset as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Cid { widths, default } => widths.get(&code).copied().unwrap_or(*default),
            Widths::Helvetica => match code {
                32..=126 => HELVETICA_ASCII[(code - 32) as usize] as f32,
                _ => DEFAULT_WIDTH,
            },
            Widths::Monospaced(width) => *width,
        };
        raw * self.width_scale
    }

    /// Ascent above the baseline, in em.
    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    /// Descent below the baseline (negative), in em.
    pub fn descent(&self) -> f32 {
        self.descent
    }
}

fn simple_widths(doc: &Document, font: &Dictionary) -> Option<Widths> {
    let Object::Array(items) = resolve(doc, font.get(b"Widths").ok()?) else {
        return None;
    };
    let first_char = font
        .get(b"FirstChar")
        .ok()
        .and_then(|value| resolved_number(doc, value))
        .unwrap_or(0.0) as u32;
    let widths = items
        .iter()
        .map(|item| resolved_number(doc, item).unwrap_or(0.0))
        .collect();
    let missing = dict_entry(doc, font, b"FontDescriptor")
        .and_then(|descriptor| descriptor.get(b"MissingWidth").ok())
        .and_then(|value| resolved_number(doc, value))
        .unwrap_or(0.0);
    Some(Widths::Simple {
        first_char,
        widths,
        missing,
    })
}

fn standard_widths(base_font: &str) -> Widths {
    // Subset prefixes look like "ABCDEF+Helvetica".
    let family = base_font.rsplit('+').next().unwrap_or(base_font);
    if family.starts_with("Courier") {
        Widths::Monospaced(COURIER_WIDTH)
    } else if family.starts_with("Helvetica") || family.starts_with("Arial") {
        Widths::Helvetica
    } else {
        Widths::Monospaced(DEFAULT_WIDTH)
    }
}

/// Parse `/W`, which mixes `c [w1 w2 …]` and `c_first c_last w` entries.
fn cid_widths(doc: &Document, cid_font: &Dictionary) -> Widths {
    let default = cid_font
        .get(b"DW")
        .ok()
        .and_then(|value| resolved_number(doc, value))
        .unwrap_or(1000.0);
    let mut widths = HashMap::new();

    let items: &[Object] = match cid_font.get(b"W").ok().map(|value| resolve(doc, value)) {
        Some(Object::Array(items)) => items,
        _ => &[],
    };
    let mut index = 0;
    while index < items.len() {
        let Some(first) = resolved_number(doc, &items[index]) else {
            break;
        };
        let first = first as u32;
        match items.get(index + 1).map(|value| resolve(doc, value)) {
            Some(Object::Array(run)) => {
                for (offset, width) in run.iter().enumerate() {
                    if let Some(width) = resolved_number(doc, width) {
                        widths.insert(first + offset as u32, width);
                    }
                }
                index += 2;
            }
            Some(last) => {
                let last = number(last).map(|l| l as u32);
                let width = items.get(index + 2).and_then(|w| resolved_number(doc, w));
                if let (Some(last), Some(width)) = (last, width) {
                    // Guard against absurd ranges in broken files.
                    for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(cid, width);
                    }
                }
                index += 3;
            }
            None => break,
        }
    }

    Widths::Cid { widths, default }
}

fn vertical_extent(doc: &Document, font: &Dictionary) -> (f32, f32) {
    let descriptor = dict_entry(doc, font, b"FontDescriptor");
    let read = |key: &[u8]| {
        descriptor
            .and_then(|d| d.get(key).ok())
            .and_then(|value| resolved_number(doc, value))
            .map(|v| v / 1000.0)
    };
    match (read(b"Ascent"), read(b"Descent")) {
        (Some(ascent), Some(descent)) if ascent > descent && ascent > 0.0 => {
            (ascent, descent.min(0.0))
        }
        _ => (DEFAULT_ASCENT, DEFAULT_DESCENT),
    }
}

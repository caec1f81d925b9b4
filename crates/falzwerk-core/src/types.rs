// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Falzwerk.

use serde::{Deserialize, Serialize};

use crate::error::{FalzwerkError, Result};

/// Where a new page goes relative to the reference page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    /// Take the reference page's slot, shifting it right by one.
    Before,
    /// Immediately follow the reference page.
    #[default]
    After,
}

/// Absolute page rotation accepted by the rotate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Rotation {
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(&self) -> i64 {
        match self {
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }
}

impl TryFrom<i64> for Rotation {
    type Error = FalzwerkError;

    fn try_from(degrees: i64) -> Result<Self> {
        match degrees {
            90 => Ok(Self::Quarter),
            180 => Ok(Self::Half),
            270 => Ok(Self::ThreeQuarter),
            other => Err(FalzwerkError::InvalidInput(format!(
                "invalid rotation angle: {other}. Must be 90, 180, or 270"
            ))),
        }
    }
}

impl From<Rotation> for i64 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Geometry and orientation of one page, as seen from outside (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub number: u32,
    pub width: f32,
    pub height: f32,
    /// Normalized to 0, 90, 180 or 270.
    pub rotation: i64,
}

/// Axis-aligned rectangle in page space.
///
/// `x`/`y` are measured from the top-left corner of the unrotated page with
/// y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A region must have a positive, finite extent.
    pub fn validate(&self) -> Result<()> {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.width <= 0.0 || self.height <= 0.0 {
            return Err(FalzwerkError::InvalidInput(format!(
                "redaction area must have positive finite size, got {}x{} at ({}, {})",
                self.width, self.height, self.x, self.y
            )));
        }
        Ok(())
    }
}

/// RGB colour with components in `0.0..=1.0`.
///
/// Deserializes from `"#RRGGBB"` or `[r, g, b]`; anything unparseable falls
/// back to white.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColorValue", into = "[f32; 3]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Every component must be a finite number in `0.0..=1.0`.
    pub fn validate(&self) -> Result<()> {
        if [self.r, self.g, self.b]
            .iter()
            .all(|c| c.is_finite() && (0.0..=1.0).contains(c))
        {
            return Ok(());
        }
        Err(FalzwerkError::InvalidInput(format!(
            "color components must be finite and within 0..1, got [{}, {}, {}]",
            self.r, self.g, self.b
        )))
    }

    /// Parse `#RRGGBB` (the `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Hex(String),
    Components(Vec<f32>),
    Other(serde_json::Value),
}

impl From<ColorValue> for Color {
    fn from(value: ColorValue) -> Self {
        match value {
            ColorValue::Hex(hex) => Color::from_hex(&hex).unwrap_or(Color::WHITE),
            ColorValue::Components(c) if c.len() >= 3 => Color::rgb(c[0], c[1], c[2]),
            ColorValue::Components(_) | ColorValue::Other(_) => Color::WHITE,
        }
    }
}

impl From<Color> for [f32; 3] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b]
    }
}

fn default_font_size() -> f32 {
    12.0
}

fn default_text_color() -> Color {
    Color::BLACK
}

/// Text painted onto a page after redaction.
///
/// `(x, y)` uses the same top-left convention as [`Region`]; the baseline is
/// placed at `y + font_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub x: f32,
    pub y: f32,
    pub text: String,
    #[serde(default = "default_font_size", alias = "fontsize")]
    pub font_size: f32,
    #[serde(default = "default_text_color")]
    pub color: Color,
}

impl TextOverlay {
    pub fn validate(&self) -> Result<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(FalzwerkError::InvalidInput(format!(
                "replacement text position must be finite, got ({}, {})",
                self.x, self.y
            )));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(FalzwerkError::InvalidInput(format!(
                "font size must be positive, got {}",
                self.font_size
            )));
        }
        self.color.validate()
    }
}

/// A standalone replacement text bound to a 1-indexed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementText {
    pub page: u32,
    #[serde(flatten)]
    pub overlay: TextOverlay,
}

/// One area to redact on a 1-indexed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionSpec {
    pub page: u32,
    #[serde(flatten)]
    pub region: Region,
    #[serde(default)]
    pub fill: Color,
    /// Painted after excision, so it is never itself removed.
    #[serde(default)]
    pub replacement: Option<TextOverlay>,
}

impl RedactionSpec {
    pub fn validate(&self) -> Result<()> {
        self.region.validate()?;
        self.fill.validate()?;
        match &self.replacement {
            Some(overlay) => overlay.validate(),
            None => Ok(()),
        }
    }
}

// -- Operation details --------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDetails {
    pub deleted_pages: usize,
    pub remaining_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertBlankDetails {
    pub new_page_count: usize,
    /// 1-indexed position of the new page.
    pub inserted_at: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertPdfDetails {
    pub new_page_count: usize,
    pub inserted_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractDetails {
    pub extracted_pages: usize,
    pub original_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateDetails {
    pub rotated_pages: usize,
    pub rotation: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RedactionDetails {
    pub redacted_areas: usize,
    pub pages_affected: usize,
    pub removed_glyphs: usize,
    pub removed_paths: usize,
    pub removed_images: usize,
    pub replacement_texts: usize,
}

// -- Compression --------------------------------------------------------------

/// Ghostscript quality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionMethod {
    #[serde(rename = "gs-minimum")]
    Minimum,
    #[serde(rename = "gs-screen")]
    Screen,
    #[serde(rename = "gs-ebook")]
    Ebook,
    #[serde(rename = "gs-printer")]
    Printer,
}

impl CompressionMethod {
    pub const ALL: [CompressionMethod; 4] = [
        CompressionMethod::Minimum,
        CompressionMethod::Screen,
        CompressionMethod::Ebook,
        CompressionMethod::Printer,
    ];

    /// Identifier used on the wire (`gs-ebook`, ...).
    pub fn id(&self) -> &'static str {
        match self {
            Self::Minimum => "gs-minimum",
            Self::Screen => "gs-screen",
            Self::Ebook => "gs-ebook",
            Self::Printer => "gs-printer",
        }
    }

    /// Target raster resolution.
    pub fn dpi(&self) -> u32 {
        match self {
            Self::Minimum => 36,
            Self::Screen => 72,
            Self::Ebook => 150,
            Self::Printer => 300,
        }
    }

    /// `-dPDFSETTINGS` preset name.
    pub fn ghostscript_preset(&self) -> &'static str {
        match self {
            Self::Minimum | Self::Screen => "screen",
            Self::Ebook => "ebook",
            Self::Printer => "printer",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Minimum => "Minimum (36 DPI)",
            Self::Screen => "Screen (72 DPI)",
            Self::Ebook => "eBook (150 DPI)",
            Self::Printer => "Print (300 DPI)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Minimum => "Smallest file - very low quality",
            Self::Screen => "Low quality - good for screen viewing",
            Self::Ebook => "Balanced quality and size",
            Self::Printer => "High quality - suitable for printing",
        }
    }

    pub fn info(&self) -> MethodInfo {
        MethodInfo {
            method: *self,
            name: self.display_name().to_string(),
            description: self.description().to_string(),
            dpi: self.dpi(),
        }
    }

    /// Every preset, in increasing quality order.
    pub fn catalog() -> Vec<MethodInfo> {
        Self::ALL.iter().map(|m| m.info()).collect()
    }
}

impl std::str::FromStr for CompressionMethod {
    type Err = FalzwerkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| FalzwerkError::InvalidInput(format!("invalid compression method: {s}")))
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Catalog entry describing one preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub method: CompressionMethod,
    pub name: String,
    pub description: String,
    pub dpi: u32,
}

/// Size accounting for one compression run.
///
/// Negative `compression_ratio` / `saved_bytes` mean the output grew.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    pub original_size: u64,
    pub compressed_size: u64,
    /// Percentage, rounded to two decimals.
    pub compression_ratio: f64,
    pub saved_bytes: i64,
}

impl CompressionStats {
    pub fn from_sizes(original_size: u64, compressed_size: u64) -> Self {
        let compression_ratio = if original_size > 0 {
            let ratio = 100.0 * (1.0 - compressed_size as f64 / original_size as f64);
            (ratio * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            original_size,
            compressed_size,
            compression_ratio,
            saved_bytes: original_size as i64 - compressed_size as i64,
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request and response shapes exchanged with whatever transport fronts the
// engine. PDF payloads travel as raw bytes; passwords are never printed or
// serialized back out.

use serde::{Deserialize, Serialize};

use crate::types::{CompressionMethod, CompressionStats, InsertPosition, RedactionSpec, ReplacementText};

/// A PDF payload plus the password needed to open it, if any.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PdfInput {
    pub bytes: Vec<u8>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl PdfInput {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl std::fmt::Debug for PdfInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfInput")
            .field("bytes_len", &self.bytes.len())
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePagesRequest {
    pub pdf: PdfInput,
    pub pages: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertBlankRequest {
    pub pdf: PdfInput,
    #[serde(default)]
    pub position: InsertPosition,
    pub reference_page: u32,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertPdfRequest {
    pub target: PdfInput,
    pub source: PdfInput,
    #[serde(default)]
    pub position: InsertPosition,
    pub reference_page: u32,
    /// `None` or empty imports every source page in order.
    pub pages_to_insert: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPagesRequest {
    pub pdf: PdfInput,
    pub pages: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotatePagesRequest {
    pub pdf: PdfInput,
    pub pages: Vec<u32>,
    /// Validated against {90, 180, 270} by the operation itself.
    pub rotation: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactRequest {
    pub pdf: PdfInput,
    pub redactions: Vec<RedactionSpec>,
    #[serde(default)]
    pub replacement_texts: Vec<ReplacementText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressRequest {
    pub pdf: Vec<u8>,
    pub method: CompressionMethod,
    #[serde(default)]
    pub rasterize: bool,
}

/// Resulting document plus the operation's details record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Processed<D> {
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub details: D,
}

/// Output of a compression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compressed {
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub stats: CompressionStats,
}

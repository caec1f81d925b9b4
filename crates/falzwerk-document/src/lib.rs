// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// falzwerk-document: Document mutation for the Falzwerk engine.
//
// Provides the PDF handle (open, decrypt, inspect, save), page editing
// (delete, insert, import, extract, rotate), true redaction of content-stream
// primitives, and a Ghostscript-backed compression orchestrator. The request
// service ties them together behind the configured limits.

pub mod compress;
pub mod pdf;
pub mod redact;
pub mod service;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export the primary structs so callers can use `falzwerk_document::PdfHandle` etc.
pub use compress::{CompressionPlan, Compressor, GhostscriptTransform, RasterTransform};
pub use pdf::handle::PdfHandle;
pub use redact::Redactor;
pub use service::PdfService;

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: opening, inspecting, and saving documents, plus page-level
// editing (delete, insert, import, extract, rotate).

pub mod handle;
pub mod import;
pub mod pages;
pub(crate) mod objects;

pub use handle::PdfHandle;

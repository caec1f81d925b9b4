// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// True redaction: content under a region is removed from the page's content
// stream and resources, not merely painted over.

pub(crate) mod content;
mod engine;
pub(crate) mod fonts;
pub(crate) mod geometry;
pub(crate) mod interpreter;

pub use engine::Redactor;

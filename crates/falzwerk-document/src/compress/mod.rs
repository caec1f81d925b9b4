// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression: an external recompress/rasterize transformation behind a
// narrow trait, and the orchestrator that bounds it.

mod ghostscript;
mod orchestrator;

use std::future::Future;

use falzwerk_core::error::Result;
use falzwerk_core::types::CompressionMethod;

pub use ghostscript::GhostscriptTransform;
pub use orchestrator::Compressor;

/// What the transformation is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPlan {
    pub method: CompressionMethod,
    /// Flatten every page to an image at the method's DPI.
    pub rasterize: bool,
}

/// Bytes in, bytes out.
///
/// Implementations need not enforce timeouts; dropping the returned future
/// must release any child process and scratch files.
pub trait RasterTransform: Send + Sync {
    fn transform(
        &self,
        input: &[u8],
        plan: CompressionPlan,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

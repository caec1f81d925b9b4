// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression orchestrator: size ceiling, timeout, and stats around a
// transformation.

use std::time::Duration;

use falzwerk_core::config::EngineConfig;
use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::request::Compressed;
use falzwerk_core::types::{CompressionMethod, CompressionStats, MethodInfo};
use tracing::{info, instrument, warn};

use super::{CompressionPlan, GhostscriptTransform, RasterTransform};

/// Drives one transformation per call, bounded by the configured limits.
#[derive(Debug, Clone)]
pub struct Compressor<T> {
    transform: T,
    max_input_bytes: u64,
    timeout: Duration,
}

impl Compressor<GhostscriptTransform> {
    /// Ghostscript at the configured location with the configured limits.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            GhostscriptTransform::new(config.ghostscript_binary.clone()),
            config,
        )
    }
}

impl<T: RasterTransform> Compressor<T> {
    pub fn new(transform: T, config: &EngineConfig) -> Self {
        Self {
            transform,
            max_input_bytes: config.max_input_bytes,
            timeout: config.compression_timeout(),
        }
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Every supported method with its display name and DPI.
    pub fn methods(&self) -> Vec<MethodInfo> {
        CompressionMethod::catalog()
    }

    #[instrument(skip_all, fields(method = %method, rasterize = rasterize, input_bytes = input.len()))]
    pub async fn compress(
        &self,
        input: &[u8],
        method: CompressionMethod,
        rasterize: bool,
    ) -> Result<Compressed> {
        if input.len() as u64 > self.max_input_bytes {
            return Err(FalzwerkError::InvalidInput(format!(
                "payload of {} bytes exceeds the {} byte limit",
                input.len(),
                self.max_input_bytes
            )));
        }

        let plan = CompressionPlan { method, rasterize };
        let pdf = match tokio::time::timeout(self.timeout, self.transform.transform(input, plan)).await {
            Ok(result) => result?,
            Err(_) => {
                // Dropping the transformation future kills the child and
                // removes its scratch directory.
                warn!(seconds = self.timeout.as_secs(), "Compression timed out");
                return Err(FalzwerkError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let stats = CompressionStats::from_sizes(input.len() as u64, pdf.len() as u64);
        info!(
            original_size = stats.original_size,
            compressed_size = stats.compressed_size,
            ratio = stats.compression_ratio,
            "Compression finished"
        );
        Ok(Compressed { pdf, stats })
    }
}

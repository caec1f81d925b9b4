// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FalzwerkError, Result};

/// Prefix shared by every environment variable the engine reads.
pub const ENV_PREFIX: &str = "FALZWERK_";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Limits and external tool locations enforced by the core.
///
/// Supplied once by the caller and never negotiated per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest accepted PDF payload, in bytes.
    pub max_input_bytes: u64,
    /// Budget for page and redaction operations.
    pub request_timeout_secs: u64,
    /// Budget for a single Ghostscript run.
    pub compression_timeout_secs: u64,
    /// Ghostscript executable (resolved through `PATH` when relative).
    pub ghostscript_binary: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 100 * BYTES_PER_MB,
            request_timeout_secs: 120,
            compression_timeout_secs: 300,
            ghostscript_binary: PathBuf::from("gs"),
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn compression_timeout(&self) -> Duration {
        Duration::from_secs(self.compression_timeout_secs)
    }

    /// Load overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load overrides through an arbitrary key lookup.
    ///
    /// Recognised keys (all prefixed with [`ENV_PREFIX`]):
    /// `MAX_FILE_SIZE_MB`, `REQUEST_TIMEOUT_SECONDS`,
    /// `COMPRESSION_TIMEOUT_SECONDS`, `GHOSTSCRIPT`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(mb) = var("MAX_FILE_SIZE_MB") {
            config.max_input_bytes =
                parse_positive(&mb, "MAX_FILE_SIZE_MB")?.saturating_mul(BYTES_PER_MB);
        }
        if let Some(secs) = var("REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout_secs = parse_positive(&secs, "REQUEST_TIMEOUT_SECONDS")?;
        }
        if let Some(secs) = var("COMPRESSION_TIMEOUT_SECONDS") {
            config.compression_timeout_secs =
                parse_positive(&secs, "COMPRESSION_TIMEOUT_SECONDS")?;
        }
        if let Some(binary) = var("GHOSTSCRIPT") {
            if !binary.trim().is_empty() {
                config.ghostscript_binary = PathBuf::from(binary.trim());
            }
        }

        Ok(config)
    }

    /// Reject payloads above the configured ceiling.
    pub fn check_input_size(&self, len: usize) -> Result<()> {
        if len as u64 > self.max_input_bytes {
            return Err(FalzwerkError::InvalidInput(format!(
                "payload of {} bytes exceeds the {} byte limit",
                len, self.max_input_bytes
            )));
        }
        Ok(())
    }
}

fn parse_positive(raw: &str, name: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(FalzwerkError::InvalidInput(format!(
            "{ENV_PREFIX}{name} must be a positive integer, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_service_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.max_input_bytes, 104_857_600);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.compression_timeout(), Duration::from_secs(300));
        assert_eq!(config.ghostscript_binary, PathBuf::from("gs"));
    }

    #[test]
    fn overrides_are_read_with_prefix() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("FALZWERK_MAX_FILE_SIZE_MB", "5"),
            ("FALZWERK_REQUEST_TIMEOUT_SECONDS", "30"),
            ("FALZWERK_COMPRESSION_TIMEOUT_SECONDS", "60"),
            ("FALZWERK_GHOSTSCRIPT", "/opt/gs/bin/gs"),
        ]))
        .unwrap();

        assert_eq!(config.max_input_bytes, 5 * 1024 * 1024);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.compression_timeout_secs, 60);
        assert_eq!(config.ghostscript_binary, PathBuf::from("/opt/gs/bin/gs"));
    }

    #[test]
    fn zero_or_garbage_is_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[("FALZWERK_REQUEST_TIMEOUT_SECONDS", "0")]))
            .unwrap_err();
        assert!(matches!(err, FalzwerkError::InvalidInput(_)));

        let err = EngineConfig::from_lookup(lookup_from(&[("FALZWERK_MAX_FILE_SIZE_MB", "lots")]))
            .unwrap_err();
        assert!(matches!(err, FalzwerkError::InvalidInput(_)));
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let config = EngineConfig {
            max_input_bytes: 10,
            ..Default::default()
        };
        assert!(config.check_input_size(10).is_ok());
        assert!(matches!(
            config.check_input_size(11),
            Err(FalzwerkError::InvalidInput(_))
        ));
    }
}

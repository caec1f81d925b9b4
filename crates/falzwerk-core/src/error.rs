// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Falzwerk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Falzwerk operations.
#[derive(Debug, Error)]
pub enum FalzwerkError {
    // -- Document opening --
    #[error("invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("PDF is encrypted and requires a password")]
    EncryptedPdf,

    #[error("invalid password for encrypted PDF")]
    InvalidPassword,

    // -- Request validation --
    #[error("invalid pages: {0}")]
    InvalidPages(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // -- Execution --
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FalzwerkError>;

/// Stable classification reported at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidPdf,
    EncryptedPdf,
    InvalidPassword,
    InvalidPages,
    InvalidInput,
    ProcessingFailed,
    Timeout,
}

impl ErrorKind {
    /// Wire code for this kind (e.g. `INVALID_PAGES`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPdf => "INVALID_PDF",
            Self::EncryptedPdf => "ENCRYPTED_PDF",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidPages => "INVALID_PAGES",
            Self::InvalidInput => "INVALID_INPUT",
            Self::ProcessingFailed => "PROCESSING_FAILED",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FalzwerkError {
    /// Classify this error into one of the boundary kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPdf(_) => ErrorKind::InvalidPdf,
            Self::EncryptedPdf => ErrorKind::EncryptedPdf,
            Self::InvalidPassword => ErrorKind::InvalidPassword,
            Self::InvalidPages(_) => ErrorKind::InvalidPages,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ProcessingFailed(_) => ErrorKind::ProcessingFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::ProcessingFailed,
        }
    }

    /// Structured body handed to whatever transport sits in front of us.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serializable failure record: `{"code": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorKind,
    pub message: String,
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Falzwerk: Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod request;
pub mod types;

pub use config::EngineConfig;
pub use error::{ErrorBody, ErrorKind, FalzwerkError};
pub use request::*;
pub use types::*;

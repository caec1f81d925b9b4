// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use falzwerk_core::{CompressionMethod, InsertPosition, RedactionSpec, ReplacementText};
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(name = "falzwerk", version, about = "PDF page surgery, true redaction, and recompression")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Input document, its password, and where the result goes.
#[derive(Debug, Args)]
pub struct DocumentArgs {
    /// PDF to read.
    pub input: PathBuf,

    /// Where to write the resulting PDF.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Password for an encrypted input.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Position {
    Before,
    After,
}

impl From<Position> for InsertPosition {
    fn from(position: Position) -> Self {
        match position {
            Position::Before => InsertPosition::Before,
            Position::After => InsertPosition::After,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Remove pages.
    Delete {
        #[command(flatten)]
        document: DocumentArgs,
        /// 1-indexed pages, comma separated.
        #[arg(long, value_delimiter = ',', required = true)]
        pages: Vec<u32>,
    },

    /// Insert an empty page before or after a reference page.
    InsertBlank {
        #[command(flatten)]
        document: DocumentArgs,
        #[arg(long, value_enum, default_value_t = Position::After)]
        position: Position,
        #[arg(long)]
        reference_page: u32,
        /// Width in points; defaults to the reference page's.
        #[arg(long)]
        width: Option<f32>,
        /// Height in points; defaults to the reference page's.
        #[arg(long)]
        height: Option<f32>,
    },

    /// Copy pages from another PDF into this one.
    InsertPdf {
        #[command(flatten)]
        document: DocumentArgs,
        /// PDF supplying the pages.
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        source_password: Option<String>,
        #[arg(long, value_enum, default_value_t = Position::After)]
        position: Position,
        #[arg(long)]
        reference_page: u32,
        /// Source pages in insertion order; all pages when omitted.
        #[arg(long, value_delimiter = ',')]
        pages: Vec<u32>,
    },

    /// Keep only the given pages, in ascending order.
    Extract {
        #[command(flatten)]
        document: DocumentArgs,
        #[arg(long, value_delimiter = ',', required = true)]
        pages: Vec<u32>,
    },

    /// Set an absolute rotation on pages.
    Rotate {
        #[command(flatten)]
        document: DocumentArgs,
        #[arg(long, value_delimiter = ',', required = true)]
        pages: Vec<u32>,
        /// 90, 180 or 270.
        #[arg(long, allow_hyphen_values = true)]
        rotation: i64,
    },

    /// Remove content under regions listed in a JSON file.
    Redact {
        #[command(flatten)]
        document: DocumentArgs,
        /// `{"redactions": [...], "replacement_texts": [...]}`
        #[arg(long)]
        redactions: PathBuf,
    },

    /// Recompress through Ghostscript.
    Compress {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "gs-ebook")]
        method: CompressionMethod,
        /// Flatten every page to an image.
        #[arg(long)]
        rasterize: bool,
    },

    /// List compression methods and the detected Ghostscript version.
    Methods,

    /// Print page geometry.
    Info {
        input: PathBuf,
        #[arg(long)]
        password: Option<String>,
    },
}

/// Contents of the file passed to `redact --redactions`.
#[derive(Debug, Deserialize)]
pub struct RedactionFile {
    pub redactions: Vec<RedactionSpec>,
    #[serde(default)]
    pub replacement_texts: Vec<ReplacementText>,
}

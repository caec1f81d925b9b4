// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Falzwerk: PDF page surgery, true redaction, and recompression
//
// Entry point. Initialises logging and configuration, runs one subcommand,
// and prints its details record (or the failure body) as JSON on stdout.

mod args;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use serde_json::{Value, json};

use falzwerk_core::error::Result;
use falzwerk_core::{
    CompressRequest, DeletePagesRequest, EngineConfig, ExtractPagesRequest, FalzwerkError,
    InsertBlankRequest, InsertPdfRequest, PdfInput, Processed, RedactRequest,
    RotatePagesRequest,
};
use falzwerk_document::{PdfHandle, PdfService};

use args::{Cli, Command, DocumentArgs, RedactionFile};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(value) => {
            println!("{}", pretty(&value));
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(code = %err.kind(), "Command failed");
            println!("{}", pretty(&err.to_body()));
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<Value> {
    let service = PdfService::new(EngineConfig::from_env()?);

    match command {
        Command::Delete { document, pages } => {
            let pdf = read_input(&document).await?;
            let result = service
                .delete_pages(DeletePagesRequest { pdf, pages })
                .await?;
            finish(&document, result).await
        }
        Command::InsertBlank {
            document,
            position,
            reference_page,
            width,
            height,
        } => {
            let pdf = read_input(&document).await?;
            let result = service
                .insert_blank_page(InsertBlankRequest {
                    pdf,
                    position: position.into(),
                    reference_page,
                    width,
                    height,
                })
                .await?;
            finish(&document, result).await
        }
        Command::InsertPdf {
            document,
            source,
            source_password,
            position,
            reference_page,
            pages,
        } => {
            let target = read_input(&document).await?;
            let source = PdfInput {
                bytes: tokio::fs::read(&source).await?,
                password: source_password,
            };
            let result = service
                .insert_pdf_pages(InsertPdfRequest {
                    target,
                    source,
                    position: position.into(),
                    reference_page,
                    pages_to_insert: (!pages.is_empty()).then_some(pages),
                })
                .await?;
            finish(&document, result).await
        }
        Command::Extract { document, pages } => {
            let pdf = read_input(&document).await?;
            let result = service
                .extract_pages(ExtractPagesRequest { pdf, pages })
                .await?;
            finish(&document, result).await
        }
        Command::Rotate {
            document,
            pages,
            rotation,
        } => {
            let pdf = read_input(&document).await?;
            let result = service
                .rotate_pages(RotatePagesRequest {
                    pdf,
                    pages,
                    rotation,
                })
                .await?;
            finish(&document, result).await
        }
        Command::Redact {
            document,
            redactions,
        } => {
            let file: RedactionFile = serde_json::from_slice(&tokio::fs::read(&redactions).await?)?;
            let pdf = read_input(&document).await?;
            let result = service
                .redact(RedactRequest {
                    pdf,
                    redactions: file.redactions,
                    replacement_texts: file.replacement_texts,
                })
                .await?;
            finish(&document, result).await
        }
        Command::Compress {
            input,
            output,
            method,
            rasterize,
        } => {
            let pdf = tokio::fs::read(&input).await?;
            let compressed = service
                .compress(CompressRequest {
                    pdf,
                    method,
                    rasterize,
                })
                .await?;
            write_output(&output, &compressed.pdf).await?;
            to_value(&compressed.stats)
        }
        Command::Methods => {
            let methods = service.compression_methods();
            let ghostscript = service.ghostscript_version().await;
            Ok(json!({
                "methods": methods,
                "ghostscript_available": ghostscript.is_some(),
                "ghostscript_version": ghostscript,
            }))
        }
        Command::Info { input, password } => {
            let bytes = tokio::fs::read(&input).await?;
            service.config().check_input_size(bytes.len())?;
            let handle = PdfHandle::open(&bytes, password.as_deref())?;
            let pages = (1..=handle.page_count() as u32)
                .map(|number| handle.page_info(number))
                .collect::<Result<Vec<_>>>()?;
            Ok(json!({
                "fingerprint": handle.fingerprint(),
                "page_count": handle.page_count(),
                "pages": pages,
            }))
        }
    }
}

async fn read_input(document: &DocumentArgs) -> Result<PdfInput> {
    Ok(PdfInput {
        bytes: tokio::fs::read(&document.input).await?,
        password: document.password.clone(),
    })
}

async fn write_output(path: &Path, pdf: &[u8]) -> Result<()> {
    tokio::fs::write(path, pdf).await?;
    tracing::info!(path = %path.display(), bytes = pdf.len(), "Output written");
    Ok(())
}

async fn finish<D: Serialize>(document: &DocumentArgs, result: Processed<D>) -> Result<Value> {
    write_output(&document.output, &result.pdf).await?;
    to_value(&result.details)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(FalzwerkError::from)
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("{{\"error\": \"{}\"}}", err))
}

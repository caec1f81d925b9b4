// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request service: one entry point per operation. Each call checks the
// payload ceiling, opens its own handle(s), runs the edit on the blocking
// pool under the request timeout, and returns the serialized result.

use falzwerk_core::config::EngineConfig;
use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::request::{
    Compressed, CompressRequest, DeletePagesRequest, ExtractPagesRequest, InsertBlankRequest,
    InsertPdfRequest, PdfInput, Processed, RedactRequest, RotatePagesRequest,
};
use falzwerk_core::types::{
    DeleteDetails, ExtractDetails, InsertBlankDetails, InsertPdfDetails, MethodInfo,
    RedactionDetails, RotateDetails,
};
use tracing::{instrument, warn};

use crate::compress::{Compressor, GhostscriptTransform};
use crate::pdf::PdfHandle;
use crate::redact::Redactor;

#[derive(Debug, Clone)]
pub struct PdfService {
    config: EngineConfig,
    compressor: Compressor<GhostscriptTransform>,
}

impl Default for PdfService {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PdfService {
    pub fn new(config: EngineConfig) -> Self {
        let compressor = Compressor::from_config(&config);
        Self { config, compressor }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(pages = request.pages.len()))]
    pub async fn delete_pages(&self, request: DeletePagesRequest) -> Result<Processed<DeleteDetails>> {
        let pages = request.pages;
        self.edit(request.pdf, move |handle| handle.delete_pages(&pages))
            .await
    }

    #[instrument(skip_all, fields(reference_page = request.reference_page))]
    pub async fn insert_blank_page(
        &self,
        request: InsertBlankRequest,
    ) -> Result<Processed<InsertBlankDetails>> {
        let InsertBlankRequest {
            pdf,
            position,
            reference_page,
            width,
            height,
        } = request;
        self.edit(pdf, move |handle| {
            handle.insert_blank_page(position, reference_page, width, height)
        })
        .await
    }

    #[instrument(skip_all, fields(reference_page = request.reference_page))]
    pub async fn insert_pdf_pages(
        &self,
        request: InsertPdfRequest,
    ) -> Result<Processed<InsertPdfDetails>> {
        let InsertPdfRequest {
            target,
            source,
            position,
            reference_page,
            pages_to_insert,
        } = request;
        self.config.check_input_size(source.bytes.len())?;
        self.edit(target, move |handle| {
            let source = PdfHandle::open(&source.bytes, source.password())?;
            handle.insert_pdf_pages(&source, position, reference_page, pages_to_insert.as_deref())
        })
        .await
    }

    #[instrument(skip_all, fields(pages = request.pages.len()))]
    pub async fn extract_pages(
        &self,
        request: ExtractPagesRequest,
    ) -> Result<Processed<ExtractDetails>> {
        let pages = request.pages;
        self.edit(request.pdf, move |handle| handle.extract_pages(&pages))
            .await
    }

    #[instrument(skip_all, fields(pages = request.pages.len(), rotation = request.rotation))]
    pub async fn rotate_pages(&self, request: RotatePagesRequest) -> Result<Processed<RotateDetails>> {
        let RotatePagesRequest {
            pdf,
            pages,
            rotation,
        } = request;
        self.edit(pdf, move |handle| handle.rotate_pages(&pages, rotation))
            .await
    }

    #[instrument(skip_all, fields(
        redactions = request.redactions.len(),
        replacements = request.replacement_texts.len(),
    ))]
    pub async fn redact(&self, request: RedactRequest) -> Result<Processed<RedactionDetails>> {
        let RedactRequest {
            pdf,
            redactions,
            replacement_texts,
        } = request;
        self.edit(pdf, move |handle| {
            Redactor::new().redact(handle, &redactions, &replacement_texts)
        })
        .await
    }

    /// Runs on the async runtime; the subprocess is awaited, not blocked on.
    pub async fn compress(&self, request: CompressRequest) -> Result<Compressed> {
        self.compressor
            .compress(&request.pdf, request.method, request.rasterize)
            .await
    }

    pub fn compression_methods(&self) -> Vec<MethodInfo> {
        self.compressor.methods()
    }

    /// `None` when Ghostscript is missing or unresponsive.
    pub async fn ghostscript_version(&self) -> Option<String> {
        self.compressor.transform().version().await
    }

    /// Open `input`, apply `operation`, and serialize.
    async fn edit<D, F>(&self, input: PdfInput, operation: F) -> Result<Processed<D>>
    where
        D: Send + 'static,
        F: FnOnce(&mut PdfHandle) -> Result<D> + Send + 'static,
    {
        self.config.check_input_size(input.bytes.len())?;
        self.blocking(move || {
            let mut handle = PdfHandle::open(&input.bytes, input.password())?;
            let details = operation(&mut handle)?;
            let pdf = handle.save()?;
            Ok(Processed { pdf, details })
        })
        .await
    }

    async fn blocking<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let seconds = self.config.request_timeout_secs;
        let task = tokio::task::spawn_blocking(job);
        match tokio::time::timeout(self.config.request_timeout(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(FalzwerkError::ProcessingFailed(format!(
                "document worker failed: {}",
                join_err
            ))),
            Err(_) => {
                // The worker cannot be interrupted; its result is discarded.
                warn!(seconds, "Request timed out");
                Err(FalzwerkError::Timeout { seconds })
            }
        }
    }
}

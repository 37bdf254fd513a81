//! Sliding-window lease extraction: pages → windows → model → merge.
//!
//! Every window is sent concurrently through a [`GatedClient`], so at most
//! `max_concurrent` calls are in flight and each is bounded by
//! `timeout_secs`. A window whose call or JSON fails contributes an empty
//! object; the extraction as a whole only fails when the PDF cannot be read.

use super::merger::merge_windows;
use super::prompts::{build_extraction_prompt, build_retry_prompt};
use super::report::{
    build_summary, request_id, round2, ExtractionMetadata, LeaseExtractionResponse,
    LeaseTokenUsage, WindowTiming,
};
use super::schema::clean_lease_data;
use crate::config::{ExtractorConfig, FREE_MODEL};
use crate::error::{LeaseAiError, ModelError};
use crate::llm::pricing::{estimate_cost, lease_cost};
use crate::llm::{Completion, GatedClient, ModelClient, ModelRequest};
use crate::pipeline::ocr::{ocr_if_needed, OcrOutcome};
use crate::pipeline::postprocess::extract_json_block;
use crate::pipeline::text::{PageSource, PdfiumText};
use crate::pipeline::window::{avg_chars_per_page, plan_windows, window_text, DocumentStats, PageWindow};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of one window, successful or not.
#[derive(Debug, Clone)]
pub struct WindowResult {
    pub window_id: usize,
    /// Extracted object; `{}` when the window failed.
    pub data: Value,
    pub error: Option<String>,
    /// Seconds.
    pub duration: f64,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub stop_reason: Option<String>,
}

impl WindowResult {
    fn failed(window_id: usize, error: String, started: Instant) -> Self {
        Self {
            window_id,
            data: Value::Object(Default::default()),
            error: Some(error),
            duration: round2(started.elapsed().as_secs_f64()),
            input_tokens: 0,
            output_tokens: 0,
            stop_reason: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Extracts structured [`LeaseData`](super::schema::LeaseData) from a PDF.
pub struct LeaseExtractor {
    client: GatedClient,
    ocr_client: Option<Arc<dyn ModelClient>>,
    pages: Arc<dyn PageSource>,
    config: ExtractorConfig,
    pdf_timeout: Duration,
}

impl LeaseExtractor {
    pub fn new(client: Arc<dyn ModelClient>, config: ExtractorConfig) -> Self {
        let gate = GatedClient::new(
            client,
            config.max_concurrent,
            Duration::from_secs(config.timeout_secs),
        );
        info!(
            "LeaseExtractor initialized: model={}, window={}/{}, concurrency={}",
            config.model_id, config.window_size, config.window_overlap, config.max_concurrent
        );
        Self {
            client: gate,
            ocr_client: None,
            pages: Arc::new(PdfiumText),
            config,
            pdf_timeout: Duration::from_secs(30),
        }
    }

    /// Vision client used to transcribe scanned pages.
    pub fn with_ocr(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.ocr_client = Some(client);
        self
    }

    pub fn with_page_source(mut self, pages: Arc<dyn PageSource>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_pdf_timeout(mut self, timeout: Duration) -> Self {
        self.pdf_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// The configuration for one request, with optional window overrides.
    ///
    /// Out-of-range overrides are a 422 for the caller, not a server error.
    pub fn request_config(
        &self,
        window_size: Option<usize>,
        window_overlap: Option<usize>,
    ) -> Result<ExtractorConfig, LeaseAiError> {
        let mut builder = self.config.to_builder();
        if let Some(size) = window_size {
            builder = builder.window_size(size);
        }
        if let Some(overlap) = window_overlap {
            builder = builder.window_overlap(overlap);
        }
        builder.build().map_err(|e| match e {
            LeaseAiError::InvalidConfig(detail) => LeaseAiError::Validation {
                message: "Invalid window parameters".into(),
                details: Some(detail),
                suggestion: Some(
                    "window_size must be 3-15 and window_overlap 1-5, smaller than window_size"
                        .into(),
                ),
            },
            other => other,
        })
    }

    /// Run the full pipeline on an uploaded PDF.
    pub async fn extract(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        window_size: Option<usize>,
        window_overlap: Option<usize>,
    ) -> Result<LeaseExtractionResponse, LeaseAiError> {
        let started = Instant::now();
        let config = self.request_config(window_size, window_overlap)?;
        let id = request_id(filename, &bytes);
        info!("[{}] Starting extraction: {} ({} bytes)", id, filename, bytes.len());

        let pages = self.pages.pages(bytes.clone(), self.pdf_timeout).await?;
        info!("[{}] PDF has {} pages", id, pages.len());

        let ocr = match &self.ocr_client {
            Some(client) => ocr_if_needed(client.as_ref(), bytes, pages, &config).await,
            None => OcrOutcome {
                pages,
                ..Default::default()
            },
        };
        if ocr.pages.iter().all(|p| p.trim().is_empty()) {
            return Err(LeaseAiError::EmptyPdf);
        }

        Ok(self.extract_from_pages(&ocr, &config, &id, started).await)
    }

    /// Window, extract, merge and report on already-extracted page text.
    pub async fn extract_from_pages(
        &self,
        ocr: &OcrOutcome,
        config: &ExtractorConfig,
        request_id: &str,
        started: Instant,
    ) -> LeaseExtractionResponse {
        let pages = &ocr.pages;
        let windows = plan_windows(pages.len(), config.window_size, config.window_overlap);
        info!(
            "[{}] Created {} windows from {} pages",
            request_id,
            windows.len(),
            pages.len()
        );

        let results = self.extract_windows(pages, &windows, config).await;

        let window_data: Vec<Value> = results.iter().map(|r| r.data.clone()).collect();
        let merged = merge_windows(&window_data);
        let (data, dropped_items) = clean_lease_data(&merged.data);
        if !dropped_items.is_empty() {
            warn!(
                "[{}] Schema validation dropped {} items",
                request_id,
                dropped_items.len()
            );
        }

        let input_tokens: usize = results.iter().map(|r| r.input_tokens).sum();
        let output_tokens: usize = results.iter().map(|r| r.output_tokens).sum();
        let mut cost = lease_cost(&config.model_id, input_tokens, output_tokens);
        if ocr.applied {
            cost += estimate_cost(FREE_MODEL, ocr.input_tokens, ocr.output_tokens);
        }

        let processing_time = round2(started.elapsed().as_secs_f64());
        let metadata = ExtractionMetadata {
            request_id: request_id.to_string(),
            model_id: config.model_id.clone(),
            processing_time,
            total_windows: windows.len(),
            total_pages: pages.len(),
            confidence_scores: merged.confidence_scores,
            conflicts_found: !merged.conflicts.is_empty(),
            conflict_details: merged.conflicts,
            validation_issues: merged.validation_issues,
            dropped_items,
            token_usage: LeaseTokenUsage {
                input_tokens,
                output_tokens,
                total_tokens: input_tokens + output_tokens,
            },
            window_timings: results
                .iter()
                .map(|r| WindowTiming {
                    window_id: r.window_id,
                    duration: r.duration,
                    success: r.succeeded(),
                })
                .collect(),
            estimated_cost_usd: (cost * 10_000.0).round() / 10_000.0,
            document: DocumentStats {
                total_pages: pages.len(),
                total_windows: windows.len(),
                window_size: config.window_size,
                overlap: config.window_overlap,
                avg_chars_per_page: round2(avg_chars_per_page(pages)),
                ocr_applied: ocr.applied,
            },
        };

        let summary = build_summary(&data, &metadata);
        info!("[{}] Extraction complete: {:.2}s", request_id, processing_time);
        LeaseExtractionResponse {
            data,
            metadata,
            summary,
        }
    }

    async fn extract_windows(
        &self,
        pages: &[String],
        windows: &[PageWindow],
        config: &ExtractorConfig,
    ) -> Vec<WindowResult> {
        info!("Starting parallel extraction for {} windows", windows.len());
        let tasks = windows
            .iter()
            .map(|w| self.extract_window(pages, w, config));
        let results = futures::future::join_all(tasks).await;

        let ok = results.iter().filter(|r| r.succeeded()).count();
        info!(
            "Parallel extraction complete: {} successful, {} failed",
            ok,
            results.len() - ok
        );
        results
    }

    async fn extract_window(
        &self,
        pages: &[String],
        window: &PageWindow,
        config: &ExtractorConfig,
    ) -> WindowResult {
        let started = Instant::now();
        let text = window_text(pages, window);
        let prompt = build_extraction_prompt(&text, &window.context(pages.len()));
        info!(
            "Window {}: sending {} chars, PDF text length: {} chars",
            window.window_id,
            prompt.len(),
            text.len()
        );

        let first = match self.call(&prompt, config).await {
            Ok(c) => c,
            Err(e) => {
                error!("Window {} extraction failed: {}", window.window_id, e);
                return WindowResult::failed(window.window_id, e.to_string(), started);
            }
        };
        let mut input_tokens = first.input_tokens;
        let mut output_tokens = first.output_tokens;

        let (parsed, stop_reason) = match parse_window_object(&first.text) {
            Ok(data) => (data, first.stop_reason),
            Err(first_err) => {
                warn!(
                    "Window {}: JSON parse failed ({}), retrying with stricter prompt",
                    window.window_id, first_err
                );
                let retry = match self.call(&build_retry_prompt(&prompt), config).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!("Window {} retry failed: {}", window.window_id, e);
                        return WindowResult::failed(window.window_id, e.to_string(), started);
                    }
                };
                input_tokens += retry.input_tokens;
                output_tokens += retry.output_tokens;
                match parse_window_object(&retry.text) {
                    Ok(data) => {
                        info!("Window {}: retry successful", window.window_id);
                        (data, retry.stop_reason)
                    }
                    Err(e) => {
                        error!("Window {}: retry also failed - {}", window.window_id, e);
                        return WindowResult::failed(window.window_id, e, started);
                    }
                }
            }
        };

        let count = |field: &str| parsed.get(field).and_then(Value::as_array).map_or(0, Vec::len);
        info!(
            "Window {} extracted: {} utilities, {} fees, rent={}",
            window.window_id,
            count("utility_responsibilities"),
            count("additional_fees"),
            parsed
                .pointer("/rent_and_deposits/monthly_base_rent")
                .unwrap_or(&serde_json::Value::Null)
        );
        let duration = round2(started.elapsed().as_secs_f64());
        debug!(
            "Window {} extracted in {:.2}s ({}+{} tokens)",
            window.window_id, duration, input_tokens, output_tokens
        );

        WindowResult {
            window_id: window.window_id,
            data: parsed,
            error: None,
            duration,
            input_tokens,
            output_tokens,
            stop_reason,
        }
    }

    async fn call(&self, prompt: &str, config: &ExtractorConfig) -> Result<Completion, ModelError> {
        let request = ModelRequest::new(config.model_id.clone(), prompt)
            .temperature(config.temperature)
            .max_tokens(config.max_tokens);
        self.client.complete(&request).await
    }
}

/// The model must answer with a JSON object.
fn parse_window_object(text: &str) -> Result<Value, String> {
    match extract_json_block(text)? {
        v @ Value::Object(_) => Ok(v),
        other => Err(format!("expected a JSON object, got {}", kind(&other))),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

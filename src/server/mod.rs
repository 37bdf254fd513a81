//! HTTP surface: shared state and the axum router.

pub mod handlers;
pub mod upload;

use crate::analysis::Analyzer;
use crate::assistant::Assistant;
use crate::config::Settings;
use crate::lease::LeaseExtractor;
use crate::llm::{BedrockClient, ModelClient, ModelRouter, OpenRouterClient};
use crate::pipeline::text::PageSource;
use crate::search::WebSearcher;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Slack on top of the file limit for the rest of the multipart body.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub struct AppState {
    pub settings: Settings,
    pub analyzer: Analyzer,
    pub assistant: Assistant,
    pub extractor: LeaseExtractor,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Production wiring: OpenRouter and Bedrock behind a router, DuckDuckGo
    /// for law search.
    pub async fn from_settings(settings: Settings) -> Self {
        if settings.openrouter_api_key.is_none() {
            warn!("OPENROUTER_API_KEY is not set; analysis and assistant endpoints will fail");
        }
        let bedrock = BedrockClient::from_region(&settings.aws_region).await;
        let router = ModelRouter::new(Some(Arc::new(OpenRouterClient::new())), Some(Arc::new(bedrock)));
        Self::with_clients(settings, Arc::new(router), WebSearcher::duckduckgo())
    }

    /// Wire every feature to one model client and one searcher.
    pub fn with_clients(settings: Settings, client: Arc<dyn ModelClient>, searcher: WebSearcher) -> Self {
        let pdf_timeout = Duration::from_secs(settings.pdf_timeout_secs);
        let analyzer = Analyzer::new(client.clone(), searcher)
            .with_pdf_timeout(pdf_timeout)
            .with_concurrency(settings.compare_concurrency)
            .with_search_limit(settings.search_results_limit);
        let assistant = Assistant::new(client.clone());
        let mut extractor =
            LeaseExtractor::new(client.clone(), settings.extractor.clone()).with_pdf_timeout(pdf_timeout);
        if settings.openrouter_api_key.is_some() {
            extractor = extractor.with_ocr(client);
        }
        Self {
            settings,
            analyzer,
            assistant,
            extractor,
        }
    }

    /// Read uploads through `pages` instead of pdfium.
    pub fn with_page_source(self, pages: Arc<dyn PageSource>) -> Self {
        Self {
            analyzer: self.analyzer.with_page_source(pages.clone()),
            extractor: self.extractor.with_page_source(pages),
            ..self
        }
    }
}

pub fn router(state: SharedState) -> Router {
    let body_limit = state.settings.max_file_size_bytes() + FORM_OVERHEAD_BYTES;
    info!("Upload limit: {} bytes", body_limit);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::models))
        .route("/providers", get(handlers::providers))
        .route("/analyze/single", post(handlers::analyze_single))
        .route("/analyze/compare", post(handlers::analyze_compare))
        .route("/analyze/provider/{provider}", post(handlers::analyze_provider))
        .route("/analyze/categorized", post(handlers::analyze_categorized))
        .route("/analyze/duckduckgo", post(handlers::analyze_duckduckgo))
        .route("/maintenance/evaluate", post(handlers::maintenance_evaluate))
        .route("/maintenance/vendor", post(handlers::maintenance_vendor))
        .route("/maintenance/workflow", post(handlers::maintenance_workflow))
        .route("/move-out/evaluate", post(handlers::move_out_evaluate))
        .route("/tenant/rewrite", post(handlers::tenant_rewrite))
        .route("/extract-lease", post(handlers::extract_lease))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

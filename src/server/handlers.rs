//! Route handlers. Each validates its input, then hands off to the analyzer,
//! assistant or extractor held in [`AppState`].

use super::upload::{parse_form, Upload};
use super::SharedState;
use crate::config::{ALL_MODELS, PROVIDER_PREFIXES};
use crate::error::LeaseAiError;
use crate::lease::LeaseExtractionResponse;
use crate::llm::pricing::available_models;
use crate::models::{
    AnalysisResult, CategorizedAnalysisResult, ComparisonResult, MaintenanceEvaluation,
    MaintenanceWorkflow, ModelInfo, MoveOutResponse, SearchStrategy, TenantMessageRewrite,
    VendorWorkOrder,
};
use crate::validators::{
    validate_landlord_notes, validate_maintenance_request, validate_move_out_request,
    validate_owner_notes, validate_tenant_message,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

type ApiResult<T> = Result<Json<T>, LeaseAiError>;

// ── Info ─────────────────────────────────────────────────────────────────

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "Lease Violation Analyzer",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /health": "Health check",
            "GET /models": "Available analysis models",
            "GET /providers": "Models grouped by provider",
            "POST /analyze/single": "Analyze a lease with one model",
            "POST /analyze/compare": "Compare all models on one lease",
            "POST /analyze/provider/{provider}": "Compare one provider's models",
            "POST /analyze/categorized": "Violations grouped by category",
            "POST /analyze/duckduckgo": "Analyze with DuckDuckGo law search",
            "POST /maintenance/evaluate": "Approve or reject a maintenance request",
            "POST /maintenance/vendor": "Vendor work order for a maintenance request",
            "POST /maintenance/workflow": "Decision, tenant message and work order",
            "POST /move-out/evaluate": "Review a move-out notice",
            "POST /tenant/rewrite": "Rewrite a tenant's maintenance message",
            "POST /extract-lease": "Structured lease extraction"
        }
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "Lease Violation Analyzer"}))
}

pub async fn models() -> Json<Vec<ModelInfo>> {
    Json(available_models())
}

pub async fn providers() -> Json<Value> {
    let providers: Vec<Value> = PROVIDER_PREFIXES
        .iter()
        .map(|(name, prefix)| {
            let models: Vec<&str> = ALL_MODELS
                .iter()
                .copied()
                .filter(|m| m.starts_with(prefix))
                .collect();
            json!({"name": name, "count": models.len(), "models": models})
        })
        .collect();
    Json(json!({"total_providers": providers.len(), "providers": providers}))
}

// ── Analysis ─────────────────────────────────────────────────────────────

pub async fn analyze_single(State(state): State<SharedState>, multipart: Upload) -> ApiResult<AnalysisResult> {
    let max = state.settings.max_file_size_bytes();
    let mut form = parse_form(multipart, max).await?;
    let file = form.pdf(max)?;
    let model = form.required("model_name")?.to_string();
    let strategy: SearchStrategy = form
        .text("search_strategy")
        .unwrap_or_default()
        .parse()
        .map_err(LeaseAiError::validation)?;
    info!("Single analysis of {} with {} ({})", file.filename, model, strategy);
    Ok(Json(state.analyzer.analyze_single(file.data, &model, strategy).await?))
}

pub async fn analyze_duckduckgo(
    State(state): State<SharedState>,
    multipart: Upload,
) -> ApiResult<AnalysisResult> {
    let max = state.settings.max_file_size_bytes();
    let mut form = parse_form(multipart, max).await?;
    let file = form.pdf(max)?;
    let model = form.required("model_name")?.to_string();
    info!("DuckDuckGo analysis of {} with {}", file.filename, model);
    Ok(Json(
        state
            .analyzer
            .analyze_single(file.data, &model, SearchStrategy::DuckDuckGo)
            .await?,
    ))
}

pub async fn analyze_compare(State(state): State<SharedState>, multipart: Upload) -> ApiResult<ComparisonResult> {
    let max = state.settings.max_file_size_bytes();
    let file = parse_form(multipart, max).await?.pdf(max)?;
    Ok(Json(
        state
            .analyzer
            .compare_models(file.data, &file.filename, ALL_MODELS)
            .await?,
    ))
}

pub async fn analyze_provider(
    State(state): State<SharedState>,
    Path(provider): Path<String>,
    multipart: Upload,
) -> ApiResult<ComparisonResult> {
    let max = state.settings.max_file_size_bytes();
    let file = parse_form(multipart, max).await?.pdf(max)?;
    Ok(Json(
        state
            .analyzer
            .analyze_provider(file.data, &file.filename, &provider)
            .await?,
    ))
}

pub async fn analyze_categorized(
    State(state): State<SharedState>,
    multipart: Upload,
) -> ApiResult<CategorizedAnalysisResult> {
    let max = state.settings.max_file_size_bytes();
    let file = parse_form(multipart, max).await?.pdf(max)?;
    Ok(Json(state.analyzer.analyze_categorized(file.data).await?))
}

// ── Maintenance ──────────────────────────────────────────────────────────

/// Lease text, validated request and validated notes.
struct AssistantInput {
    lease_text: String,
    request: String,
    notes: Option<String>,
}

async fn maintenance_input(state: &SharedState, multipart: Upload) -> Result<AssistantInput, LeaseAiError> {
    let max = state.settings.max_file_size_bytes();
    let mut form = parse_form(multipart, max).await?;
    let file = form.pdf(max)?;
    let request = validate_maintenance_request(form.text("maintenance_request").unwrap_or_default())?;
    let notes = validate_landlord_notes(form.text("landlord_notes"))?;
    let lease = state.analyzer.read_lease(file.data).await?;
    Ok(AssistantInput {
        lease_text: lease.full_text,
        request,
        notes,
    })
}

pub async fn maintenance_evaluate(
    State(state): State<SharedState>,
    multipart: Upload,
) -> ApiResult<MaintenanceEvaluation> {
    let input = maintenance_input(&state, multipart).await?;
    Ok(Json(
        state
            .assistant
            .evaluate_maintenance(&input.lease_text, &input.request, input.notes.as_deref())
            .await?,
    ))
}

pub async fn maintenance_vendor(
    State(state): State<SharedState>,
    multipart: Upload,
) -> ApiResult<VendorWorkOrder> {
    let input = maintenance_input(&state, multipart).await?;
    Ok(Json(
        state
            .assistant
            .generate_vendor_work_order(&input.lease_text, &input.request, input.notes.as_deref())
            .await?,
    ))
}

pub async fn maintenance_workflow(
    State(state): State<SharedState>,
    multipart: Upload,
) -> ApiResult<MaintenanceWorkflow> {
    let input = maintenance_input(&state, multipart).await?;
    Ok(Json(
        state
            .assistant
            .maintenance_workflow(&input.lease_text, &input.request, input.notes.as_deref())
            .await?,
    ))
}

// ── Tenant and move-out ──────────────────────────────────────────────────

pub async fn move_out_evaluate(State(state): State<SharedState>, multipart: Upload) -> ApiResult<MoveOutResponse> {
    let max = state.settings.max_file_size_bytes();
    let mut form = parse_form(multipart, max).await?;
    let file = form.pdf(max)?;
    let request = validate_move_out_request(form.text("move_out_request").unwrap_or_default())?;
    let notes = validate_owner_notes(form.text("owner_notes"))?;
    let lease = state.analyzer.read_lease(file.data).await?;
    Ok(Json(
        state
            .assistant
            .evaluate_move_out(&lease.full_text, &request, notes.as_deref())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub message: String,
}

pub async fn tenant_rewrite(
    State(state): State<SharedState>,
    body: Result<Json<RewriteRequest>, JsonRejection>,
) -> ApiResult<TenantMessageRewrite> {
    let Json(body) = body?;
    let message = validate_tenant_message(&body.message)?;
    Ok(Json(state.assistant.rewrite_tenant_message(&message).await?))
}

// ── Extraction ───────────────────────────────────────────────────────────

pub async fn extract_lease(
    State(state): State<SharedState>,
    multipart: Upload,
) -> ApiResult<LeaseExtractionResponse> {
    let max = state.settings.max_file_size_bytes();
    let mut form = parse_form(multipart, max).await?;
    let file = form.pdf(max)?;
    let window_size = form.number("window_size")?;
    let window_overlap = form.number("window_overlap")?;
    Ok(Json(
        state
            .extractor
            .extract(file.data, &file.filename, window_size, window_overlap)
            .await?,
    ))
}

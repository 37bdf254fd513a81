//! Error types for the lease-ai server.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`LeaseAiError`]: **Fatal** for one request: the upload is invalid, the
//!   PDF cannot be read, or a model call failed with no fallback. Every
//!   variant knows its HTTP status, machine code and user-facing suggestion,
//!   and renders itself through [`IntoResponse`].
//!
//! * [`ModelError`]: **Non-fatal**: a single model call failed (timeout,
//!   throttling, unparseable output). Stored inside per-window results so a
//!   sliding-window extraction survives one bad window, and converted into
//!   [`LeaseAiError`] when the caller has nothing to fall back to.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// All request-level errors returned by the service.
#[derive(Debug, Error)]
pub enum LeaseAiError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A text or form field failed validation.
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<String>,
        suggestion: Option<String>,
    },

    /// Malformed request (missing multipart field, unknown provider).
    #[error("{message}")]
    BadRequest { message: String },

    /// The uploaded file is not a PDF.
    #[error("Only PDF files are supported")]
    UnsupportedFileType { filename: String },

    /// The uploaded file exceeds `MAX_FILE_SIZE_MB`.
    #[error("PDF file is too large")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    /// A lookup matched nothing (e.g. a provider with no models).
    #[error("{message}")]
    NotFound { message: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open or read the document.
    #[error("{message}")]
    PdfExtraction {
        message: String,
        details: Option<String>,
    },

    /// The document opened but no page yielded text.
    #[error("PDF contains no extractable text")]
    EmptyPdf,

    /// Text extraction exceeded its time budget.
    #[error("PDF extraction timed out after {secs} seconds")]
    PdfTimeout { secs: u64 },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model did not answer within the per-call timeout.
    #[error("AI processing timed out after {secs} seconds")]
    AiTimeout { secs: u64 },

    /// The model provider returned an error.
    #[error("{message}")]
    AiModel {
        message: String,
        details: Option<String>,
        suggestion: Option<String>,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeaseAiError {
    /// Shorthand for a validation error without details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
            suggestion: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Provider failure with the default retry suggestion.
    pub fn ai_model(message: impl Into<String>, details: Option<String>) -> Self {
        Self::AiModel {
            message: message.into(),
            details,
            suggestion: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::UnsupportedFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::PdfExtraction { .. } | Self::EmptyPdf => StatusCode::BAD_REQUEST,
            Self::PdfTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::AiTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::AiModel { .. } => StatusCode::BAD_GATEWAY,
            Self::InvalidConfig(_) | Self::PdfiumBindingFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code sent as the `error` field.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::UnsupportedFileType { .. } => "UNSUPPORTED_FILE_TYPE",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PdfExtraction { .. } => "PDF_EXTRACTION_FAILED",
            Self::EmptyPdf => "EMPTY_PDF",
            Self::PdfTimeout { .. } => "PDF_TIMEOUT",
            Self::AiTimeout { .. } => "AI_TIMEOUT",
            Self::AiModel { .. } => "AI_MODEL_ERROR",
            Self::InvalidConfig(_) | Self::PdfiumBindingFailed(_) | Self::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            Self::Validation { details, .. }
            | Self::PdfExtraction { details, .. }
            | Self::AiModel { details, .. } => details.clone(),
            Self::UnsupportedFileType { filename } => {
                Some(format!("Received '{filename}'; upload a .pdf document"))
            }
            Self::FileTooLarge { size_mb, max_mb } => Some(format!(
                "File size {size_mb:.1}MB exceeds maximum of {max_mb}MB"
            )),
            Self::EmptyPdf => {
                Some("The PDF appears to be a scanned document or contains only images".into())
            }
            Self::PdfTimeout { .. } => Some(
                "The PDF file may be too large, corrupted, or contains complex elements".into(),
            ),
            Self::AiTimeout { .. } => Some("The AI service took too long to respond".into()),
            _ => None,
        }
    }

    pub fn suggestion(&self) -> Option<String> {
        let s = match self {
            Self::Validation { suggestion, .. } => {
                return Some(
                    suggestion
                        .clone()
                        .unwrap_or_else(|| "Please check your input and try again".into()),
                )
            }
            Self::UnsupportedFileType { .. } => "Please upload a PDF file",
            Self::FileTooLarge { .. } => "Please upload a smaller PDF file",
            Self::PdfExtraction { .. } => {
                "Please ensure the PDF is not corrupted, password-protected, or scanned. \
                 Try uploading a different PDF file."
            }
            Self::EmptyPdf => {
                "Please upload a text-based PDF or use OCR to convert scanned documents to text"
            }
            Self::PdfTimeout { .. } => "Try uploading a smaller or simpler PDF file",
            Self::AiTimeout { .. } => {
                "Please try again. If the problem persists, try simplifying your request."
            }
            Self::AiModel { suggestion, .. } => {
                return Some(suggestion.clone().unwrap_or_else(|| {
                    "The AI service encountered an error. Please try again later.".into()
                }))
            }
            _ => return None,
        };
        Some(s.to_string())
    }

    /// JSON body: `{"error", "message", "details"?, "suggestion"?}`.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("error".into(), json!(self.error_code()));
        body.insert("message".into(), json!(self.to_string()));
        if let Some(details) = self.details() {
            body.insert("details".into(), json!(details));
        }
        if let Some(suggestion) = self.suggestion() {
            body.insert("suggestion".into(), json!(suggestion));
        }
        Value::Object(body)
    }
}

impl IntoResponse for LeaseAiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{} ({}): {}", status, self.error_code(), self);
        } else {
            tracing::warn!("{} ({}): {}", status, self.error_code(), self);
        }
        (status, Json(self.to_body())).into_response()
    }
}

/// Malformed JSON bodies get the same error envelope as everything else.
impl From<JsonRejection> for LeaseAiError {
    fn from(r: JsonRejection) -> Self {
        if r.status() == StatusCode::UNPROCESSABLE_ENTITY {
            Self::Validation {
                message: "Request body does not match the expected fields".into(),
                details: Some(r.body_text()),
                suggestion: None,
            }
        } else {
            Self::bad_request(format!("Invalid JSON body: {}", r.body_text()))
        }
    }
}

impl From<MultipartRejection> for LeaseAiError {
    fn from(r: MultipartRejection) -> Self {
        Self::bad_request(format!("Expected a multipart form upload: {}", r.body_text()))
    }
}

/// A non-fatal failure of one model call.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ModelError {
    /// The call exceeded its timeout.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 429 / ThrottlingException after all retries.
    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: String },

    /// Credentials lack access to the model.
    #[error("Access denied: {detail}")]
    AccessDenied { detail: String },

    /// The model id names a provider family we cannot format requests for.
    #[error("Unsupported model: {model}")]
    Unsupported { model: String },

    /// The provider could not be constructed (missing API key etc.).
    #[error("Model provider '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },

    /// The model answered but the answer could not be used.
    #[error("Unusable model output: {detail}")]
    InvalidOutput { detail: String },

    /// Any other provider error.
    #[error("{message}")]
    Provider { message: String },
}

impl ModelError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Provider { .. }
        )
    }
}

impl From<ModelError> for LeaseAiError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Timeout { secs } => LeaseAiError::AiTimeout { secs },
            ModelError::RateLimited { provider } => LeaseAiError::ai_model(
                format!("{provider} rate limit exceeded"),
                Some("Too many requests; wait a moment before retrying".into()),
            ),
            ModelError::AccessDenied { detail } => LeaseAiError::AiModel {
                message: "Access denied to AWS Bedrock".into(),
                details: Some(detail),
                suggestion: Some(
                    "Check IAM permissions or enable model access in AWS Console".into(),
                ),
            },
            ModelError::Unsupported { model } => {
                LeaseAiError::ai_model("Unsupported model", Some(format!("Model '{model}'")))
            }
            ModelError::NotConfigured { provider, hint } => LeaseAiError::AiModel {
                message: format!("AI provider '{provider}' is not configured"),
                details: Some(hint),
                suggestion: Some("Set the provider API key and restart the server".into()),
            },
            ModelError::InvalidOutput { detail } => {
                LeaseAiError::ai_model("AI returned an unusable response", Some(detail))
            }
            ModelError::Provider { message } => LeaseAiError::ai_model(message, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_422_with_default_suggestion() {
        let e = LeaseAiError::validation("Maintenance request cannot be empty");
        assert_eq!(e.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = e.to_body();
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert_eq!(body["message"], "Maintenance request cannot be empty");
        assert_eq!(body["suggestion"], "Please check your input and try again");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn size_and_type_errors_use_413_and_415() {
        let big = LeaseAiError::FileTooLarge {
            size_mb: 12.34,
            max_mb: 10,
        };
        assert_eq!(big.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(big.details().unwrap().contains("12.3MB"));

        let wrong = LeaseAiError::UnsupportedFileType {
            filename: "lease.docx".into(),
        };
        assert_eq!(wrong.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(wrong.error_code(), "UNSUPPORTED_FILE_TYPE");
    }

    #[test]
    fn model_timeout_becomes_504() {
        let e: LeaseAiError = ModelError::Timeout { secs: 120 }.into();
        assert_eq!(e.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(e.to_string(), "AI processing timed out after 120 seconds");
    }

    #[test]
    fn access_denied_carries_iam_hint() {
        let e: LeaseAiError = ModelError::AccessDenied {
            detail: "no model access".into(),
        }
        .into();
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        assert!(e.suggestion().unwrap().contains("IAM"));
    }

    #[test]
    fn pdf_timeout_is_408() {
        let e = LeaseAiError::PdfTimeout { secs: 30 };
        assert_eq!(e.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(e.error_code(), "PDF_TIMEOUT");
        assert!(e.to_string().contains("30 seconds"));
    }

    #[test]
    fn transient_classification() {
        assert!(ModelError::Timeout { secs: 1 }.is_transient());
        assert!(!ModelError::Unsupported { model: "x".into() }.is_transient());
        assert!(!ModelError::AccessDenied { detail: "x".into() }.is_transient());
    }
}

//! # lease-ai-server
//!
//! HTTP backend that reads residential lease PDFs and asks hosted LLMs about
//! them: structured extraction, tenant-law violation analysis, model
//! comparison and a set of landlord/tenant assistants.
//!
//! ## Request flow
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Validate  name, size, %PDF magic
//!  ├─ 2. Text      pdfium text layer (spawn_blocking, timeout)
//!  ├─ 3. Facts     regex lease fields (parties, rent, location)
//!  ├─ 4. Search    optional DuckDuckGo .gov law lookup
//!  ├─ 5. Model     OpenRouter or Bedrock via ModelRouter
//!  └─ 6. Repair    JSON recovery, defaults, metrics
//! ```
//!
//! `/extract-lease` takes a different path: pages are sliced into
//! overlapping windows, each window is extracted concurrently and the
//! partial records are merged field by field.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lease_ai::{router, AppState, Settings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let app = router(Arc::new(AppState::from_settings(settings).await));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `lease-server` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod assistant;
pub mod config;
pub mod error;
pub mod lease;
pub mod lease_info;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod search;
pub mod server;
pub mod validators;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::Analyzer;
pub use assistant::Assistant;
pub use config::{ExtractorConfig, ExtractorConfigBuilder, Settings};
pub use error::{LeaseAiError, ModelError};
pub use lease::{LeaseData, LeaseExtractionResponse, LeaseExtractor};
pub use llm::{BedrockClient, ModelClient, ModelRequest, ModelRouter, OpenRouterClient};
pub use search::{DuckDuckGo, SearchBackend, WebSearcher};
pub use server::{router, AppState, SharedState};

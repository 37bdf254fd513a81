//! HTTP server binary for lease-ai-server.
//!
//! Loads `.env`, reads [`Settings`] from the environment, makes sure the
//! pdfium engine is present and serves the router until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use lease_ai::{router, AppState, Settings};
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY      OpenRouter key for analysis, assistants and OCR
  AWS_REGION              Bedrock region (default us-east-1)
  BEDROCK_LEASE_MODEL_ID  Model used for /extract-lease windows
  BEDROCK_MAX_CONCURRENT  Window calls in flight (default 5)
  BEDROCK_TIMEOUT         Per-window timeout in seconds (default 120)
  LEASE_WINDOW_SIZE       Pages per window (default 7)
  LEASE_WINDOW_OVERLAP    Pages shared between windows (default 2)
  MAX_FILE_SIZE_MB        Upload limit (default 10)
  SEARCH_RESULTS_LIMIT    Law search results per prompt (default 10)
  PDF_TIMEOUT             Text extraction budget in seconds (default 30)
  COMPARE_CONCURRENCY     Models analysed at once by /analyze/compare
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
"#;

/// Lease PDF analysis over hosted LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "lease-server",
    version,
    about = "Lease PDF analysis server: extraction, violation analysis and assistants",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Debug logging.
    #[arg(short, long, env = "LEASE_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, env = "LEASE_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── PDF engine ───────────────────────────────────────────────────────
    if !pdfium_auto::is_pdfium_cached() {
        info!("Downloading PDFium engine");
    }
    tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
        .context("Failed to prepare PDFium engine")?;

    // ── State and router ─────────────────────────────────────────────────
    let settings = Settings::from_env().context("Invalid configuration")?;
    info!(
        "Upload limit {} MB, extraction model {}",
        settings.max_file_size_mb, settings.extractor.model_id
    );
    let state = Arc::new(AppState::from_settings(settings).await);
    let app = router(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Lease Violation Analyzer listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received, draining connections");
    }
}

//! Configuration: environment settings, the model catalogue and the
//! sliding-window extractor knobs.
//!
//! [`Settings`] is read once at start-up from the process environment
//! (the binary loads `.env` first). Lease extraction has its own
//! [`ExtractorConfig`], built through [`ExtractorConfigBuilder`] so request
//! overrides (`window_size`, `window_overlap`) get the same validation as the
//! environment defaults.

use crate::error::LeaseAiError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

// ── Model catalogue ──────────────────────────────────────────────────────

/// Cheap OpenRouter model used by the assistants and OCR fallback.
pub const FREE_MODEL: &str = "google/gemini-2.0-flash-001";

/// Categorized violation analysis always runs on this model.
pub const CATEGORIZED_MODEL: &str = "mistralai/mistral-medium-3.1";

/// Every model tested by `/analyze/compare`, in presentation order.
pub const ALL_MODELS: &[&str] = &[
    "perplexity/sonar-pro",
    "perplexity/sonar",
    "perplexity/sonar-reasoning",
    "anthropic/claude-sonnet-4.5",
    "anthropic/claude-3.7-sonnet",
    "anthropic/claude-opus-4",
    "openai/gpt-5",
    "openai/gpt-5-mini",
    "openai/gpt-4o",
    "google/gemini-2.5-flash-preview-09-2025",
    "google/gemini-2.5-flash-lite",
    "meta-llama/llama-4-scout",
    "meta-llama/llama-3.3-8b-instruct:free",
    "mistralai/mistral-medium-3.1",
    "mistralai/devstral-medium",
    "deepseek/deepseek-v3.2-exp",
    "deepseek/deepseek-chat-v3.1:free",
    "qwen/qwen3-max",
    "qwen/qwen3-coder-plus",
];

/// Models that search the web on their own.
pub const MODELS_WITH_NATIVE_SEARCH: &[&str] =
    &["perplexity/sonar-pro", "perplexity/sonar", "perplexity/sonar-reasoning"];

/// Provider name accepted by `/analyze/provider/{provider}` → model id prefix.
pub const PROVIDER_PREFIXES: &[(&str, &str)] = &[
    ("openai", "openai/"),
    ("anthropic", "anthropic/"),
    ("google", "google/"),
    ("meta", "meta-llama/"),
    ("mistral", "mistralai/"),
    ("deepseek", "deepseek/"),
    ("qwen", "qwen/"),
    ("perplexity", "perplexity/"),
];

pub fn has_native_search(model: &str) -> bool {
    MODELS_WITH_NATIVE_SEARCH.contains(&model)
}

/// Models from [`ALL_MODELS`] belonging to `provider` (case-insensitive).
pub fn provider_models(provider: &str) -> Result<Vec<&'static str>, LeaseAiError> {
    let key = provider.to_lowercase();
    let prefix = PROVIDER_PREFIXES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, prefix)| *prefix)
        .ok_or_else(|| {
            let available: Vec<&str> = PROVIDER_PREFIXES.iter().map(|(n, _)| *n).collect();
            LeaseAiError::bad_request(format!(
                "Invalid provider. Available: {}",
                available.join(", ")
            ))
        })?;

    let models: Vec<&'static str> = ALL_MODELS
        .iter()
        .copied()
        .filter(|m| m.starts_with(prefix))
        .collect();
    if models.is_empty() {
        return Err(LeaseAiError::NotFound {
            message: format!("No models found for provider: {provider}"),
        });
    }
    Ok(models)
}

// ── Settings ─────────────────────────────────────────────────────────────

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Read by the OpenRouter provider factory; kept here for start-up checks.
    pub openrouter_api_key: Option<String>,
    pub aws_region: String,
    /// Upload limit in megabytes. Default: 10.
    pub max_file_size_mb: u64,
    /// Cap on DuckDuckGo results fed into a prompt. Default: 10.
    pub search_results_limit: usize,
    /// Budget for pdfium text extraction. Default: 30 s.
    pub pdf_timeout_secs: u64,
    /// Concurrent model calls during `/analyze/compare`. Default: all models.
    pub compare_concurrency: usize,
    pub extractor: ExtractorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            aws_region: "us-east-1".to_string(),
            max_file_size_mb: 10,
            search_results_limit: 10,
            pdf_timeout_secs: 30,
            compare_concurrency: ALL_MODELS.len(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from environment variables, keeping defaults for
    /// anything absent or unparsable.
    pub fn from_env() -> Result<Self, LeaseAiError> {
        let d = Self::default();
        let extractor = ExtractorConfig::builder()
            .model_id(env_or("BEDROCK_LEASE_MODEL_ID", d.extractor.model_id.clone()))
            .temperature(env_or("BEDROCK_TEMPERATURE", d.extractor.temperature))
            .max_tokens(env_or("BEDROCK_MAX_TOKENS", d.extractor.max_tokens))
            .max_concurrent(env_or("BEDROCK_MAX_CONCURRENT", d.extractor.max_concurrent))
            .timeout_secs(env_or("BEDROCK_TIMEOUT", d.extractor.timeout_secs))
            .window_size(env_or("LEASE_WINDOW_SIZE", d.extractor.window_size))
            .window_overlap(env_or("LEASE_WINDOW_OVERLAP", d.extractor.window_overlap))
            .build()?;

        Ok(Self {
            openrouter_api_key: std::env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            aws_region: env_or("AWS_REGION", d.aws_region),
            max_file_size_mb: env_or("MAX_FILE_SIZE_MB", d.max_file_size_mb),
            search_results_limit: env_or("SEARCH_RESULTS_LIMIT", d.search_results_limit),
            pdf_timeout_secs: env_or("PDF_TIMEOUT", d.pdf_timeout_secs),
            compare_concurrency: env_or("COMPARE_CONCURRENCY", d.compare_concurrency).max(1),
            extractor,
        })
    }

    pub fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize) * 1024 * 1024
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("Ignoring unparsable {}={:?}", key, raw);
                default
            }
        },
        _ => default,
    }
}

// ── Extractor configuration ──────────────────────────────────────────────

/// Knobs for sliding-window lease extraction.
///
/// # Example
/// ```rust
/// use lease_ai::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .window_size(5)
///     .window_overlap(1)
///     .build()
///     .unwrap();
/// assert_eq!(config.window_size, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Bedrock model used for every window.
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Concurrent window calls. Default: 5.
    pub max_concurrent: usize,
    /// Per-window call timeout in seconds. Default: 120.
    pub timeout_secs: u64,
    /// Pages per window. Range: 3–15. Default: 7.
    pub window_size: usize,
    /// Pages shared by consecutive windows. Range: 1–5. Default: 2.
    pub window_overlap: usize,
    /// Average characters per page below which pages are OCR'd. Default: 100.
    pub ocr_threshold_chars: usize,
    /// Longest rendered edge for OCR page images. Default: 2000.
    pub ocr_max_pixels: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model_id: "us.anthropic.claude-3-5-haiku-20241022-v1:0".to_string(),
            temperature: 0.0,
            max_tokens: 8192,
            max_concurrent: 5,
            timeout_secs: 120,
            window_size: 7,
            window_overlap: 2,
            ocr_threshold_chars: 100,
            ocr_max_pixels: 2000,
        }
    }
}

impl ExtractorConfig {
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: Self::default(),
        }
    }

    /// A builder seeded with this configuration, for per-request overrides.
    pub fn to_builder(&self) -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: self.clone(),
        }
    }
}

/// Builder for [`ExtractorConfig`].
#[derive(Debug)]
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    pub fn model_id(mut self, id: impl Into<String>) -> Self {
        self.config.model_id = id.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.config.max_concurrent = n.max(1);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs.max(1);
        self
    }

    /// Checked by [`build`](Self::build), which rejects values outside 3-15.
    pub fn window_size(mut self, n: usize) -> Self {
        self.config.window_size = n;
        self
    }

    pub fn window_overlap(mut self, n: usize) -> Self {
        self.config.window_overlap = n;
        self
    }

    pub fn ocr_threshold_chars(mut self, n: usize) -> Self {
        self.config.ocr_threshold_chars = n;
        self
    }

    pub fn ocr_max_pixels(mut self, px: u32) -> Self {
        self.config.ocr_max_pixels = px.max(100);
        self
    }

    /// Build the configuration, validating window geometry.
    pub fn build(self) -> Result<ExtractorConfig, LeaseAiError> {
        let c = &self.config;
        if !(3..=15).contains(&c.window_size) {
            return Err(LeaseAiError::InvalidConfig(format!(
                "window_size must be 3–15, got {}",
                c.window_size
            )));
        }
        if !(1..=5).contains(&c.window_overlap) {
            return Err(LeaseAiError::InvalidConfig(format!(
                "window_overlap must be 1–5, got {}",
                c.window_overlap
            )));
        }
        if c.window_overlap >= c.window_size {
            return Err(LeaseAiError::InvalidConfig(format!(
                "window_overlap ({}) must be smaller than window_size ({})",
                c.window_overlap, c.window_size
            )));
        }
        if c.model_id.trim().is_empty() {
            return Err(LeaseAiError::InvalidConfig("model_id must not be empty".into()));
        }
        Ok(self.config)
    }
}

//! Model access: one trait over OpenRouter and AWS Bedrock.
//!
//! Every feature of the service (window extraction, violation analysis,
//! assistants, OCR) talks to a [`ModelClient`]. Concrete clients own their
//! provider's request format and retry policy; [`ModelRouter`] picks one by
//! model id and [`GatedClient`] adds the concurrency cap and per-call
//! timeout used by lease extraction.
//!
//! ```text
//!            ┌── "vendor/model"       ──▶ OpenRouterClient (edgequake-llm)
//! ModelRouter┤
//!            └── "anthropic.claude…"  ──▶ BedrockClient (aws-sdk-bedrockruntime)
//! ```

pub mod bedrock;
pub mod openrouter;
pub mod pricing;

use crate::error::ModelError;
use async_trait::async_trait;
use edgequake_llm::ImageData;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::warn;

pub use bedrock::BedrockClient;
pub use openrouter::OpenRouterClient;

/// A single-turn completion request.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Page images for vision models (OCR fallback).
    pub images: Vec<ImageData>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.1,
            max_tokens: 4000,
            ..Default::default()
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn images(mut self, images: Vec<ImageData>) -> Self {
        self.images = images;
        self
    }
}

/// The model's answer plus token accounting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub stop_reason: Option<String>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError>;
}

// ── Routing ──────────────────────────────────────────────────────────────

/// Cross-region inference profiles.
pub(crate) const BEDROCK_REGION_PREFIXES: [&str; 3] = ["us.", "eu.", "apac."];

/// Vendors whose models Bedrock serves as `vendor.model`.
const BEDROCK_VENDORS: [&str; 6] = ["anthropic", "amazon", "meta", "mistral", "cohere", "ai21"];

/// Dispatch by model id: Bedrock ids (`anthropic.claude-…`,
/// `us.anthropic.…`) go to Bedrock, everything else to OpenRouter.
pub struct ModelRouter {
    openrouter: Option<Arc<dyn ModelClient>>,
    bedrock: Option<Arc<dyn ModelClient>>,
}

impl ModelRouter {
    pub fn new(
        openrouter: Option<Arc<dyn ModelClient>>,
        bedrock: Option<Arc<dyn ModelClient>>,
    ) -> Self {
        Self { openrouter, bedrock }
    }

    /// A Bedrock id starts with a vendor, optionally behind a cross-region
    /// inference prefix. Anything else goes to OpenRouter.
    pub fn is_bedrock_model(model: &str) -> bool {
        let unprefixed = BEDROCK_REGION_PREFIXES
            .iter()
            .find_map(|p| model.strip_prefix(p))
            .unwrap_or(model);
        BEDROCK_VENDORS.iter().any(|v| {
            unprefixed
                .strip_prefix(v)
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

#[async_trait]
impl ModelClient for ModelRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError> {
        let (backend, provider) = if Self::is_bedrock_model(&request.model) {
            (self.bedrock.as_ref(), "bedrock")
        } else {
            (self.openrouter.as_ref(), "openrouter")
        };
        match backend {
            Some(client) => client.complete(request).await,
            None => Err(ModelError::NotConfigured {
                provider: provider.to_string(),
                hint: format!("no {provider} client available for model '{}'", request.model),
            }),
        }
    }
}

// ── Concurrency gate ─────────────────────────────────────────────────────

/// Caps in-flight calls with a semaphore and bounds each call with a timeout.
pub struct GatedClient {
    inner: Arc<dyn ModelClient>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl GatedClient {
    pub fn new(inner: Arc<dyn ModelClient>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }
}

#[async_trait]
impl ModelClient for GatedClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ModelError::Provider {
                message: format!("concurrency gate closed: {e}"),
            })?;
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{}: call to {} timed out after {:?}", self.inner.name(), request.model, self.timeout);
                Err(ModelError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

// ── Retry ────────────────────────────────────────────────────────────────

/// Exponential backoff: attempt `n` (1-based retry) waits
/// `base * 2^(n-1)`, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Errors worth another attempt.
    pub retry_on: fn(&ModelError) -> bool,
}

impl RetryPolicy {
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            retry_on: ModelError::is_transient,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err: Option<ModelError> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let backoff = policy.backoff(attempt);
            warn!("{}: retry {}/{} after {:?}", label, attempt, attempts - 1, backoff);
            sleep(backoff).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if (policy.retry_on)(&e) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| ModelError::Provider {
        message: format!("{label}: no attempts made"),
    }))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory client for unit tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued results in order, then repeats the fallback.
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<Completion, ModelError>>>,
        fallback: Result<Completion, ModelError>,
        pub requests: Mutex<Vec<ModelRequest>>,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Result<Completion, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                fallback: Err(ModelError::Provider {
                    message: "script exhausted".into(),
                }),
                requests: Mutex::new(Vec::new()),
            })
        }

        /// Always answer `text`.
        pub fn always(text: &str) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: Ok(reply(text)),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(err: ModelError) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: Err(err),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    pub fn reply(text: &str) -> Completion {
        Completion {
            text: text.to_string(),
            input_tokens: 100,
            output_tokens: 50,
            stop_reason: Some("end_turn".into()),
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            retry_on: ModelError::is_transient,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_secs(1));
        assert_eq!(p.backoff(2), Duration::from_secs(2));
        assert_eq!(p.backoff(3), Duration::from_secs(4));
        assert_eq!(p.backoff(6), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_errors() {
        let client = ScriptedClient::new(vec![
            Err(ModelError::Timeout { secs: 1 }),
            Err(ModelError::RateLimited { provider: "x".into() }),
            Ok(reply("{}")),
        ]);
        let req = ModelRequest::new("m", "p");
        let out = retry_with_backoff(&fast_policy(), "test", || client.complete(&req))
            .await
            .unwrap();
        assert_eq!(out.text, "{}");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn retry_stops_on_permanent_error() {
        let client = ScriptedClient::new(vec![Err(ModelError::Unsupported { model: "m".into() })]);
        let req = ModelRequest::new("m", "p");
        let err = retry_with_backoff(&fast_policy(), "test", || client.complete(&req))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Unsupported { .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let client = ScriptedClient::failing(ModelError::Timeout { secs: 2 });
        let req = ModelRequest::new("m", "p");
        let err = retry_with_backoff(&fast_policy(), "test", || client.complete(&req))
            .await
            .unwrap_err();
        assert_eq!(err, ModelError::Timeout { secs: 2 });
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn router_dispatches_by_model_id() {
        let openrouter = ScriptedClient::always("from openrouter");
        let bedrock = ScriptedClient::always("from bedrock");
        let router = ModelRouter::new(Some(openrouter.clone()), Some(bedrock.clone()));

        let a = router.complete(&ModelRequest::new("openai/gpt-4o", "p")).await.unwrap();
        let b = router
            .complete(&ModelRequest::new("us.anthropic.claude-3-5-haiku-20241022-v1:0", "p"))
            .await
            .unwrap();
        assert_eq!(a.text, "from openrouter");
        assert_eq!(b.text, "from bedrock");
    }

    #[test]
    fn bedrock_ids_need_a_known_vendor() {
        assert!(ModelRouter::is_bedrock_model("anthropic.claude-3-haiku-20240307-v1:0"));
        assert!(ModelRouter::is_bedrock_model("us.anthropic.claude-3-5-haiku-20241022-v1:0"));
        assert!(ModelRouter::is_bedrock_model("eu.meta.llama3-2-3b-instruct-v1:0"));
        assert!(ModelRouter::is_bedrock_model("mistral.mistral-large-2402-v1:0"));
        assert!(!ModelRouter::is_bedrock_model("openai/gpt-4.1"));
        assert!(!ModelRouter::is_bedrock_model("gpt-4.1"));
        assert!(!ModelRouter::is_bedrock_model("gemini-2.0-flash-001"));
        assert!(!ModelRouter::is_bedrock_model("anthropicx.model"));
    }

    #[tokio::test]
    async fn dotted_openrouter_shorthand_is_not_sent_to_bedrock() {
        let openrouter = ScriptedClient::always("from openrouter");
        let bedrock = ScriptedClient::always("from bedrock");
        let router = ModelRouter::new(Some(openrouter.clone()), Some(bedrock.clone()));
        let out = router.complete(&ModelRequest::new("gpt-4.1", "p")).await.unwrap();
        assert_eq!(out.text, "from openrouter");
        assert_eq!(bedrock.calls(), 0);
    }

    #[tokio::test]
    async fn router_without_backend_is_not_configured() {
        let router = ModelRouter::new(None, None);
        let err = router.complete(&ModelRequest::new("openai/gpt-4o", "p")).await.unwrap_err();
        assert!(matches!(err, ModelError::NotConfigured { .. }));
    }

    struct SlowClient;

    #[async_trait]
    impl ModelClient for SlowClient {
        fn name(&self) -> &str {
            "slow"
        }
        async fn complete(&self, _: &ModelRequest) -> Result<Completion, ModelError> {
            sleep(Duration::from_secs(5)).await;
            Ok(Completion::default())
        }
    }

    #[tokio::test]
    async fn gate_times_out_slow_calls() {
        let gated = GatedClient::new(Arc::new(SlowClient), 1, Duration::from_millis(20));
        let err = gated.complete(&ModelRequest::new("m", "p")).await.unwrap_err();
        assert!(matches!(err, ModelError::Timeout { .. }));
    }

    /// Records how many calls overlap.
    #[derive(Default)]
    struct CountingClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for CountingClient {
        fn name(&self) -> &str {
            "counting"
        }
        async fn complete(&self, _: &ModelRequest) -> Result<Completion, ModelError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Completion::default())
        }
    }

    #[tokio::test]
    async fn gate_caps_calls_in_flight() {
        let inner = Arc::new(CountingClient::default());
        let gated = GatedClient::new(inner.clone(), 2, Duration::from_secs(5));
        let req = ModelRequest::new("m", "p");

        let results = futures::future::join_all((0..6).map(|_| gated.complete(&req))).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(inner.peak.load(Ordering::SeqCst), 2);
        assert_eq!(inner.in_flight.load(Ordering::SeqCst), 0);
    }
}

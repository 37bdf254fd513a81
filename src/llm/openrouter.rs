//! OpenRouter access through edgequake-llm.
//!
//! One `openrouter` provider is created per model id on first use and cached.
//! The provider reads `OPENROUTER_API_KEY` from the environment.

use super::{retry_with_backoff, Completion, ModelClient, ModelRequest, RetryPolicy};
use crate::error::ModelError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-call budget, matching the HTTP client timeout.
const CALL_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_PREFIX: &str = "Failed to connect to AI service";

pub struct OpenRouterClient {
    providers: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
    retry: RetryPolicy,
}

impl Default for OpenRouterClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenRouterClient {
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(HashMap::new()),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(4),
                retry_on: is_retryable,
            },
        }
    }

    fn provider(&self, model: &str) -> Result<Arc<dyn LLMProvider>, ModelError> {
        let mut cache = self.providers.lock().map_err(|_| ModelError::Provider {
            message: "provider cache poisoned".into(),
        })?;
        if let Some(p) = cache.get(model) {
            return Ok(Arc::clone(p));
        }
        let provider = ProviderFactory::create_llm_provider("openrouter", model).map_err(|e| {
            ModelError::NotConfigured {
                provider: "openrouter".to_string(),
                hint: format!("{e}"),
            }
        })?;
        cache.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    async fn call_once(
        &self,
        provider: &Arc<dyn LLMProvider>,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, ModelError> {
        let response = tokio::time::timeout(CALL_TIMEOUT, provider.chat(messages, Some(options)))
            .await
            .map_err(|_| ModelError::Timeout {
                secs: CALL_TIMEOUT.as_secs(),
            })?
            .map_err(|e| classify_error(&format!("{e}")))?;

        Ok(Completion {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
            stop_reason: None,
        })
    }
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError> {
        let provider = self.provider(&request.model)?;
        let messages = build_messages(request);
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let start = Instant::now();
        let label = format!("openrouter {}", request.model);
        let completion = retry_with_backoff(&self.retry, &label, || {
            self.call_once(&provider, &messages, &options)
        })
        .await?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            label,
            completion.input_tokens,
            completion.output_tokens,
            start.elapsed()
        );
        Ok(completion)
    }
}

fn build_messages(request: &ModelRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system.as_deref() {
        messages.push(ChatMessage::system(system));
    }
    if request.images.is_empty() {
        messages.push(ChatMessage::user(request.prompt.as_str()));
    } else {
        messages.push(ChatMessage::user_with_images(
            request.prompt.as_str(),
            request.images.clone(),
        ));
    }
    messages
}

/// Map provider error text onto a [`ModelError`].
fn classify_error(message: &str) -> ModelError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        ModelError::RateLimited {
            provider: "AI service".to_string(),
        }
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ModelError::Timeout {
            secs: CALL_TIMEOUT.as_secs(),
        }
    } else if lower.contains("connect") || lower.contains("network") || lower.contains("dns") {
        ModelError::Provider {
            message: format!("{CONNECT_PREFIX}: {message}"),
        }
    } else {
        ModelError::Provider {
            message: format!("AI service error: {message}"),
        }
    }
}

/// Only timeouts and connection failures are retried; API errors and rate
/// limits surface immediately.
fn is_retryable(e: &ModelError) -> bool {
    match e {
        ModelError::Timeout { .. } => true,
        ModelError::Provider { message } => message.starts_with(CONNECT_PREFIX),
        _ => false,
    }
}

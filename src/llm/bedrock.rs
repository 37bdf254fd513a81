//! AWS Bedrock access through `invoke_model`.
//!
//! Bedrock has no common chat format: each model family takes its own JSON
//! body and answers in its own shape. [`build_request_body`] and
//! [`parse_response_body`] hold those per-family rules; the client only
//! sends bytes and maps SDK errors.

use super::{
    retry_with_backoff, Completion, ModelClient, ModelRequest, RetryPolicy, BEDROCK_REGION_PREFIXES,
};
use crate::error::ModelError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::operation::invoke_model::InvokeModelError;
use aws_sdk_bedrockruntime::Client;
use aws_smithy_types::Blob;
use serde_json::{json, Value};
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Reported when Bedrock itself times out.
const MODEL_TIMEOUT_SECS: u64 = 120;

/// Llama's `max_gen_len` ceiling.
const META_MAX_GEN_LEN: usize = 8192;

/// Model family behind a Bedrock id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedrockProvider {
    Anthropic,
    Meta,
    Mistral,
}

/// `us.anthropic.claude…` → anthropic, `meta.llama…` → meta.
pub fn provider_of(model_id: &str) -> Result<BedrockProvider, ModelError> {
    let unprefixed = BEDROCK_REGION_PREFIXES
        .iter()
        .find_map(|p| model_id.strip_prefix(p))
        .unwrap_or(model_id);
    let family = unprefixed.split('.').next().unwrap_or(unprefixed);
    match family {
        "anthropic" => Ok(BedrockProvider::Anthropic),
        "meta" => Ok(BedrockProvider::Meta),
        "mistral" => Ok(BedrockProvider::Mistral),
        _ => Err(ModelError::Unsupported {
            model: model_id.to_string(),
        }),
    }
}

pub fn build_request_body(request: &ModelRequest) -> Result<Value, ModelError> {
    let system = request.system.as_deref().unwrap_or("");
    let body = match provider_of(&request.model)? {
        BedrockProvider::Anthropic => {
            let mut body = json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "messages": [{"role": "user", "content": request.prompt}],
            });
            if !system.is_empty() {
                body["system"] = json!(system);
            }
            body
        }
        BedrockProvider::Meta => json!({
            "prompt": format!(
                "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{system}<|eot_id|>\
                 <|start_header_id|>user<|end_header_id|>\n\n{}<|eot_id|>\
                 <|start_header_id|>assistant<|end_header_id|>\n\n",
                request.prompt
            ),
            "max_gen_len": request.max_tokens.min(META_MAX_GEN_LEN),
            "temperature": request.temperature,
            "top_p": 0.9,
        }),
        BedrockProvider::Mistral => {
            let prompt = if system.is_empty() {
                request.prompt.clone()
            } else {
                format!("{system}\n\n{}", request.prompt)
            };
            json!({
                "prompt": prompt,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "top_p": 0.9,
            })
        }
    };
    Ok(body)
}

/// Pull text, token usage and stop reason out of a family-specific answer.
pub fn parse_response_body(model_id: &str, body: &Value) -> Result<Completion, ModelError> {
    let missing = |key: &str| ModelError::InvalidOutput {
        detail: format!("Failed to parse model response: missing expected key '{key}'"),
    };
    let count = |v: &Value| v.as_u64().unwrap_or(0) as usize;

    match provider_of(model_id)? {
        BedrockProvider::Anthropic => {
            let text = body["content"][0]["text"]
                .as_str()
                .ok_or_else(|| missing("content"))?;
            Ok(Completion {
                text: text.to_string(),
                input_tokens: count(&body["usage"]["input_tokens"]),
                output_tokens: count(&body["usage"]["output_tokens"]),
                stop_reason: body["stop_reason"].as_str().map(String::from),
            })
        }
        BedrockProvider::Meta => {
            let text = body["generation"]
                .as_str()
                .ok_or_else(|| missing("generation"))?;
            Ok(Completion {
                text: text.to_string(),
                input_tokens: count(&body["prompt_token_count"]),
                output_tokens: count(&body["generation_token_count"]),
                stop_reason: body["stop_reason"].as_str().map(String::from),
            })
        }
        BedrockProvider::Mistral => {
            let output = &body["outputs"][0];
            let text = output["text"].as_str().ok_or_else(|| missing("outputs"))?;
            Ok(Completion {
                text: text.to_string(),
                input_tokens: count(&body["prompt_token_count"]),
                output_tokens: count(&body["generation_token_count"]),
                stop_reason: output["stop_reason"].as_str().map(String::from),
            })
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────

pub struct BedrockClient {
    client: Client,
    retry: RetryPolicy,
}

impl BedrockClient {
    /// Load credentials from the default AWS chain (env, profile, IAM role).
    pub async fn from_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        info!("Bedrock client initialized for region: {}", region);
        Self::new(Client::new(&config))
    }

    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(10),
                retry_on: is_retryable,
            },
        }
    }

    async fn invoke_once(&self, model_id: &str, body: &[u8]) -> Result<Completion, ModelError> {
        let output = self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body.to_vec()))
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let value: Value =
            serde_json::from_slice(output.body().as_ref()).map_err(|e| ModelError::InvalidOutput {
                detail: format!("Bedrock returned non-JSON body: {e}"),
            })?;
        parse_response_body(model_id, &value)
    }
}

#[async_trait]
impl ModelClient for BedrockClient {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError> {
        if !request.images.is_empty() {
            warn!("Bedrock client ignores {} attached images", request.images.len());
        }
        let body = serde_json::to_vec(&build_request_body(request)?).map_err(|e| {
            ModelError::Provider {
                message: format!("failed to encode Bedrock request: {e}"),
            }
        })?;

        let start = Instant::now();
        let label = format!("bedrock {}", request.model);
        let completion =
            retry_with_backoff(&self.retry, &label, || self.invoke_once(&request.model, &body))
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

fn classify_sdk_error<R: Debug + Send + Sync + 'static>(err: SdkError<InvokeModelError, R>) -> ModelError {
    if let SdkError::TimeoutError(_) = err {
        return ModelError::Timeout {
            secs: MODEL_TIMEOUT_SECS,
        };
    }
    if let SdkError::DispatchFailure(ref failure) = err {
        if failure.is_timeout() {
            return ModelError::Timeout {
                secs: MODEL_TIMEOUT_SECS,
            };
        }
    }

    let service = err.into_service_error();
    match &service {
        InvokeModelError::ThrottlingException(_) | InvokeModelError::ServiceUnavailableException(_) => {
            warn!("Bedrock throttled: {}", service.code().unwrap_or("ThrottlingException"));
            ModelError::RateLimited {
                provider: "AWS Bedrock".to_string(),
            }
        }
        InvokeModelError::ModelTimeoutException(_) => ModelError::Timeout {
            secs: MODEL_TIMEOUT_SECS,
        },
        InvokeModelError::AccessDeniedException(e) => ModelError::AccessDenied {
            detail: e.message().unwrap_or("access denied").to_string(),
        },
        other => {
            let code = other.code().unwrap_or("Unknown");
            error!("Bedrock error {}: {}", code, other.message().unwrap_or(""));
            ModelError::Provider {
                message: format!("AWS Bedrock error: {code}"),
            }
        }
    }
}

/// Throttling and timeouts are retried; everything else fails fast.
fn is_retryable(e: &ModelError) -> bool {
    matches!(e, ModelError::RateLimited { .. } | ModelError::Timeout { .. })
}

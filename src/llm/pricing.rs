//! Token prices and the `/models` catalogue.

use crate::config::{has_native_search, ALL_MODELS};
use crate::models::ModelInfo;
use std::collections::BTreeMap;
use tracing::warn;

/// USD per 1M tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Price {
    pub input: f64,
    pub output: f64,
}

const fn price(input: f64, output: f64) -> Price {
    Price { input, output }
}

/// Charged for OpenRouter models missing from the table.
const DEFAULT_PRICE: Price = price(1.0, 1.0);

static OPENROUTER_PRICES: &[(&str, Price)] = &[
    ("perplexity/sonar-pro", price(3.0, 15.0)),
    ("perplexity/sonar", price(1.0, 1.0)),
    ("perplexity/sonar-reasoning", price(1.0, 5.0)),
    ("anthropic/claude-sonnet-4.5", price(3.0, 15.0)),
    ("anthropic/claude-3.7-sonnet", price(3.0, 15.0)),
    ("anthropic/claude-opus-4", price(15.0, 75.0)),
    ("openai/gpt-5", price(5.0, 15.0)),
    ("openai/gpt-5-mini", price(0.15, 0.6)),
    ("openai/gpt-4o", price(2.5, 10.0)),
    ("google/gemini-2.5-flash-preview-09-2025", price(0.075, 0.3)),
    ("google/gemini-2.5-flash-lite", price(0.04, 0.15)),
    ("meta-llama/llama-4-scout", price(0.2, 0.2)),
    ("meta-llama/llama-3.3-8b-instruct:free", price(0.0, 0.0)),
    ("mistralai/mistral-medium-3.1", price(0.7, 2.1)),
    ("mistralai/devstral-medium", price(0.5, 1.5)),
    ("deepseek/deepseek-v3.2-exp", price(0.14, 0.28)),
    ("deepseek/deepseek-chat-v3.1:free", price(0.0, 0.0)),
    ("qwen/qwen3-max", price(0.8, 0.8)),
    ("qwen/qwen3-coder-plus", price(0.3, 0.3)),
];

static BEDROCK_PRICES: &[(&str, Price)] = &[
    ("anthropic.claude-3-5-sonnet-20241022-v2:0", price(3.0, 15.0)),
    ("anthropic.claude-3-5-sonnet-20240620-v1:0", price(3.0, 15.0)),
    ("anthropic.claude-3-opus-20240229-v1:0", price(15.0, 75.0)),
    ("anthropic.claude-3-haiku-20240307-v1:0", price(0.25, 1.25)),
    ("us.anthropic.claude-3-5-haiku-20241022-v1:0", price(0.80, 4.0)),
    ("meta.llama3-1-405b-instruct-v1:0", price(0.00532, 0.016)),
    ("meta.llama3-1-70b-instruct-v1:0", price(0.00099, 0.00099)),
    ("meta.llama3-1-8b-instruct-v1:0", price(0.00022, 0.00022)),
    ("mistral.mistral-large-2407-v1:0", price(3.0, 9.0)),
    ("mistral.mistral-small-2402-v1:0", price(0.2, 0.6)),
];

fn lookup(table: &[(&str, Price)], model: &str) -> Option<Price> {
    table.iter().find(|(id, _)| *id == model).map(|(_, p)| *p)
}

fn cost(p: Price, input_tokens: usize, output_tokens: usize) -> f64 {
    (input_tokens as f64 / 1_000_000.0) * p.input + (output_tokens as f64 / 1_000_000.0) * p.output
}

/// Cost of an OpenRouter call. Unknown models are billed at $1/$1.
pub fn openrouter_cost(model: &str, input_tokens: usize, output_tokens: usize) -> f64 {
    let p = lookup(OPENROUTER_PRICES, model).unwrap_or_else(|| {
        warn!("No pricing info for {}, using default", model);
        DEFAULT_PRICE
    });
    cost(p, input_tokens, output_tokens)
}

/// Cost of a Bedrock call. Unknown models cost nothing.
pub fn bedrock_cost(model: &str, input_tokens: usize, output_tokens: usize) -> f64 {
    match lookup(BEDROCK_PRICES, model) {
        Some(p) => cost(p, input_tokens, output_tokens),
        None => {
            warn!("No pricing info for model: {}", model);
            0.0
        }
    }
}

/// Cost of any call, routed by model id shape.
pub fn estimate_cost(model: &str, input_tokens: usize, output_tokens: usize) -> f64 {
    if super::ModelRouter::is_bedrock_model(model) {
        bedrock_cost(model, input_tokens, output_tokens)
    } else {
        openrouter_cost(model, input_tokens, output_tokens)
    }
}

/// Lease extraction estimate: Haiku pricing unless the model is a Sonnet.
/// Rounded to 4 decimal places.
pub fn lease_cost(model: &str, input_tokens: usize, output_tokens: usize) -> f64 {
    let p = if model.to_lowercase().contains("sonnet") {
        price(3.0, 15.0)
    } else {
        price(0.80, 4.0)
    };
    (cost(p, input_tokens, output_tokens) * 10_000.0).round() / 10_000.0
}

// ── Catalogue ────────────────────────────────────────────────────────────

pub fn model_info(model: &str) -> ModelInfo {
    let p = lookup(OPENROUTER_PRICES, model).unwrap_or(price(0.0, 0.0));
    let mut estimated = BTreeMap::new();
    estimated.insert("input".to_string(), p.input);
    estimated.insert("output".to_string(), p.output);

    ModelInfo {
        model_id: model.to_string(),
        name: model.rsplit('/').next().unwrap_or(model).to_string(),
        provider: model.split('/').next().unwrap_or(model).to_string(),
        has_native_search: has_native_search(model),
        estimated_cost_per_1k_tokens: estimated,
        context_length: if model.contains("128k") { 128_000 } else { 32_000 },
    }
}

/// Native-search models first, then the rest, each in catalogue order.
pub fn available_models() -> Vec<ModelInfo> {
    let (native, other): (Vec<&str>, Vec<&str>) =
        ALL_MODELS.iter().copied().partition(|m| has_native_search(m));
    native.into_iter().chain(other).map(model_info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn openrouter_cost_per_million() {
        assert!(approx(openrouter_cost("openai/gpt-4o", 1_000_000, 1_000_000), 12.5));
        assert!(approx(openrouter_cost("qwen/qwen3-max", 500_000, 0), 0.4));
        assert_eq!(openrouter_cost("deepseek/deepseek-chat-v3.1:free", 9_999, 9_999), 0.0);
    }

    #[test]
    fn unknown_openrouter_model_uses_default_price() {
        assert!(approx(openrouter_cost("acme/unknown", 1_000_000, 1_000_000), 2.0));
    }

    #[test]
    fn bedrock_unknown_model_is_free() {
        assert_eq!(bedrock_cost("amazon.titan-text", 1_000_000, 1_000_000), 0.0);
        assert!(approx(
            bedrock_cost("us.anthropic.claude-3-5-haiku-20241022-v1:0", 1_000_000, 0),
            0.80
        ));
    }

    #[test]
    fn estimate_routes_by_id_shape() {
        assert!(approx(
            estimate_cost("mistral.mistral-large-2407-v1:0", 0, 1_000_000),
            9.0
        ));
        assert!(approx(estimate_cost("openai/gpt-5", 1_000_000, 0), 5.0));
    }

    #[test]
    fn lease_cost_rounds_to_four_places() {
        // 12_345 * 0.8e-6 + 6_789 * 4e-6 = 0.009876 + 0.027156
        assert_eq!(lease_cost("us.anthropic.claude-3-5-haiku-20241022-v1:0", 12_345, 6_789), 0.037);
        assert_eq!(lease_cost("anthropic.claude-3-5-sonnet-20241022-v2:0", 1_000_000, 0), 3.0);
    }

    #[test]
    fn model_info_splits_id() {
        let info = model_info("perplexity/sonar-pro");
        assert_eq!(info.name, "sonar-pro");
        assert_eq!(info.provider, "perplexity");
        assert!(info.has_native_search);
        assert_eq!(info.context_length, 32_000);
        assert_eq!(info.estimated_cost_per_1k_tokens["output"], 15.0);
    }

    #[test]
    fn catalogue_lists_native_search_first() {
        let models = available_models();
        assert_eq!(models.len(), ALL_MODELS.len());
        assert!(models[..3].iter().all(|m| m.has_native_search));
        assert!(models[3..].iter().all(|m| !m.has_native_search));
    }
}

//! Violation analysis: one lease, one or many models.
//!
//! ```text
//! PDF ──▶ text ──▶ regex facts ──┬──────────────────────────────▶ prompt ──▶ model ──▶ violations
//!                                └─▶ topics ──▶ DuckDuckGo ──────┘ (duckduckgo_search only)
//! ```
//!
//! Inside a comparison a model that fails yields a result with `error` set so
//! the other models still complete. A single-model request fails outright.

pub mod compare;
pub mod parse;

use crate::config::{provider_models, CATEGORIZED_MODEL};
use crate::error::{LeaseAiError, ModelError};
use crate::lease_info::parse_lease_info;
use crate::llm::pricing::estimate_cost;
use crate::llm::{Completion, ModelClient, ModelRequest};
use crate::models::{
    AnalysisMetrics, AnalysisResult, CategorizedAnalysisResult, ComparisonResult, LeaseInfo,
    LeaseLocation, SearchStrategy, TokenUsage, Violation,
};
use crate::pipeline::postprocess::{brace_slice, extract_json_object, sanitize_control_chars};
use crate::pipeline::text::{lease_text, PageSource, PdfiumText};
use crate::prompts;
use crate::search::{extract_legal_topics, SearchResult, WebSearcher};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub use compare::{best_models, comparison_summary, BestModels};

/// Topics searched for the DuckDuckGo strategy.
const SEARCH_TOPICS: usize = 5;
/// Results kept per topic.
const RESULTS_PER_TOPIC: usize = 3;

const ANALYSIS_TEMPERATURE: f32 = 0.1;
const CATEGORIZED_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: usize = 4000;

pub struct Analyzer {
    client: Arc<dyn ModelClient>,
    searcher: WebSearcher,
    pages: Arc<dyn PageSource>,
    pdf_timeout: Duration,
    concurrency: usize,
    search_limit: usize,
}

impl Analyzer {
    pub fn new(client: Arc<dyn ModelClient>, searcher: WebSearcher) -> Self {
        Self {
            client,
            searcher,
            pages: Arc::new(PdfiumText),
            pdf_timeout: Duration::from_secs(30),
            concurrency: 5,
            search_limit: 10,
        }
    }

    pub fn with_page_source(mut self, pages: Arc<dyn PageSource>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_pdf_timeout(mut self, timeout: Duration) -> Self {
        self.pdf_timeout = timeout;
        self
    }

    /// Models analysed at once during a comparison.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Cap on law search results placed in one prompt.
    pub fn with_search_limit(mut self, n: usize) -> Self {
        self.search_limit = n;
        self
    }

    /// Text plus regex facts for an uploaded lease.
    pub async fn read_lease(&self, bytes: Vec<u8>) -> Result<LeaseInfo, LeaseAiError> {
        let pages = self.pages.pages(bytes, self.pdf_timeout).await?;
        let extracted = lease_text(&pages)?;
        Ok(parse_lease_info(&extracted.full_text))
    }

    // ── Single model ─────────────────────────────────────────────────────

    /// One model on one upload. A failed model call is an error for the
    /// whole request; unparseable output is not.
    pub async fn analyze_single(
        &self,
        bytes: Vec<u8>,
        model: &str,
        strategy: SearchStrategy,
    ) -> Result<AnalysisResult, LeaseAiError> {
        let info = self.read_lease(bytes).await?;
        self.try_analyze_lease(info, model, strategy).await.map_err(|e| {
            error!("Error analyzing with {}: {}", model, e);
            LeaseAiError::from(e)
        })
    }

    /// Analyse already-extracted lease text. Model failures are reported in
    /// the result's `error` field.
    pub async fn analyze_lease(&self, mut info: LeaseInfo, model: &str, strategy: SearchStrategy) -> AnalysisResult {
        let started = Instant::now();
        match self.run_analysis(&mut info, model, strategy).await {
            Ok((violations, metrics)) => AnalysisResult {
                model_name: model.to_string(),
                search_strategy: strategy,
                lease_info: info,
                violations,
                metrics,
                timestamp: Utc::now(),
                error: None,
            },
            Err(e) => {
                error!("Error analyzing with {}: {}", model, e);
                AnalysisResult {
                    model_name: model.to_string(),
                    search_strategy: strategy,
                    lease_info: info,
                    violations: Vec::new(),
                    metrics: AnalysisMetrics::empty(model, strategy, started.elapsed().as_secs_f64()),
                    timestamp: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// [`analyze_lease`](Self::analyze_lease) with the model failure returned.
    pub async fn try_analyze_lease(
        &self,
        mut info: LeaseInfo,
        model: &str,
        strategy: SearchStrategy,
    ) -> Result<AnalysisResult, ModelError> {
        let (violations, metrics) = self.run_analysis(&mut info, model, strategy).await?;
        Ok(AnalysisResult {
            model_name: model.to_string(),
            search_strategy: strategy,
            lease_info: info,
            violations,
            metrics,
            timestamp: Utc::now(),
            error: None,
        })
    }

    /// Prompt, call, parse. Model facts are merged into `info`.
    async fn run_analysis(
        &self,
        info: &mut LeaseInfo,
        model: &str,
        strategy: SearchStrategy,
    ) -> Result<(Vec<Violation>, AnalysisMetrics), ModelError> {
        let started = Instant::now();
        let prompt = match strategy {
            SearchStrategy::NativeSearch => prompts::native_search_analysis_prompt(&info.full_text),
            SearchStrategy::DuckDuckGo => {
                let results = self.gather_search_results(info).await;
                prompts::search_results_analysis_prompt(&info.full_text, &results)
            }
        };
        let request = ModelRequest::new(model, prompt)
            .system(prompts::ANALYSIS_SYSTEM_PROMPT)
            .temperature(ANALYSIS_TEMPERATURE)
            .max_tokens(ANALYSIS_MAX_TOKENS);

        let completion = self.client.complete(&request).await?;

        let parsed = match extract_json_object(&completion.text) {
            Some(data) => parse::parse_analysis(&data),
            None => {
                error!("{}: no JSON in analysis answer ({} chars)", model, completion.text.len());
                parse::ParsedAnalysis::default()
            }
        };
        if let Some(facts) = &parsed.lease_facts {
            parse::apply_lease_facts(info, facts);
        }

        let metrics = parse::compute_metrics(
            model,
            strategy,
            parsed
                .violations
                .iter()
                .map(|v| (v.citations.as_slice(), v.confidence_score)),
            started.elapsed().as_secs_f64(),
            usage(&completion),
            estimate_cost(model, completion.input_tokens, completion.output_tokens),
        );
        info!(
            "{}: {} violations, {} .gov citations in {:.2}s",
            model, metrics.violations_found, metrics.gov_citations_count, metrics.total_time_seconds
        );
        Ok((parsed.violations, metrics))
    }

    /// Results for the top topics of the lease, in topic order.
    async fn gather_search_results(&self, info: &LeaseInfo) -> Vec<SearchResult> {
        let location = LeaseLocation::from_info(info);
        let topics: Vec<String> = extract_legal_topics(&info.full_text)
            .into_iter()
            .take(SEARCH_TOPICS)
            .collect();
        debug!("Searching {} topics for {}", topics.len(), location.full_location);
        self.searcher
            .search_topics(&topics, &location, RESULTS_PER_TOPIC)
            .await
            .into_iter()
            .flat_map(|(_, results)| results)
            .take(self.search_limit)
            .collect()
    }

    // ── Comparison ───────────────────────────────────────────────────────

    pub async fn compare_models(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        models: &[&str],
    ) -> Result<ComparisonResult, LeaseAiError> {
        let info = self.read_lease(bytes).await?;
        Ok(self.compare_lease(info, filename, models).await)
    }

    /// Every model with native search, `concurrency` at a time. Results keep
    /// the order of `models`.
    pub async fn compare_lease(&self, info: LeaseInfo, filename: &str, models: &[&str]) -> ComparisonResult {
        info!("Starting comparison of {} models for {}", models.len(), filename);
        let info = &info;
        let mut indexed: Vec<(usize, AnalysisResult)> = stream::iter(models.iter().enumerate())
            .map(|(i, model)| async move {
                let mut result = self
                    .analyze_lease(info.clone(), model, SearchStrategy::NativeSearch)
                    .await;
                result.lease_info.full_text.clear();
                (i, result)
            })
            .buffer_unordered(self.concurrency)
            .boxed()
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        let results: Vec<AnalysisResult> = indexed.into_iter().map(|(_, r)| r).collect();

        let lease_location = results
            .iter()
            .find(|r| r.error.is_none())
            .map(|r| LeaseLocation::from_info(&r.lease_info));
        if let Some(location) = &lease_location {
            info!("Extracted lease location: {}", location.full_location);
        }
        let best = best_models(&results);
        let summary = comparison_summary(&results);

        ComparisonResult {
            lease_file_name: filename.to_string(),
            lease_location,
            total_models_tested: results.len(),
            best_by_cost: best.by_cost,
            best_by_time: best.by_time,
            best_by_citations: best.by_citations,
            best_overall: best.overall,
            comparison_summary: Some(summary),
            results,
            timestamp: Utc::now(),
        }
    }

    /// Comparison over one provider's models.
    pub async fn analyze_provider(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        provider: &str,
    ) -> Result<ComparisonResult, LeaseAiError> {
        let models = provider_models(provider)?;
        self.compare_models(bytes, filename, &models).await
    }

    // ── Categorized ──────────────────────────────────────────────────────

    pub async fn analyze_categorized(&self, bytes: Vec<u8>) -> Result<CategorizedAnalysisResult, LeaseAiError> {
        let info = self.read_lease(bytes).await?;
        Ok(self.categorize_lease(info).await)
    }

    pub async fn categorize_lease(&self, mut info: LeaseInfo) -> CategorizedAnalysisResult {
        let model = CATEGORIZED_MODEL;
        let strategy = SearchStrategy::NativeSearch;
        let started = Instant::now();
        let request = ModelRequest::new(model, prompts::categorized_analysis_prompt(&info.full_text))
            .system(prompts::CATEGORIZED_SYSTEM_PROMPT)
            .temperature(CATEGORIZED_TEMPERATURE)
            .max_tokens(ANALYSIS_MAX_TOKENS);
        info.full_text.clear();

        let completion = match self.client.complete(&request).await {
            Ok(c) => c,
            Err(e) => {
                error!("Error in categorized analysis: {}", e);
                return CategorizedAnalysisResult {
                    model_name: model.to_string(),
                    search_strategy: strategy,
                    lease_info: info,
                    violations_by_category: parse::group_by_category(Vec::new()),
                    total_violations: 0,
                    metrics: AnalysisMetrics::empty(model, strategy, started.elapsed().as_secs_f64()),
                    timestamp: Utc::now(),
                    error: Some(e.to_string()),
                };
            }
        };

        let parsed = match categorized_json(&completion.text) {
            Some(data) => parse::parse_categorized(&data),
            None => {
                error!("No JSON found in categorized answer ({} chars)", completion.text.len());
                parse::ParsedCategorized::default()
            }
        };
        if let Some(facts) = &parsed.lease_facts {
            parse::apply_lease_facts(&mut info, facts);
        } else {
            warn!("No location data extracted by the model");
        }

        let metrics = parse::compute_metrics(
            model,
            strategy,
            parsed
                .violations
                .iter()
                .map(|v| (v.citations.as_slice(), v.confidence_score)),
            started.elapsed().as_secs_f64(),
            usage(&completion),
            estimate_cost(model, completion.input_tokens, completion.output_tokens),
        );
        let total_violations = parsed.violations.len();
        let violations_by_category = parse::group_by_category(parsed.violations);
        for (category, violations) in &violations_by_category {
            if !violations.is_empty() {
                info!("  - {}: {} violation(s)", category, violations.len());
            }
        }

        CategorizedAnalysisResult {
            model_name: model.to_string(),
            search_strategy: strategy,
            lease_info: info,
            violations_by_category,
            total_violations,
            metrics,
            timestamp: Utc::now(),
            error: None,
        }
    }
}

fn usage(c: &Completion) -> TokenUsage {
    TokenUsage::new(c.input_tokens, c.output_tokens)
}

/// First `{` to last `}`; truncated answers go through the general repair.
fn categorized_json(text: &str) -> Option<Value> {
    brace_slice(text)
        .and_then(|slice| serde_json::from_str(&sanitize_control_chars(slice)).ok())
        .or_else(|| extract_json_object(text))
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::llm::testing::{reply, ScriptedClient};
    use crate::search::{SearchBackend, SearchError, SearchHit};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const LEASE: &str = "Landlord: John Smith\nTenant: Jane Doe\n\
        Property: 123 Main Street, Springfield, IL 62701\n\
        Monthly rent: $1,500.00\nSecurity deposit: $3,000\n\
        A late fee of $100 applies. Landlord may enter at any time without notice.";

    const ANSWER: &str = r#"```json
{
  "lease_info": {"city": "Springfield", "state": "IL", "county": "Sangamon"},
  "violations": [
    {"violation_type": "Entry without notice", "description": "No notice before entry",
     "severity": "high", "confidence_score": 0.9, "lease_clause": "Landlord may enter at any time",
     "citations": [{"source_url": "https://www.ilga.gov/legislation", "title": "765 ILCS",
                    "relevant_text": "...", "law_reference": "765 ILCS 705", "is_gov_site": true}]}
  ]
}
```"#;

    struct StubSearch {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchBackend for StubSearch {
        async fn text(&self, query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(vec![SearchHit {
                title: format!("Result for {query}"),
                url: format!("https://law.example.gov/{}", self.queries.lock().unwrap().len()),
                snippet: "statute text".into(),
            }])
        }
    }

    fn analyzer(client: Arc<dyn ModelClient>) -> (Analyzer, Arc<StubSearch>) {
        let search = Arc::new(StubSearch {
            queries: Mutex::new(Vec::new()),
        });
        let analyzer = Analyzer::new(client, WebSearcher::new(search.clone())).with_concurrency(2);
        (analyzer, search)
    }

    fn lease() -> LeaseInfo {
        parse_lease_info(LEASE)
    }

    #[tokio::test]
    async fn native_analysis_parses_violations_and_facts() {
        let client = ScriptedClient::always(ANSWER);
        let (analyzer, search) = analyzer(client.clone());
        let result = analyzer
            .analyze_lease(lease(), "openai/gpt-4o", SearchStrategy::NativeSearch)
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.lease_info.county.as_deref(), Some("Sangamon"));
        assert_eq!(result.lease_info.landlord.as_deref(), Some("John Smith"));
        assert_eq!(result.metrics.gov_citations_count, 1);
        assert!(result.metrics.has_law_references);
        assert_eq!(result.metrics.tokens_used.total, 150);
        assert!(result.metrics.cost_usd > 0.0);
        assert!(search.queries.lock().unwrap().is_empty());

        let request = &client.requests.lock().unwrap()[0];
        assert_eq!(request.temperature, ANALYSIS_TEMPERATURE);
        assert_eq!(request.max_tokens, ANALYSIS_MAX_TOKENS);
    }

    #[tokio::test]
    async fn duckduckgo_strategy_puts_results_in_prompt() {
        let client = ScriptedClient::always(ANSWER);
        let (analyzer, search) = analyzer(client.clone());
        let result = analyzer
            .analyze_lease(lease(), "openai/gpt-4o", SearchStrategy::DuckDuckGo)
            .await;
        assert!(result.error.is_none());

        let queries = search.queries.lock().unwrap();
        assert!(queries[0].starts_with("landlord tenant law Springfield"));
        assert!(queries[0].ends_with("site:.gov"));
        // One gov hit is too few, so every topic also gets the broader query.
        assert_eq!(queries.len(), 2 * SEARCH_TOPICS.min(extract_legal_topics(LEASE).len()));
        let prompt = &client.requests.lock().unwrap()[0].prompt;
        assert!(prompt.contains("RELEVANT LAW SEARCH RESULTS (from DuckDuckGo):"));
        assert!(prompt.contains("1. Result for landlord tenant law"));
    }

    #[tokio::test]
    async fn model_failure_sets_error() {
        let client = ScriptedClient::failing(ModelError::RateLimited {
            provider: "OpenRouter".into(),
        });
        let (analyzer, _) = analyzer(client);
        let result = analyzer
            .analyze_lease(lease(), "openai/gpt-4o", SearchStrategy::NativeSearch)
            .await;
        assert_eq!(result.error.as_deref(), Some("OpenRouter rate limit exceeded"));
        assert!(result.violations.is_empty());
        assert_eq!(result.metrics.cost_usd, 0.0);
        assert_eq!(result.metrics.tokens_used, TokenUsage::default());
    }

    #[tokio::test]
    async fn unparseable_answer_is_not_an_error() {
        let (analyzer, _) = analyzer(ScriptedClient::always("No violations found."));
        let result = analyzer
            .analyze_lease(lease(), "openai/gpt-4o", SearchStrategy::NativeSearch)
            .await;
        assert!(result.error.is_none());
        assert!(result.violations.is_empty());
        assert_eq!(result.metrics.tokens_used.total, 150);
    }

    #[tokio::test]
    async fn comparison_keeps_model_order_and_reports_failures() {
        let client = ScriptedClient::new(vec![
            Ok(reply(ANSWER)),
            Err(ModelError::Timeout { secs: 60 }),
            Ok(reply(ANSWER)),
        ]);
        let (analyzer, _) = analyzer(client);
        let models = ["openai/gpt-4o", "anthropic/claude-3.5-sonnet", "google/gemini-2.0-flash-001"];
        let comparison = analyzer.compare_lease(lease(), "lease.pdf", &models).await;

        assert_eq!(comparison.total_models_tested, 3);
        let names: Vec<_> = comparison.results.iter().map(|r| r.model_name.as_str()).collect();
        assert_eq!(names, models);
        assert!(comparison.results.iter().all(|r| r.lease_info.full_text.is_empty()));
        let failures = comparison.results.iter().filter(|r| r.error.is_some()).count();
        assert_eq!(failures, 1);
        let summary = comparison.comparison_summary.unwrap();
        assert_eq!(summary.successful_analyses, 2);
        assert_eq!(
            comparison.lease_location.unwrap().full_location,
            "Springfield, IL (Sangamon County)"
        );
        assert!(comparison.best_overall.is_some());
    }

    #[tokio::test]
    async fn categorized_analysis_groups_violations() {
        let answer = r#"Sure. {"lease_info": {"state": "IL"}, "violations": [
            {"category": "rent_increase", "violation_type": "Unlimited increases", "confidence_score": 0.8,
             "lease_clause": "Rent may be raised at any time", "recommended_action": "Cap increases"},
            {"category": "licensing", "violation_type": "No license", "confidence_score": 0.6}
        ]} Done."#;
        let client = ScriptedClient::always(answer);
        let (analyzer, _) = analyzer(client.clone());
        let result = analyzer.categorize_lease(lease()).await;

        assert!(result.error.is_none());
        assert_eq!(result.model_name, CATEGORIZED_MODEL);
        assert_eq!(result.total_violations, 2);
        assert_eq!(result.violations_by_category.len(), 5);
        assert_eq!(result.violations_by_category["rent_increase"].len(), 1);
        assert!(result.violations_by_category["others"].is_empty());
        assert!(result.lease_info.full_text.is_empty());
        assert!((result.metrics.avg_confidence_score - 0.7).abs() < 1e-9);

        let request = &client.requests.lock().unwrap()[0];
        assert_eq!(request.model, CATEGORIZED_MODEL);
        assert_eq!(request.temperature, CATEGORIZED_TEMPERATURE);
    }

    struct TextPages;

    #[async_trait]
    impl PageSource for TextPages {
        async fn pages(&self, _bytes: Vec<u8>, _timeout: Duration) -> Result<Vec<String>, LeaseAiError> {
            Ok(vec![LEASE.to_string()])
        }
    }

    #[tokio::test]
    async fn single_analysis_surfaces_model_timeout() {
        let (analyzer, _) = analyzer(ScriptedClient::failing(ModelError::Timeout { secs: 60 }));
        let analyzer = analyzer.with_page_source(Arc::new(TextPages));
        let err = analyzer
            .analyze_single(b"%PDF-1.7".to_vec(), "openai/gpt-4o", SearchStrategy::NativeSearch)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseAiError::AiTimeout { secs: 60 }));
    }

    #[tokio::test]
    async fn single_analysis_tolerates_unparseable_answer() {
        let (analyzer, _) = analyzer(ScriptedClient::always("I could not review this lease."));
        let analyzer = analyzer.with_page_source(Arc::new(TextPages));
        let result = analyzer
            .analyze_single(b"%PDF-1.7".to_vec(), "openai/gpt-4o", SearchStrategy::NativeSearch)
            .await
            .unwrap();
        assert!(result.error.is_none());
        assert!(result.violations.is_empty());
        assert_eq!(result.lease_info.landlord.as_deref(), Some("John Smith"));
    }

    #[tokio::test]
    async fn categorized_failure_keeps_all_categories() {
        let (analyzer, _) = analyzer(ScriptedClient::failing(ModelError::Timeout { secs: 60 }));
        let result = analyzer.categorize_lease(lease()).await;
        assert!(result.error.is_some());
        assert_eq!(result.violations_by_category.len(), 5);
        assert_eq!(result.total_violations, 0);
    }
}

//! Law lookup through DuckDuckGo's HTML endpoint, preferring `.gov` sites.

use crate::models::LeaseLocation;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fewer `.gov` hits than this triggers the broader query.
const MIN_GOV_RESULTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub is_gov: bool,
}

/// A raw hit from the search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search returned HTTP {0}")]
    Status(u16),

    #[error("search parse task failed: {0}")]
    Parse(String),
}

/// Anything that can answer a text query.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn text(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

// ── DuckDuckGo ───────────────────────────────────────────────────────────

pub struct DuckDuckGo {
    client: reqwest::Client,
    timeout: Duration,
}

impl DuckDuckGo {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGo {
    async fn text(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let resp = self
            .client
            .post(DDG_HTML_URL)
            .form(&[("q", query)])
            .header("User-Agent", USER_AGENT)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status(resp.status().as_u16()));
        }
        let body = resp.text().await?;

        // scraper's DOM is !Send
        let hits = tokio::task::spawn_blocking(move || parse_results(&body))
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;
        debug!("DuckDuckGo '{}': {} hits", query, hits.len());
        Ok(hits.into_iter().take(max_results).collect())
    }
}

static RESULT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result").expect("valid selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result__a").expect("valid selector"));
static SNIPPET_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result__snippet").expect("valid selector"));

/// Parse the results page of the HTML endpoint.
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let mut hits = Vec::new();
    for result in document.select(&RESULT_SELECTOR) {
        let Some(link) = result.select(&TITLE_SELECTOR).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or("");
        let Some(url) = resolve_redirect(href) else {
            continue;
        };
        let title = collapse(&link.text().collect::<String>());
        let snippet = result
            .select(&SNIPPET_SELECTOR)
            .next()
            .map(|s| collapse(&s.text().collect::<String>()))
            .unwrap_or_default();
        hits.push(SearchHit {
            title,
            url,
            snippet,
        });
    }
    hits
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<encoded>&rut=…`.
pub fn resolve_redirect(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = reqwest::Url::parse(&absolute).ok()?;
    if url.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) {
        if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
            return Some(target.into_owned());
        }
        // ads and internal links
        return None;
    }
    Some(absolute)
}

// ── Searcher ─────────────────────────────────────────────────────────────

static GOV_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.gov(/|$)|\.gov\.").expect("valid regex"));

pub fn is_gov_site(url: &str) -> bool {
    GOV_PATTERN.is_match(url)
}

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("security deposit", &["security deposit", "deposit"]),
    ("eviction", &["eviction", "termination", "notice to vacate"]),
    ("repairs and maintenance", &["repair", "maintenance", "habitability"]),
    ("rent increase", &["rent increase", "rent adjustment"]),
    ("late fees", &["late fee", "late charge", "late payment"]),
    ("pet policy", &["pet", "animal"]),
    ("subletting", &["sublease", "sublet", "assignment"]),
    ("entry and access", &["entry", "access", "inspection"]),
    ("utilities", &["utilities", "water", "electric", "gas"]),
    ("lease termination", &["termination", "breaking lease", "early termination"]),
];

pub const GENERAL_TOPIC: &str = "landlord tenant law";

/// Topics worth a law search, general landlord-tenant law first and then
/// keyword hits in a fixed order.
pub fn extract_legal_topics(lease_text: &str) -> Vec<String> {
    let lower = lease_text.to_lowercase();
    let mut topics = vec![GENERAL_TOPIC.to_string()];
    topics.extend(
        TOPIC_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(topic, _)| topic.to_string()),
    );
    topics
}

/// "{city} {county} county {state}" with absent parts skipped.
fn location_terms(location: &LeaseLocation) -> String {
    let mut parts = Vec::new();
    if let Some(city) = location.city.as_deref().filter(|s| !s.is_empty()) {
        parts.push(city.to_string());
    }
    if let Some(county) = location.county.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("{county} county"));
    }
    if let Some(state) = location.state.as_deref().filter(|s| !s.is_empty()) {
        parts.push(state.to_string());
    }
    parts.join(" ")
}

/// Location-aware law search on top of a [`SearchBackend`].
#[derive(Clone)]
pub struct WebSearcher {
    backend: Arc<dyn SearchBackend>,
}

impl WebSearcher {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    pub fn duckduckgo() -> Self {
        Self::new(Arc::new(DuckDuckGo::default()))
    }

    /// `.gov`-restricted search, widened when it finds fewer than three
    /// government pages. Errors end the search with what was gathered.
    pub async fn search_gov_laws(
        &self,
        query: &str,
        location: &LeaseLocation,
        max_results: usize,
    ) -> Vec<SearchResult> {
        let terms = location_terms(location);
        let gov_query = format!("{query} {terms} site:.gov");
        info!("Searching: {}", gov_query);

        let mut results: Vec<SearchResult> = Vec::new();
        match self.backend.text(&gov_query, max_results).await {
            Ok(hits) => results.extend(hits.into_iter().map(to_result)),
            Err(e) => {
                error!("Search error: {}", e);
                return prioritize_gov(results, max_results);
            }
        }

        if results.iter().filter(|r| r.is_gov).count() < MIN_GOV_RESULTS {
            let broader = format!("{query} {terms} landlord tenant law");
            match self.backend.text(&broader, max_results).await {
                Ok(hits) => {
                    for hit in hits {
                        if !results.iter().any(|r| r.url == hit.url) {
                            results.push(to_result(hit));
                        }
                    }
                }
                Err(e) => error!("Search error: {}", e),
            }
        }
        prioritize_gov(results, max_results)
    }

    /// One search per topic, in topic order.
    pub async fn search_topics(
        &self,
        topics: &[String],
        location: &LeaseLocation,
        per_topic: usize,
    ) -> Vec<(String, Vec<SearchResult>)> {
        let mut out = Vec::with_capacity(topics.len());
        for topic in topics {
            let results = self.search_gov_laws(topic, location, per_topic).await;
            out.push((topic.clone(), results));
        }
        out
    }
}

fn to_result(hit: SearchHit) -> SearchResult {
    SearchResult {
        is_gov: is_gov_site(&hit.url),
        title: hit.title,
        url: hit.url,
        snippet: hit.snippet,
    }
}

/// `.gov` results first, otherwise stable.
fn prioritize_gov(results: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
    let (gov, other): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_gov);
    gov.into_iter().chain(other).take(max_results).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        answers: Mutex<Vec<Result<Vec<SearchHit>, SearchError>>>,
        queries: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<Vec<SearchHit>, SearchError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                queries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SearchBackend for Scripted {
        async fn text(&self, query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            self.answers.lock().unwrap().pop().unwrap_or(Ok(vec![]))
        }
    }

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            title: format!("Title {url}"),
            url: url.to_string(),
            snippet: "snippet".into(),
        }
    }

    fn austin() -> LeaseLocation {
        LeaseLocation {
            city: Some("Austin".into()),
            county: Some("Travis".into()),
            state: Some("TX".into()),
            ..Default::default()
        }
    }

    #[test]
    fn gov_detection() {
        assert!(is_gov_site("https://www.texas.gov/housing"));
        assert!(is_gov_site("https://HUD.GOV"));
        assert!(is_gov_site("https://courts.gov.uk/page"));
        assert!(!is_gov_site("https://governance.example.com"));
        assert!(!is_gov_site("https://example.com/gov"));
    }

    #[test]
    fn topics_start_with_general_law() {
        let topics = extract_legal_topics("The Security Deposit is due. No PETS. Late fee $50.");
        assert_eq!(
            topics,
            vec!["landlord tenant law", "security deposit", "late fees", "pet policy"]
        );
        assert_eq!(extract_legal_topics(""), vec![GENERAL_TOPIC]);
    }

    #[test]
    fn redirect_links_are_decoded() {
        assert_eq!(
            resolve_redirect("//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.hud.gov%2Frent&rut=abc"),
            Some("https://www.hud.gov/rent".to_string())
        );
        assert_eq!(
            resolve_redirect("https://example.com/a"),
            Some("https://example.com/a".to_string())
        );
        assert_eq!(resolve_redirect("https://duckduckgo.com/y.js?ad=1"), None);
        assert_eq!(resolve_redirect(""), None);
    }

    #[test]
    fn parses_html_results() {
        let html = r#"<html><body>
            <div class="result results_links">
              <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.texas.gov%2Flaw">Texas
                 Property Code</a></h2>
              <a class="result__snippet">Security deposits must be returned within 30 days.</a>
            </div>
            <div class="result"><a class="result__a" href="https://blog.example.com/x">Blog</a></div>
            <div class="result"><span>no link</span></div>
          </body></html>"#;
        let hits = parse_results(html);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Texas Property Code");
        assert_eq!(hits[0].url, "https://www.texas.gov/law");
        assert!(hits[0].snippet.starts_with("Security deposits"));
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn result_selectors_compile_and_are_shared() {
        Lazy::force(&RESULT_SELECTOR);
        Lazy::force(&TITLE_SELECTOR);
        Lazy::force(&SNIPPET_SELECTOR);
        let page = r#"<div class="result"><a class="result__a" href="https://a.gov/x">A</a></div>"#;
        assert_eq!(parse_results(page), parse_results(page));
        assert!(parse_results("<html></html>").is_empty());
    }

    #[tokio::test]
    async fn broad_search_when_few_gov_results() {
        let backend = Scripted::new(vec![
            Ok(vec![hit("https://blog.example.com/a"), hit("https://www.tx.gov/a")]),
            Ok(vec![hit("https://blog.example.com/a"), hit("https://www.hud.gov/b")]),
        ]);
        let searcher = WebSearcher::new(backend.clone());
        let results = searcher.search_gov_laws("security deposit", &austin(), 10).await;

        let queries = backend.queries.lock().unwrap().clone();
        assert_eq!(
            queries,
            vec![
                "security deposit Austin Travis county TX site:.gov",
                "security deposit Austin Travis county TX landlord tenant law",
            ]
        );
        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://www.tx.gov/a", "https://www.hud.gov/b", "https://blog.example.com/a"]
        );
    }

    #[tokio::test]
    async fn enough_gov_results_skip_broad_search() {
        let backend = Scripted::new(vec![Ok(vec![
            hit("https://a.gov/1"),
            hit("https://b.gov/2"),
            hit("https://c.gov/3"),
        ])]);
        let searcher = WebSearcher::new(backend.clone());
        let results = searcher.search_gov_laws("eviction", &austin(), 2).await;
        assert_eq!(backend.queries.lock().unwrap().len(), 1);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn errors_yield_gathered_results() {
        let backend = Scripted::new(vec![
            Ok(vec![hit("https://a.gov/1")]),
            Err(SearchError::Status(503)),
        ]);
        let searcher = WebSearcher::new(backend);
        let results = searcher.search_gov_laws("rent", &LeaseLocation::default(), 5).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_gov);
    }
}

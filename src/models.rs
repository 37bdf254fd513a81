//! Response types for the analysis, maintenance and move-out endpoints.
//!
//! These are plain data carriers serialised straight to JSON; the lease
//! extraction schema lives in [`crate::lease::schema`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ── Enums ────────────────────────────────────────────────────────────────

/// How a model finds the laws it cites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// The model searches the web itself.
    #[default]
    #[serde(rename = "native_search")]
    NativeSearch,
    /// DuckDuckGo results are gathered first and pasted into the prompt.
    #[serde(rename = "duckduckgo_search", alias = "duckduckgo")]
    DuckDuckGo,
}

impl FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "native_search" => Ok(Self::NativeSearch),
            "duckduckgo_search" | "duckduckgo" => Ok(Self::DuckDuckGo),
            other => Err(format!(
                "Invalid search_strategy '{other}'. Use native_search or duckduckgo_search"
            )),
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NativeSearch => "native_search",
            Self::DuckDuckGo => "duckduckgo_search",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    RentIncrease,
    TenantOwnerRights,
    FairHousingLaws,
    Licensing,
    Others,
}

impl ViolationCategory {
    pub const ALL: [ViolationCategory; 5] = [
        Self::RentIncrease,
        Self::TenantOwnerRights,
        Self::FairHousingLaws,
        Self::Licensing,
        Self::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RentIncrease => "rent_increase",
            Self::TenantOwnerRights => "tenant_owner_rights",
            Self::FairHousingLaws => "fair_housing_laws",
            Self::Licensing => "licensing",
            Self::Others => "others",
        }
    }

    /// Unknown labels fall into [`ViolationCategory::Others`].
    pub fn parse_lenient(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .unwrap_or(Self::Others)
    }
}

// ── Lease facts ──────────────────────────────────────────────────────────

/// Key facts about a lease plus its full text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaseInfo {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    pub landlord: Option<String>,
    pub tenant: Option<String>,
    pub rent_amount: Option<String>,
    pub security_deposit: Option<String>,
    pub lease_duration: Option<String>,
    pub full_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaseLocation {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    /// "City, ST (Name County)".
    pub full_location: String,
}

impl LeaseLocation {
    pub fn from_info(info: &LeaseInfo) -> Self {
        Self {
            address: info.address.clone(),
            city: info.city.clone(),
            state: info.state.clone(),
            county: info.county.clone(),
            full_location: format_location(
                info.city.as_deref(),
                info.state.as_deref(),
                info.county.as_deref(),
            ),
        }
    }
}

pub fn format_location(city: Option<&str>, state: Option<&str>, county: Option<&str>) -> String {
    let parts: Vec<&str> = [city, state]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
    let mut location = if parts.is_empty() {
        "Location not specified".to_string()
    } else {
        parts.join(", ")
    };
    if let Some(county) = county.filter(|c| !c.trim().is_empty()) {
        location.push_str(&format!(" ({county} County)"));
    }
    location
}

// ── Violations ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source_url: String,
    pub title: String,
    pub relevant_text: String,
    pub law_reference: Option<String>,
    #[serde(default)]
    pub is_gov_site: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: String,
    pub description: String,
    /// low, medium, high or critical.
    pub severity: String,
    /// 0.0–1.0.
    pub confidence_score: f64,
    pub lease_clause: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedViolation {
    pub violation_type: String,
    pub category: ViolationCategory,
    pub description: String,
    pub severity: String,
    pub confidence_score: f64,
    pub lease_clause: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub recommended_action: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: usize,
    pub completion: usize,
    pub total: usize,
}

impl TokenUsage {
    pub fn new(prompt: usize, completion: usize) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub model_name: String,
    pub search_strategy: SearchStrategy,
    pub total_time_seconds: f64,
    pub cost_usd: f64,
    pub gov_citations_count: usize,
    pub total_citations_count: usize,
    pub violations_found: usize,
    pub avg_confidence_score: f64,
    /// Any citation names a specific statute or code section.
    pub has_law_references: bool,
    pub tokens_used: TokenUsage,
}

impl AnalysisMetrics {
    /// Metrics for a run that produced nothing.
    pub fn empty(model_name: &str, search_strategy: SearchStrategy, total_time_seconds: f64) -> Self {
        Self {
            model_name: model_name.to_string(),
            search_strategy,
            total_time_seconds,
            cost_usd: 0.0,
            gov_citations_count: 0,
            total_citations_count: 0,
            violations_found: 0,
            avg_confidence_score: 0.0,
            has_law_references: false,
            tokens_used: TokenUsage::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub model_name: String,
    pub search_strategy: SearchStrategy,
    pub lease_info: LeaseInfo,
    pub violations: Vec<Violation>,
    pub metrics: AnalysisMetrics,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedAnalysisResult {
    pub model_name: String,
    pub search_strategy: SearchStrategy,
    pub lease_info: LeaseInfo,
    /// Always holds all five category keys.
    pub violations_by_category: BTreeMap<String, Vec<CategorizedViolation>>,
    pub total_violations: usize,
    pub metrics: AnalysisMetrics,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

// ── Model comparison ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model_name: String,
    pub provider: String,
    pub search_strategy: String,
    pub cost_usd: f64,
    pub time_seconds: f64,
    pub violations_found: usize,
    pub gov_citations: usize,
    pub total_citations: usize,
    pub avg_confidence: f64,
    pub cost_rank: usize,
    pub time_rank: usize,
    pub citation_rank: usize,
    pub overall_rank: usize,
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total_models: usize,
    pub successful_analyses: usize,
    pub failed_analyses: usize,
    pub cheapest_model: String,
    pub most_expensive_model: String,
    pub avg_cost: f64,
    pub cost_range: String,
    pub fastest_model: String,
    pub slowest_model: String,
    pub avg_time: f64,
    pub time_range: String,
    pub most_citations_model: String,
    pub most_violations_model: String,
    pub highest_confidence_model: String,
    pub models_by_cost: Vec<ModelComparison>,
    pub models_by_time: Vec<ModelComparison>,
    pub models_by_citations: Vec<ModelComparison>,
    pub models_by_overall_score: Vec<ModelComparison>,
    pub recommended_for_accuracy: String,
    pub recommended_for_budget: String,
    pub recommended_for_speed: String,
    pub recommended_overall: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub lease_file_name: String,
    pub lease_location: Option<LeaseLocation>,
    pub total_models_tested: usize,
    pub results: Vec<AnalysisResult>,
    pub best_by_cost: Option<String>,
    pub best_by_time: Option<String>,
    pub best_by_citations: Option<String>,
    pub best_overall: Option<String>,
    pub comparison_summary: Option<ComparisonSummary>,
    pub timestamp: DateTime<Utc>,
}

/// Catalogue entry served by `GET /models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub name: String,
    pub provider: String,
    pub has_native_search: bool,
    /// `{"input": usd, "output": usd}` per 1k tokens.
    pub estimated_cost_per_1k_tokens: BTreeMap<String, f64>,
    pub context_length: usize,
}

// ── Maintenance and move-out ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceEvaluation {
    pub maintenance_request: String,
    /// "approved" or "rejected".
    pub decision: String,
    pub response_message: String,
    pub decision_reasons: Vec<String>,
    pub lease_clauses_cited: Vec<String>,
    pub landlord_responsibility_clause: Option<String>,
    pub tenant_responsibility_clause: Option<String>,
    pub estimated_timeline: Option<String>,
    pub alternative_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorWorkOrder {
    pub maintenance_request: String,
    pub work_order_title: String,
    pub comprehensive_description: String,
    /// "routine", "urgent" or "emergency".
    pub urgency_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceWorkflow {
    pub maintenance_request: String,
    pub tenant_message: String,
    pub tenant_message_tone: String,
    pub decision: String,
    pub decision_reasons: Vec<String>,
    pub lease_clauses_cited: Vec<String>,
    /// Present only for approved requests.
    pub vendor_work_order: Option<VendorWorkOrder>,
    pub estimated_timeline: Option<String>,
    pub alternative_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOutResponse {
    pub move_out_request: String,
    /// "approved" or "requires_attention".
    pub decision: String,
    pub response_message: String,
    pub notice_period_valid: bool,
    pub notice_period_required: Option<String>,
    pub notice_period_given: Option<String>,
    pub move_out_date: Option<String>,
    pub financial_summary: BTreeMap<String, String>,
    pub lease_clauses_cited: Vec<String>,
    pub penalties_or_fees: Option<Vec<String>>,
    pub next_steps: Vec<String>,
    pub estimated_refund_timeline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantMessageRewrite {
    pub original_message: String,
    pub rewritten_message: String,
    pub improvements_made: Vec<String>,
    pub tone: String,
    /// "routine", "urgent" or "emergency".
    pub estimated_urgency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_strategy_wire_names() {
        assert_eq!(
            serde_json::to_string(&SearchStrategy::NativeSearch).unwrap(),
            "\"native_search\""
        );
        let alias: SearchStrategy = serde_json::from_str("\"duckduckgo\"").unwrap();
        assert_eq!(alias, SearchStrategy::DuckDuckGo);
        assert_eq!("".parse::<SearchStrategy>().unwrap(), SearchStrategy::NativeSearch);
        assert!("bing".parse::<SearchStrategy>().is_err());
    }

    #[test]
    fn category_lenient_parse() {
        assert_eq!(ViolationCategory::parse_lenient("Licensing"), ViolationCategory::Licensing);
        assert_eq!(ViolationCategory::parse_lenient("zoning"), ViolationCategory::Others);
    }

    #[test]
    fn location_formatting() {
        assert_eq!(
            format_location(Some("Austin"), Some("TX"), Some("Travis")),
            "Austin, TX (Travis County)"
        );
        assert_eq!(format_location(None, Some("CA"), None), "CA");
        assert_eq!(format_location(None, None, None), "Location not specified");
        assert_eq!(
            format_location(None, None, Some("Cook")),
            "Location not specified (Cook County)"
        );
    }

    #[test]
    fn token_usage_totals() {
        let t = TokenUsage::new(120, 30);
        assert_eq!(t.total, 150);
    }
}

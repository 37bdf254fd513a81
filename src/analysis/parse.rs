//! Reading violations and lease facts out of a model's analysis answer.

use crate::models::{
    AnalysisMetrics, CategorizedViolation, Citation, LeaseInfo, SearchStrategy, TokenUsage,
    Violation, ViolationCategory,
};
use crate::search::is_gov_site;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Violations plus the model's own reading of the lease facts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAnalysis {
    pub violations: Vec<Violation>,
    pub lease_facts: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCategorized {
    pub violations: Vec<CategorizedViolation>,
    pub lease_facts: Option<Map<String, Value>>,
}

fn string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers and numeric strings both count.
fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_citation(value: &Value) -> Option<Citation> {
    let obj = value.as_object()?;
    let source_url = string(obj, "source_url").unwrap_or_default();
    let is_gov = match obj.get("is_gov_site") {
        Some(Value::Bool(b)) => *b,
        _ => is_gov_site(&source_url),
    };
    Some(Citation {
        title: string(obj, "title").unwrap_or_default(),
        relevant_text: string(obj, "relevant_text").unwrap_or_default(),
        law_reference: string(obj, "law_reference"),
        is_gov_site: is_gov,
        source_url,
    })
}

/// Shared fields of both violation shapes; `None` when the confidence is
/// outside 0..=1.
fn parse_violation(obj: &Map<String, Value>) -> Option<Violation> {
    let confidence_score = number(obj, "confidence_score").unwrap_or(0.5);
    if !(0.0..=1.0).contains(&confidence_score) {
        warn!("Skipping violation with confidence {}", confidence_score);
        return None;
    }
    let citations = obj
        .get("citations")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_citation).collect())
        .unwrap_or_default();
    Some(Violation {
        violation_type: string(obj, "violation_type").unwrap_or_else(|| "Unknown".into()),
        description: string(obj, "description").unwrap_or_default(),
        severity: string(obj, "severity").unwrap_or_else(|| "medium".into()),
        confidence_score,
        lease_clause: string(obj, "lease_clause").unwrap_or_default(),
        citations,
    })
}

fn violation_objects(data: &Value) -> impl Iterator<Item = &Map<String, Value>> {
    data.get("violations")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

/// `lease_info`, or the older `location` key.
fn lease_facts(data: &Value) -> Option<Map<String, Value>> {
    data.get("lease_info")
        .or_else(|| data.get("location"))
        .and_then(Value::as_object)
        .cloned()
}

pub fn parse_analysis(data: &Value) -> ParsedAnalysis {
    ParsedAnalysis {
        violations: violation_objects(data).filter_map(parse_violation).collect(),
        lease_facts: lease_facts(data),
    }
}

pub fn parse_categorized(data: &Value) -> ParsedCategorized {
    let violations = violation_objects(data)
        .filter_map(|obj| {
            let base = parse_violation(obj)?;
            let category = string(obj, "category")
                .map(|c| ViolationCategory::parse_lenient(&c))
                .unwrap_or(ViolationCategory::Others);
            Some(CategorizedViolation {
                violation_type: base.violation_type,
                category,
                description: base.description,
                severity: base.severity,
                confidence_score: base.confidence_score,
                lease_clause: base.lease_clause,
                citations: base.citations,
                recommended_action: string(obj, "recommended_action").unwrap_or_default(),
            })
        })
        .collect();
    ParsedCategorized {
        violations,
        lease_facts: lease_facts(data),
    }
}

/// Non-empty model values replace the regex ones.
pub fn apply_lease_facts(info: &mut LeaseInfo, facts: &Map<String, Value>) {
    let fields: [(&str, &mut Option<String>); 9] = [
        ("address", &mut info.address),
        ("city", &mut info.city),
        ("state", &mut info.state),
        ("county", &mut info.county),
        ("landlord", &mut info.landlord),
        ("tenant", &mut info.tenant),
        ("rent_amount", &mut info.rent_amount),
        ("security_deposit", &mut info.security_deposit),
        ("lease_duration", &mut info.lease_duration),
    ];
    for (key, slot) in fields {
        if let Some(value) = string(facts, key).filter(|v| !v.eq_ignore_ascii_case("null")) {
            *slot = Some(value);
        }
    }
}

/// Every category key, in fixed order, each with its violations.
pub fn group_by_category(
    violations: Vec<CategorizedViolation>,
) -> BTreeMap<String, Vec<CategorizedViolation>> {
    let mut grouped: BTreeMap<String, Vec<CategorizedViolation>> = ViolationCategory::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), Vec::new()))
        .collect();
    for v in violations {
        grouped.entry(v.category.as_str().to_string()).or_default().push(v);
    }
    grouped
}

/// Metrics over whatever citations the violations carry.
pub fn compute_metrics<'a>(
    model_name: &str,
    search_strategy: SearchStrategy,
    citations_per_violation: impl Iterator<Item = (&'a [Citation], f64)>,
    total_time_seconds: f64,
    tokens_used: TokenUsage,
    cost_usd: f64,
) -> AnalysisMetrics {
    let mut metrics = AnalysisMetrics::empty(model_name, search_strategy, total_time_seconds);
    let mut confidence_sum = 0.0;
    for (citations, confidence) in citations_per_violation {
        metrics.violations_found += 1;
        confidence_sum += confidence;
        metrics.total_citations_count += citations.len();
        metrics.gov_citations_count += citations.iter().filter(|c| c.is_gov_site).count();
        metrics.has_law_references |= citations.iter().any(|c| c.law_reference.is_some());
    }
    if metrics.violations_found > 0 {
        metrics.avg_confidence_score = confidence_sum / metrics.violations_found as f64;
    }
    metrics.tokens_used = tokens_used;
    metrics.cost_usd = cost_usd;
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn violation_defaults_and_citation_flags() {
        let data = json!({
            "violations": [
                {
                    "description": "Late fee above cap",
                    "citations": [
                        {"source_url": "https://statutes.capitol.texas.gov/x", "title": "Prop Code", "relevant_text": "..."},
                        {"source_url": "https://blog.example.com", "title": "Blog", "relevant_text": "...", "law_reference": "§ 92.019"}
                    ]
                }
            ]
        });
        let parsed = parse_analysis(&data);
        let v = &parsed.violations[0];
        assert_eq!(v.violation_type, "Unknown");
        assert_eq!(v.severity, "medium");
        assert_eq!(v.confidence_score, 0.5);
        assert!(v.citations[0].is_gov_site);
        assert!(!v.citations[1].is_gov_site);
        assert_eq!(v.citations[1].law_reference.as_deref(), Some("§ 92.019"));
        assert!(parsed.lease_facts.is_none());
    }

    #[test]
    fn out_of_range_confidence_is_skipped() {
        let data = json!({"violations": [
            {"violation_type": "A", "confidence_score": 1.5},
            {"violation_type": "B", "confidence_score": "0.8"}
        ]});
        let parsed = parse_analysis(&data);
        assert_eq!(parsed.violations.len(), 1);
        assert_eq!(parsed.violations[0].confidence_score, 0.8);
    }

    #[test]
    fn location_key_is_accepted_and_applied() {
        let data = json!({"location": {"city": "Austin", "state": "TX", "county": null}, "violations": []});
        let parsed = parse_analysis(&data);
        let mut info = LeaseInfo {
            city: Some("Springfield".into()),
            county: Some("Sangamon".into()),
            ..Default::default()
        };
        apply_lease_facts(&mut info, parsed.lease_facts.as_ref().unwrap());
        assert_eq!(info.city.as_deref(), Some("Austin"));
        assert_eq!(info.state.as_deref(), Some("TX"));
        assert_eq!(info.county.as_deref(), Some("Sangamon"));
    }

    #[test]
    fn categories_always_present() {
        let data = json!({"violations": [
            {"category": "Licensing", "violation_type": "No rental license", "recommended_action": "Register"},
            {"category": "zoning", "violation_type": "Odd use"}
        ]});
        let grouped = group_by_category(parse_categorized(&data).violations);
        assert_eq!(grouped.len(), 5);
        assert_eq!(grouped["licensing"][0].recommended_action, "Register");
        assert_eq!(grouped["others"][0].violation_type, "Odd use");
        assert!(grouped["rent_increase"].is_empty());
    }

    #[test]
    fn metrics_count_citations() {
        let gov = Citation {
            source_url: "https://a.gov".into(),
            is_gov_site: true,
            law_reference: Some("§ 1".into()),
            ..Default::default()
        };
        let other = Citation::default();
        let a = vec![gov.clone(), other];
        let b = vec![gov];
        let metrics = compute_metrics(
            "m",
            SearchStrategy::NativeSearch,
            [(a.as_slice(), 0.9), (b.as_slice(), 0.7)].into_iter(),
            1.5,
            TokenUsage::new(10, 5),
            0.01,
        );
        assert_eq!(metrics.violations_found, 2);
        assert_eq!(metrics.total_citations_count, 3);
        assert_eq!(metrics.gov_citations_count, 2);
        assert!(metrics.has_law_references);
        assert!((metrics.avg_confidence_score - 0.8).abs() < 1e-9);
        assert_eq!(metrics.tokens_used.total, 15);
    }
}

//! Ranking a batch of analysis results against each other.

use crate::models::{AnalysisResult, ComparisonSummary, ModelComparison};
use std::cmp::Ordering;
use std::collections::HashMap;

const NOT_AVAILABLE: &str = "N/A";

/// Winners across the successful results, as shown at the top of a
/// comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestModels {
    pub by_cost: Option<String>,
    pub by_time: Option<String>,
    pub by_citations: Option<String>,
    pub overall: Option<String>,
}

fn successful(results: &[AnalysisResult]) -> Vec<&AnalysisResult> {
    results.iter().filter(|r| r.error.is_none()).collect()
}

fn cost(r: &AnalysisResult) -> f64 {
    r.metrics.cost_usd
}

fn time(r: &AnalysisResult) -> f64 {
    r.metrics.total_time_seconds
}

fn asc(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// First element with the smallest key (ties keep the earliest).
fn min_by_key<'a>(items: &[&'a AnalysisResult], key: impl Fn(&AnalysisResult) -> f64) -> Option<&'a AnalysisResult> {
    items
        .iter()
        .copied()
        .reduce(|best, r| if key(r) < key(best) { r } else { best })
}

fn max_by_key<'a>(items: &[&'a AnalysisResult], key: impl Fn(&AnalysisResult) -> f64) -> Option<&'a AnalysisResult> {
    items
        .iter()
        .copied()
        .reduce(|best, r| if key(r) > key(best) { r } else { best })
}

/// Inverse cost and time blended with citations and confidence.
fn headline_score(r: &AnalysisResult) -> f64 {
    let cost_score = 1.0 / (r.metrics.cost_usd + 0.001);
    let time_score = 1.0 / (r.metrics.total_time_seconds + 0.1);
    cost_score * 0.3
        + time_score * 0.2
        + r.metrics.gov_citations_count as f64 * 0.3
        + r.metrics.avg_confidence_score * 0.2
}

pub fn best_models(results: &[AnalysisResult]) -> BestModels {
    let ok = successful(results);
    BestModels {
        by_cost: min_by_key(&ok, cost).map(|r| format!("{} (${:.4})", r.model_name, cost(r))),
        by_time: min_by_key(&ok, time).map(|r| format!("{} ({:.2}s)", r.model_name, time(r))),
        by_citations: max_by_key(&ok, |r| r.metrics.gov_citations_count as f64).map(|r| {
            format!(
                "{} ({} .gov citations)",
                r.model_name, r.metrics.gov_citations_count
            )
        }),
        overall: max_by_key(&ok, headline_score).map(|r| r.model_name.clone()),
    }
}

/// Normalised score: citations 40%, confidence 30%, cost 20%, time 10%.
fn weighted_score(r: &AnalysisResult, max_cost: f64, max_time: f64, max_citations: usize) -> f64 {
    let cost_score = if max_cost > 0.0 { 1.0 - cost(r) / max_cost } else { 1.0 };
    let time_score = if max_time > 0.0 { 1.0 - time(r) / max_time } else { 1.0 };
    let citation_score = r.metrics.gov_citations_count as f64 / max_citations as f64;
    citation_score * 0.4 + r.metrics.avg_confidence_score * 0.3 + cost_score * 0.2 + time_score * 0.1
}

fn empty_summary(total: usize) -> ComparisonSummary {
    let na = || NOT_AVAILABLE.to_string();
    ComparisonSummary {
        total_models: total,
        successful_analyses: 0,
        failed_analyses: total,
        cheapest_model: na(),
        most_expensive_model: na(),
        avg_cost: 0.0,
        cost_range: na(),
        fastest_model: na(),
        slowest_model: na(),
        avg_time: 0.0,
        time_range: na(),
        most_citations_model: na(),
        most_violations_model: na(),
        highest_confidence_model: na(),
        models_by_cost: Vec::new(),
        models_by_time: Vec::new(),
        models_by_citations: Vec::new(),
        models_by_overall_score: Vec::new(),
        recommended_for_accuracy: na(),
        recommended_for_budget: na(),
        recommended_for_speed: na(),
        recommended_overall: na(),
    }
}

fn provider_of(model: &str) -> String {
    model.split('/').next().unwrap_or(model).to_string()
}

pub fn comparison_summary(results: &[AnalysisResult]) -> ComparisonSummary {
    let ok = successful(results);
    let failed: Vec<&AnalysisResult> = results.iter().filter(|r| r.error.is_some()).collect();
    if ok.is_empty() {
        return empty_summary(results.len());
    }

    let max_cost = ok.iter().map(|r| cost(r)).fold(0.0, f64::max);
    let max_time = ok.iter().map(|r| time(r)).fold(0.0, f64::max);
    let max_citations = ok
        .iter()
        .map(|r| r.metrics.gov_citations_count)
        .max()
        .filter(|&m| m > 0)
        .unwrap_or(1);

    // Stable sorts: ties keep input order.
    let mut by_cost = ok.clone();
    by_cost.sort_by(|a, b| asc(cost(a), cost(b)));
    let mut by_time = ok.clone();
    by_time.sort_by(|a, b| asc(time(a), time(b)));
    let mut by_citations = ok.clone();
    by_citations.sort_by(|a, b| b.metrics.gov_citations_count.cmp(&a.metrics.gov_citations_count));
    let mut by_overall = ok.clone();
    by_overall.sort_by(|a, b| {
        asc(
            weighted_score(b, max_cost, max_time, max_citations),
            weighted_score(a, max_cost, max_time, max_citations),
        )
    });
    let mut by_confidence = ok.clone();
    by_confidence.sort_by(|a, b| asc(b.metrics.avg_confidence_score, a.metrics.avg_confidence_score));
    let mut by_violations = ok.clone();
    by_violations.sort_by(|a, b| b.metrics.violations_found.cmp(&a.metrics.violations_found));

    let ranks = |sorted: &[&AnalysisResult]| -> HashMap<String, usize> {
        sorted
            .iter()
            .enumerate()
            .map(|(i, r)| (r.model_name.clone(), i + 1))
            .collect()
    };
    let cost_ranks = ranks(&by_cost[..]);
    let time_ranks = ranks(&by_time[..]);
    let citation_ranks = ranks(&by_citations[..]);
    let overall_ranks = ranks(&by_overall[..]);

    let entry = |r: &AnalysisResult| ModelComparison {
        model_name: r.model_name.clone(),
        provider: provider_of(&r.model_name),
        search_strategy: r.search_strategy.to_string(),
        cost_usd: cost(r),
        time_seconds: time(r),
        violations_found: r.metrics.violations_found,
        gov_citations: r.metrics.gov_citations_count,
        total_citations: r.metrics.total_citations_count,
        avg_confidence: r.metrics.avg_confidence_score,
        cost_rank: cost_ranks[&r.model_name],
        time_rank: time_ranks[&r.model_name],
        citation_rank: citation_ranks[&r.model_name],
        overall_rank: overall_ranks[&r.model_name],
        success: true,
        error_message: None,
    };
    let last_rank = ok.len() + 1;
    let failed_entries: Vec<ModelComparison> = failed
        .iter()
        .map(|r| ModelComparison {
            model_name: r.model_name.clone(),
            provider: provider_of(&r.model_name),
            search_strategy: r.search_strategy.to_string(),
            cost_usd: 0.0,
            time_seconds: 0.0,
            violations_found: 0,
            gov_citations: 0,
            total_citations: 0,
            avg_confidence: 0.0,
            cost_rank: last_rank,
            time_rank: last_rank,
            citation_rank: last_rank,
            overall_rank: last_rank,
            success: false,
            error_message: r.error.clone(),
        })
        .collect();
    let listing = |sorted: &[&AnalysisResult]| -> Vec<ModelComparison> {
        sorted
            .iter()
            .map(|r| entry(*r))
            .chain(failed_entries.iter().cloned())
            .collect()
    };

    let n = ok.len() as f64;
    let cheapest = by_cost[0];
    let priciest = by_cost[by_cost.len() - 1];
    let fastest = by_time[0];
    let slowest = by_time[by_time.len() - 1];

    ComparisonSummary {
        total_models: results.len(),
        successful_analyses: ok.len(),
        failed_analyses: failed.len(),
        cheapest_model: format!("{} (${:.4})", cheapest.model_name, cost(cheapest)),
        most_expensive_model: format!("{} (${:.4})", priciest.model_name, cost(priciest)),
        avg_cost: ok.iter().map(|r| cost(r)).sum::<f64>() / n,
        cost_range: format!("${:.4} - ${:.4}", cost(cheapest), cost(priciest)),
        fastest_model: format!("{} ({:.1}s)", fastest.model_name, time(fastest)),
        slowest_model: format!("{} ({:.1}s)", slowest.model_name, time(slowest)),
        avg_time: ok.iter().map(|r| time(r)).sum::<f64>() / n,
        time_range: format!("{:.1}s - {:.1}s", time(fastest), time(slowest)),
        most_citations_model: format!(
            "{} ({} .gov)",
            by_citations[0].model_name, by_citations[0].metrics.gov_citations_count
        ),
        most_violations_model: format!(
            "{} ({} violations)",
            by_violations[0].model_name, by_violations[0].metrics.violations_found
        ),
        highest_confidence_model: format!(
            "{} ({:.2})",
            by_confidence[0].model_name, by_confidence[0].metrics.avg_confidence_score
        ),
        models_by_cost: listing(&by_cost[..]),
        models_by_time: listing(&by_time[..]),
        models_by_citations: listing(&by_citations[..]),
        models_by_overall_score: listing(&by_overall[..]),
        recommended_for_accuracy: by_citations[0].model_name.clone(),
        recommended_for_budget: cheapest.model_name.clone(),
        recommended_for_speed: fastest.model_name.clone(),
        recommended_overall: by_overall[0].model_name.clone(),
    }
}

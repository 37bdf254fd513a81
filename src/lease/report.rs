//! Extraction response, metadata and the human-readable summary.

use super::schema::LeaseData;
use crate::pipeline::window::DocumentStats;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseTokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowTiming {
    pub window_id: usize,
    /// Seconds, 2 dp.
    pub duration: f64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub request_id: String,
    pub model_id: String,
    /// Seconds, 2 dp.
    pub processing_time: f64,
    pub total_windows: usize,
    pub total_pages: usize,
    pub confidence_scores: BTreeMap<String, f64>,
    pub conflicts_found: bool,
    pub conflict_details: Vec<String>,
    pub validation_issues: Vec<String>,
    /// Items discarded by schema validation.
    pub dropped_items: Vec<String>,
    pub token_usage: LeaseTokenUsage,
    pub window_timings: Vec<WindowTiming>,
    pub estimated_cost_usd: f64,
    pub document: DocumentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseExtractionResponse {
    pub data: LeaseData,
    pub metadata: ExtractionMetadata,
    pub summary: String,
}

/// Stable id for one upload: first 16 hex chars of
/// `sha256("{filename}:{sha256(content)}")`.
pub fn request_id(filename: &str, content: &[u8]) -> String {
    let content_hash = format!("{:x}", Sha256::digest(content));
    let id = format!("{:x}", Sha256::digest(format!("{filename}:{content_hash}").as_bytes()));
    id[..16].to_string()
}

/// `$1,234.56`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn build_summary(data: &LeaseData, meta: &ExtractionMetadata) -> String {
    let mut lines = vec![
        format!("Lease extraction completed in {:.2}s", meta.processing_time),
        format!(
            "Processed {} pages in {} windows",
            meta.total_pages, meta.total_windows
        ),
        format!(
            "Tokens used: {} input + {} output = {} total",
            meta.token_usage.input_tokens,
            meta.token_usage.output_tokens,
            meta.token_usage.total_tokens
        ),
    ];

    if let Some(term) = &data.term {
        if let (Some(start), Some(end)) = (&term.lease_start_date, &term.lease_end_date) {
            lines.push(format!("Term: {start} to {end}"));
        }
    }
    if let Some(rent) = &data.rent_and_deposits {
        if let Some(monthly) = rent.monthly_base_rent.filter(|v| *v != 0.0) {
            lines.push(format!("Monthly rent: {}", format_currency(monthly)));
        }
        if let Some(deposit) = rent.security_deposit.filter(|v| *v != 0.0) {
            lines.push(format!("Security deposit: {}", format_currency(deposit)));
        }
    }

    let counts: Vec<String> = [
        (data.utility_responsibilities.len(), "utilities"),
        (data.common_area_maintenance.len(), "CAM items"),
        (data.additional_fees.len(), "additional fees"),
        (data.rent_increase_schedule.len(), "rent increases"),
    ]
    .into_iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, label)| format!("{n} {label}"))
    .collect();
    if !counts.is_empty() {
        lines.push(format!("Extracted: {}", counts.join(", ")));
    }

    if meta.conflicts_found {
        lines.push(format!(
            "{} conflicts detected - review recommended",
            meta.conflict_details.len()
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::schema::{RentAndDeposits, Term};

    fn meta() -> ExtractionMetadata {
        ExtractionMetadata {
            request_id: "abc".into(),
            model_id: "m".into(),
            processing_time: 3.456,
            total_windows: 3,
            total_pages: 15,
            confidence_scores: BTreeMap::new(),
            conflicts_found: false,
            conflict_details: vec![],
            validation_issues: vec![],
            dropped_items: vec![],
            token_usage: LeaseTokenUsage {
                input_tokens: 1000,
                output_tokens: 200,
                total_tokens: 1200,
            },
            window_timings: vec![],
            estimated_cost_usd: 0.0016,
            document: DocumentStats {
                total_pages: 15,
                total_windows: 3,
                window_size: 7,
                overlap: 2,
                avg_chars_per_page: 1800.0,
                ocr_applied: false,
            },
        }
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(11_573.0), "$11,573.00");
        assert_eq!(format_currency(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_currency(950.5), "$950.50");
        assert_eq!(format_currency(0.0), "$0.00");
    }

    #[test]
    fn request_id_is_stable_and_short() {
        let a = request_id("lease.pdf", b"%PDF-1.7 body");
        assert_eq!(a.len(), 16);
        assert_eq!(a, request_id("lease.pdf", b"%PDF-1.7 body"));
        assert_ne!(a, request_id("other.pdf", b"%PDF-1.7 body"));
    }

    #[test]
    fn summary_minimal() {
        let s = build_summary(&LeaseData::default(), &meta());
        assert_eq!(
            s,
            "Lease extraction completed in 3.46s\n\
             Processed 15 pages in 3 windows\n\
             Tokens used: 1000 input + 200 output = 1200 total"
        );
    }

    #[test]
    fn summary_with_term_rent_and_conflicts() {
        let data = LeaseData {
            term: Some(Term {
                lease_start_date: Some("2024-01-01".into()),
                lease_end_date: Some("2024-12-31".into()),
                ..Default::default()
            }),
            rent_and_deposits: Some(RentAndDeposits {
                monthly_base_rent: Some(2500.0),
                security_deposit: Some(5000.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut m = meta();
        m.conflicts_found = true;
        m.conflict_details = vec!["a".into(), "b".into()];
        let s = build_summary(&data, &m);
        assert!(s.contains("\nTerm: 2024-01-01 to 2024-12-31\n"));
        assert!(s.contains("Monthly rent: $2,500.00"));
        assert!(s.contains("Security deposit: $5,000.00"));
        assert!(s.ends_with("2 conflicts detected - review recommended"));
    }
}

//! Merge per-window extraction results into one lease.
//!
//! Array fields are unioned and de-duplicated by content hash; single-object
//! fields are merged key by key with a majority vote, and every disagreement
//! is recorded as a conflict.

use super::schema::{ARRAY_FIELDS, OBJECT_FIELDS};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Merged JSON plus what the merge learned about it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub data: Value,
    pub conflicts: Vec<String>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub validation_issues: Vec<String>,
}

/// Merge the `data` objects of all windows, in window order.
pub fn merge_windows(window_data: &[Value]) -> MergeOutcome {
    info!("Merging {} window results", window_data.len());
    let mut conflicts = Vec::new();
    let mut merged = Map::new();

    for field in ARRAY_FIELDS {
        merged.insert(field.to_string(), Value::Array(merge_array_field(field, window_data)));
    }
    for field in OBJECT_FIELDS {
        let value = merge_single_object(field, window_data, &mut conflicts)
            .map(Value::Object)
            .unwrap_or(Value::Null);
        merged.insert(field.to_string(), value);
    }
    info!("Merge complete. Found {} conflicts", conflicts.len());

    let data = Value::Object(merged);
    let validation_issues = validate_merged(&data);
    let confidence_scores = confidence_scores(window_data.len(), conflicts.len());
    MergeOutcome {
        data,
        conflicts,
        confidence_scores,
        validation_issues,
    }
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let body: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        scalar => scalar.to_string(),
    }
}

pub fn content_hash(value: &Value) -> String {
    format!("{:x}", Sha256::digest(canonical_json(value).as_bytes()))
}

/// Unique items, most frequent first; ties keep first-seen order.
fn merge_array_field(field: &str, window_data: &[Value]) -> Vec<Value> {
    let mut order: Vec<(String, Value, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut total = 0;

    for data in window_data {
        let Some(items) = data.get(field).and_then(Value::as_array) else {
            continue;
        };
        for item in items {
            total += 1;
            let hash = content_hash(item);
            match index.get(&hash) {
                Some(&i) => order[i].2 += 1,
                None => {
                    index.insert(hash.clone(), order.len());
                    order.push((hash, item.clone(), 1));
                }
            }
        }
    }

    order.sort_by(|a, b| b.2.cmp(&a.2));
    debug!("Merged {}: {} total → {} unique", field, total, order.len());
    order.into_iter().map(|(_, item, _)| item).collect()
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(m) => !m.is_empty(),
        _ => true,
    }
}

fn merge_single_object(
    field: &str,
    window_data: &[Value],
    conflicts: &mut Vec<String>,
) -> Option<Map<String, Value>> {
    let values: Vec<&Map<String, Value>> = window_data
        .iter()
        .filter_map(|d| d.get(field))
        .filter(|v| is_present(v))
        .filter_map(Value::as_object)
        .collect();

    match values.as_slice() {
        [] => return None,
        [only] => return Some((*only).clone()),
        _ => {}
    }

    let keys: BTreeSet<&String> = values.iter().flat_map(|m| m.keys()).collect();
    let mut merged = Map::new();
    for key in keys {
        let candidates: Vec<&Value> = values
            .iter()
            .filter_map(|m| m.get(key))
            .filter(|v| !v.is_null())
            .collect();
        if candidates.is_empty() {
            merged.insert(key.clone(), Value::Null);
            continue;
        }

        // (canonical form, value, count) in first-seen order
        let mut counts: Vec<(String, &Value, usize)> = Vec::new();
        for &v in &candidates {
            let canon = canonical_json(v);
            match counts.iter_mut().find(|entry| entry.0 == canon) {
                Some(entry) => entry.2 += 1,
                None => counts.push((canon, v, 1)),
            }
        }

        if counts.len() == 1 {
            merged.insert(key.clone(), candidates[0].clone());
            continue;
        }

        let mut winner = 0;
        for (i, entry) in counts.iter().enumerate() {
            if entry.2 > counts[winner].2 {
                winner = i;
            }
        }
        merged.insert(key.clone(), counts[winner].1.clone());

        let mut ranked: Vec<&(String, &Value, usize)> = counts.iter().collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2));
        let tally: Vec<String> = ranked.iter().map(|(c, _, n)| format!("{c} ({n})")).collect();
        let message = format!("{field}.{key}: Multiple values found - {}", tally.join(", "));
        warn!("{}", message);
        conflicts.push(message);
    }
    Some(merged)
}

fn confidence_scores(total_windows: usize, conflicts: usize) -> BTreeMap<String, f64> {
    let mut scores = BTreeMap::new();
    if total_windows == 0 {
        return scores;
    }
    scores.insert(
        "overall_confidence".to_string(),
        if conflicts == 0 { 1.0 } else { 0.8 },
    );
    scores.insert(
        "data_consistency".to_string(),
        (1.0 - conflicts as f64 / 10.0).max(0.0),
    );
    scores
}

fn validate_merged(data: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    if !data.get("term").is_some_and(is_present) {
        issues.push("Missing term information".to_string());
    }
    if !data.get("rent_and_deposits").is_some_and(is_present) {
        issues.push("Missing rent and deposits information".to_string());
    }
    issues
}

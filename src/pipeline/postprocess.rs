//! Post-processing: recover a JSON object from raw LLM output.
//!
//! Models asked for "ONLY valid JSON" still wrap it in fences, add a
//! sentence of preamble, leave raw control characters inside strings, or run
//! out of tokens halfway through an array. Each rule below handles one of
//! those quirks; the two entry points combine them in the order the two call
//! sites need.
//!
//! * [`extract_json_block`] is strict: it decodes exactly the first JSON
//!   value and reports what went wrong, so the lease extractor can issue one
//!   corrective retry.
//! * [`extract_json_object`] is lenient: it tries progressively looser
//!   candidates and patches truncated output, because its callers (analysis,
//!   assistants) have no retry and prefer a partial object to none.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Strict extraction of the first JSON value in `text`.
pub fn extract_json_block(text: &str) -> Result<Value, String> {
    let candidate = strip_fence(text.trim());
    let candidate = if candidate.starts_with('{') {
        candidate
    } else {
        match candidate.find('{') {
            Some(i) => &candidate[i..],
            None => return Err("no JSON object found in response".to_string()),
        }
    };

    let sanitized = sanitize_control_chars(candidate);
    let mut stream = serde_json::Deserializer::from_str(&sanitized).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => {
            let trailing = sanitized[stream.byte_offset()..].trim();
            if trailing.len() > 10 {
                warn!(
                    "Ignoring {} trailing characters after JSON: {:?}",
                    trailing.len(),
                    trailing.chars().take(50).collect::<String>()
                );
            }
            Ok(value)
        }
        Some(Err(e)) => Err(format!("invalid JSON: {e}")),
        None => Err("empty response".to_string()),
    }
}

/// Lenient extraction of a JSON object from `text`.
///
/// Candidates (first that parses wins):
/// 1. ```` ```json {…} ``` ````
/// 2. ```` ``` {…} ``` ````
/// 3. an opening fence that was never closed
/// 4. first `{` to last `}`
pub fn extract_json_object(text: &str) -> Option<Value> {
    let mut candidates: Vec<String> = Vec::with_capacity(4);
    if let Some(c) = RE_FENCED_JSON.captures(text) {
        candidates.push(c[1].to_string());
    }
    if let Some(c) = RE_FENCED_ANY.captures(text) {
        candidates.push(c[1].to_string());
    }
    if let Some(c) = RE_UNTERMINATED_FENCE.captures(text) {
        candidates.push(c[1].trim_end().trim_end_matches("```").to_string());
    }
    if let Some(s) = brace_slice(text) {
        candidates.push(s.to_string());
    }

    for (i, candidate) in candidates.iter().enumerate() {
        let repaired = close_truncated(&sanitize_control_chars(candidate));
        match serde_json::from_str::<Value>(&repaired) {
            Ok(v) if v.is_object() => {
                debug!("JSON recovered with candidate rule {}", i + 1);
                return Some(v);
            }
            Ok(_) => continue,
            Err(e) => debug!("Candidate rule {} failed: {}", i + 1, e),
        }
    }
    None
}

/// Text between the first `{` and the last `}` (inclusive).
pub fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ── Rule 1: Strip a leading code fence ───────────────────────────────────────

fn strip_fence(text: &str) -> &str {
    let body = if let Some(i) = text.find("```json") {
        &text[i + 7..]
    } else if let Some(i) = text.find("```") {
        &text[i + 3..]
    } else {
        return text;
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

// ── Rule 2: Drop raw control characters ──────────────────────────────────────

/// Remove characters below U+0020 except tab, LF and CR.
pub fn sanitize_control_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| c >= ' ' || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

// ── Rule 3: Fenced object patterns ───────────────────────────────────────────

static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").unwrap());

static RE_FENCED_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\s*(\{.*?\})\s*```").unwrap());

static RE_UNTERMINATED_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*)").unwrap());

// ── Rule 4: Close output truncated by the token limit ────────────────────────

static RE_DANGLING_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#",?\s*(?:"[^"]*"\s*:\s*)?"[^"]*$"#).unwrap());

/// Balance `[`/`]` and `{`/`}` when the model stopped mid-object.
///
/// An unterminated string at the end is dropped first (together with its
/// key and leading comma) so the appended closers produce valid JSON.
pub fn close_truncated(text: &str) -> String {
    let open_braces = text.matches('{').count();
    let close_braces = text.matches('}').count();
    let open_brackets = text.matches('[').count();
    let close_brackets = text.matches(']').count();

    if open_braces == close_braces && open_brackets == close_brackets {
        return text.to_string();
    }

    let mut fixed = if unescaped_quotes(text) % 2 == 1 {
        RE_DANGLING_STRING.replace(text.trim_end(), "").to_string()
    } else {
        text.trim_end().to_string()
    };
    fixed.push_str(&"]".repeat(open_brackets.saturating_sub(close_brackets)));
    fixed.push_str(&"}".repeat(open_braces.saturating_sub(close_braces)));
    fixed
}

fn unescaped_quotes(text: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for c in text.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => count += 1,
            _ => escaped = false,
        }
        if c != '\\' {
            escaped = false;
        }
    }
    count
}

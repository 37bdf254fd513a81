//! Prompt text for violation analysis and the landlord/tenant assistants.
//!
//! Lease extraction has its own prompts in [`crate::lease::prompts`]. Every
//! builder here takes the lease text already loaded and truncates it to the
//! budget its endpoint uses.

use crate::search::SearchResult;
use chrono::NaiveDate;

/// Lease characters sent to the single-model analysis.
pub const ANALYSIS_TEXT_LIMIT: usize = 25_000;
/// Lease characters sent to the categorized analysis.
pub const CATEGORIZED_TEXT_LIMIT: usize = 60_000;
/// Lease characters sent to the assistants.
pub const ASSISTANT_TEXT_LIMIT: usize = 6_000;

/// At most `max_chars` characters of `text`, cut on a char boundary.
pub fn head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ── Analysis ─────────────────────────────────────────────────────────────

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are a legal expert specializing in landlord-tenant law. \
Analyze lease agreements for potential violations of local, county, and state laws. \
Always cite specific laws and provide .gov sources when possible.";

pub const CATEGORIZED_SYSTEM_PROMPT: &str = r#"You are a legal AI that analyzes lease agreements and sorts violations into: rent_increase, tenant_owner_rights, fair_housing_laws, licensing, or others.

CRITICAL RULES:
1. Return ONLY valid JSON: no markdown, no code blocks, no explanations
2. Your response MUST start with { and end with }
3. All string values must be properly escaped
4. Confidence scores must follow citation quality
5. Quote exact lease clause text; never leave lease_clause empty"#;

const LEASE_INFO_FIELDS: &str = r#"  "lease_info": {
    "address": "full property address or null",
    "city": "city name or null",
    "state": "2-letter state code or null",
    "county": "county name or null",
    "landlord": "landlord name or null",
    "tenant": "tenant name or null",
    "rent_amount": "monthly rent (e.g., '$1,500') or null",
    "security_deposit": "security deposit amount or null",
    "lease_duration": "lease term (e.g., '12 months', 'month-to-month') or null"
  },"#;

const EXTRACT_FIRST: &str = "1. FIRST: Extract key information from the lease:
   - Property location (address, city, state, county)
   - Landlord name
   - Tenant name
   - Monthly rent amount
   - Security deposit amount
   - Lease duration/term";

fn violations_format(citation_url: &str, citation_title: &str, law_reference: &str) -> String {
    format!(
        r#"Return your analysis in the following JSON format:
```json
{{
{LEASE_INFO_FIELDS}
  "violations": [
    {{
      "violation_type": "string",
      "description": "string",
      "severity": "low|medium|high|critical",
      "confidence_score": 0.0-1.0,
      "lease_clause": "exact text from lease",
      "citations": [
        {{
          "source_url": "{citation_url}",
          "title": "{citation_title}",
          "relevant_text": "specific text from source",
          "law_reference": "{law_reference}",
          "is_gov_site": true|false
        }}
      ]
    }}
  ]
}}
```
"#
    )
}

/// Prompt for a model that searches the web itself.
pub fn native_search_analysis_prompt(lease_text: &str) -> String {
    format!(
        "Analyze the following lease agreement for potential violations of landlord-tenant laws.\n\n\
         FULL LEASE TEXT:\n{text}\n\n\
         INSTRUCTIONS:\n{EXTRACT_FIRST}\n\
         2. Search the web for relevant landlord-tenant laws from .gov websites for that location\n\
         3. Prioritize government sources: state, county, and city .gov websites\n\
         4. Look for specific statutes, codes, and regulations that apply to this jurisdiction\n\
         5. Identify any violations or potential issues in the lease\n\
         6. For each violation found, provide:\n\
         \x20  - Violation type and description\n\
         \x20  - Severity (low, medium, high, critical)\n\
         \x20  - Confidence score (0.0 to 1.0)\n\
         \x20  - Specific lease clause that violates the law\n\
         \x20  - Citations with .gov source URLs and specific law references (e.g., \"State Code § 123.45\")\n\n\
         {format}",
        text = head(lease_text, ANALYSIS_TEXT_LIMIT),
        format = violations_format(".gov URL", "page title", "e.g., State Code § 123.45"),
    )
}

/// Prompt for a model given DuckDuckGo results instead of live search.
pub fn search_results_analysis_prompt(lease_text: &str, results: &[SearchResult]) -> String {
    let mut listing = String::from("RELEVANT LAW SEARCH RESULTS (from DuckDuckGo):\n");
    if results.is_empty() {
        listing.push_str("No search results provided.\n");
    }
    for (i, r) in results.iter().take(10).enumerate() {
        listing.push_str(&format!(
            "\n{}. {}\n   URL: {}\n   {}\n",
            i + 1,
            r.title,
            r.url,
            r.snippet
        ));
    }

    format!(
        "Analyze the following lease agreement for potential violations of landlord-tenant laws.\n\n\
         FULL LEASE TEXT:\n{text}\n\n\
         {listing}\n\
         INSTRUCTIONS:\n{EXTRACT_FIRST}\n\
         2. Review the DuckDuckGo search results (prioritize .gov sources)\n\
         3. Identify any violations or potential issues in the lease based on the laws found\n\
         4. For each violation found, provide:\n\
         \x20  - Violation type and description\n\
         \x20  - Severity (low, medium, high, critical)\n\
         \x20  - Confidence score (0.0 to 1.0)\n\
         \x20  - Specific lease clause that violates the law\n\
         \x20  - Citations from the search results above with specific law references when available\n\n\
         {format}",
        text = head(lease_text, ANALYSIS_TEXT_LIMIT),
        format = violations_format(
            "URL from search results",
            "title from search results",
            "specific law code if available"
        ),
    )
}

pub fn categorized_analysis_prompt(lease_text: &str) -> String {
    format!(
        r#"Analyze this lease for landlord-tenant law violations.

LEASE TEXT:
{text}

TASK:
1. Extract lease info (address, city, state, county, landlord, tenant, rent, deposit, duration)
2. Search .gov websites for relevant landlord-tenant laws at that location
3. Identify violations and categorize as: rent_increase, tenant_owner_rights, fair_housing_laws, licensing, or others
4. For each violation: provide category, type, description, severity, confidence (0-1), exact lease clause text (REQUIRED), recommended_action (1-2 sentences), and .gov citations

CRITICAL RULES:
- Return ONLY the JSON object; your response MUST start with an opening brace and end with a closing brace
- NO markdown code blocks
- "lease_clause" MUST contain exact quoted text from the lease; if no specific clause exists, quote the relevant section or write "General lease structure"
- "confidence_score": 0.9+ for clear violations with .gov citations, 0.7-0.9 for moderate evidence, 0.5-0.7 for potential issues
- All citations come from official .gov websites (state, county, city)

OUTPUT FORMAT (raw JSON only):
{{
{LEASE_INFO_FIELDS}
  "violations": [
    {{
      "category": "rent_increase|tenant_owner_rights|fair_housing_laws|licensing|others",
      "violation_type": "brief title",
      "description": "detailed explanation of violation",
      "severity": "low|medium|high|critical",
      "confidence_score": 0.0-1.0,
      "lease_clause": "exact quoted text from lease",
      "recommended_action": "Actionable fix (1-2 sentences)",
      "citations": [
        {{
          "source_url": ".gov URL",
          "title": "source title",
          "relevant_text": "relevant excerpt",
          "law_reference": "Code § X.XX",
          "is_gov_site": true
        }}
      ]
    }}
  ]
}}

REMEMBER: Your entire response must be ONLY the JSON object above."#,
        text = head(lease_text, CATEGORIZED_TEXT_LIMIT),
    )
}

// ── Maintenance ──────────────────────────────────────────────────────────

pub const MAINTENANCE_SYSTEM_PROMPT: &str = "You are a landlord reviewing a maintenance request. \
Evaluate it against the lease agreement and decide whether to approve or reject it based ONLY on \
what the lease says. Be fair and follow the lease terms exactly.";

pub const VENDOR_SYSTEM_PROMPT: &str = "You are a property manager writing work orders for \
vendors and contractors. Include everything the vendor needs to do the job and nothing financial.";

pub const WORKFLOW_SYSTEM_PROMPT: &str = "You are a property management assistant. Evaluate \
maintenance requests against lease agreements, write professional messages for tenants, and \
create detailed work orders for vendors.";

fn request_and_notes(request: &str, notes: Option<&str>, notes_heading: &str) -> String {
    let mut out = format!("MAINTENANCE REQUEST FROM TENANT:\n{request}\n");
    if let Some(notes) = notes {
        out.push_str(&format!("\n{notes_heading}:\n{notes}\n"));
    }
    out
}

pub fn maintenance_evaluation_prompt(request: &str, lease_text: &str, notes: Option<&str>) -> String {
    let mut prompt = format!(
        "You are a landlord reviewing a maintenance request. Evaluate it against the lease agreement \
         and decide whether to APPROVE or REJECT based ONLY on the lease terms.\n\n{}",
        request_and_notes(request, notes, "LANDLORD'S NOTES/CONTEXT")
    );
    if notes.is_some() {
        prompt.push_str(
            "\nNOTE: Consider the landlord's notes when crafting the response, but the DECISION \
             must still be based on the lease agreement.\n",
        );
    }
    prompt.push_str(&format!(
        "\nLEASE DOCUMENT:\n{}\n\n\
         INSTRUCTIONS:\n\
         1. Review the lease to determine maintenance responsibilities\n\
         2. Look for landlord obligations, tenant responsibilities, exclusions and limitations\n\
         3. Decide fairly:\n\
         \x20  - APPROVE if the lease says the landlord handles this type of maintenance\n\
         \x20  - REJECT if the lease clearly makes the tenant responsible\n\
         \x20  - APPROVE if the lease is unclear or silent (landlord's default duty)\n",
        head(lease_text, ASSISTANT_TEXT_LIMIT)
    ));
    if notes.is_some() {
        prompt.push_str("4. Work the landlord's notes into response_message tactfully\n");
    }
    prompt.push_str(
        r#"- Cite EXACT lease clauses and write a professional response message

IMPORTANT: Return ONLY valid JSON. Do not include any text before or after the JSON.

{
  "decision": "approved" or "rejected",
  "response_message": "Professional message from landlord to tenant (2-4 sentences)",
  "decision_reasons": ["Reason 1 based on lease", "Reason 2 based on lease"],
  "lease_clauses_cited": ["Exact quote from lease clause 1", "Exact quote from lease clause 2"],
  "landlord_responsibility_clause": "Clause stating landlord must fix, or null",
  "tenant_responsibility_clause": "Clause stating tenant is responsible, or null",
  "estimated_timeline": "Timeline for repair if approved, or null",
  "alternative_action": "What tenant should do instead if rejected, or null"
}

Examples:
- Lease says "Landlord shall maintain heating systems" → APPROVE heater repairs
- Lease says "Tenant responsible for appliance maintenance" → REJECT appliance repairs
- Lease does not mention the issue → APPROVE

Write response_message as the landlord speaking to the tenant. Return ONLY the JSON object."#,
    );
    prompt
}

pub fn vendor_work_order_prompt(request: &str, lease_text: &str, notes: Option<&str>) -> String {
    format!(
        r#"You are creating a professional work order for a vendor or contractor to fix a maintenance issue.

{request_block}
LEASE DOCUMENT (for property details):
{text}

INSTRUCTIONS:
1. Urgency level:
   - "emergency": safety issues, no heat/AC in extreme weather, major leaks, no water
   - "urgent": significant issues needing quick attention (broken appliances, minor leaks)
   - "routine": non-urgent maintenance
2. The description is for the VENDOR. Include the specific issue, property address and unit,
   scope of work, access instructions, tenant contact for coordination, landlord notes and any
   safety concerns. Do NOT include rent, deposits, lease dates or any other financial or legal terms.

IMPORTANT: Return ONLY valid JSON. Do not include any text before or after the JSON.

{{
  "work_order_title": "Brief title (e.g., 'Heater Repair - Unit 123')",
  "comprehensive_description": "Vendor-focused description (4-6 sentences)",
  "urgency_level": "routine|urgent|emergency"
}}"#,
        request_block = request_and_notes(request, notes, "LANDLORD'S NOTES/CONTEXT"),
        text = head(lease_text, ASSISTANT_TEXT_LIMIT),
    )
}

pub fn maintenance_workflow_prompt(request: &str, lease_text: &str, notes: Option<&str>) -> String {
    format!(
        r#"You are a property management assistant handling a complete maintenance workflow.

{request_block}
LEASE DOCUMENT:
{text}

YOUR TASKS:
1. EVALUATE the request against the lease: APPROVE if the landlord is responsible or the lease is
   unclear, REJECT if the lease clearly makes the tenant responsible. Cite exact lease clauses.
2. WRITE a professional message to the TENANT explaining the decision, with a timeline if
   approved or next steps if rejected.
3. CREATE a vendor work order ONLY if approved; otherwise set vendor_work_order to null.

Return ONLY valid JSON:
{{
  "decision": "approved" or "rejected",
  "decision_reasons": ["Reason 1 based on lease", "Reason 2"],
  "lease_clauses_cited": ["Exact lease clause 1", "Exact lease clause 2"],
  "tenant_message": "Message to the tenant (3-5 sentences)",
  "tenant_message_tone": "approved|regretful|informative",
  "estimated_timeline": "e.g. '24-48 hours', or null if rejected",
  "alternative_action": "What tenant should do if rejected, or null if approved",
  "vendor_work_order": {{
    "work_order_title": "Brief title",
    "comprehensive_description": "Issue, property address, scope, access, tenant contact. NO financial info.",
    "urgency_level": "routine|urgent|emergency"
  }} OR null if rejected
}}"#,
        request_block = request_and_notes(request, notes, "LANDLORD'S NOTES/CONTEXT"),
        text = head(lease_text, ASSISTANT_TEXT_LIMIT),
    )
}

// ── Tenant communication ─────────────────────────────────────────────────

pub const REWRITE_SYSTEM_PROMPT: &str = "You help tenants write clear, professional maintenance \
requests to their landlord without changing what they are reporting.";

pub const MOVE_OUT_SYSTEM_PROMPT: &str = "You are a property owner evaluating a tenant's move-out \
request. Check if they provided proper notice according to the lease, calculate any financial \
obligations, and provide clear next steps.";

pub fn tenant_rewrite_prompt(message: &str) -> String {
    format!(
        r#"You are helping a tenant communicate a maintenance issue to their landlord.

TENANT'S ORIGINAL MESSAGE:
{message}

Rewrite this message to be professional, clear and effective while keeping the tenant's intent.
1. Keep it polite; structure it as greeting, issue description, impact or urgency, closing
2. Make the problem specific; add where, since when and how severe when the original is vague
3. Urgency: "emergency" (safety, no heat/AC in extreme weather, major leaks, no water, broken locks),
   "urgent" (broken appliances, minor leaks, no hot water), "routine" (cosmetic or minor repairs)
4. List the improvements you made

IMPORTANT: Return ONLY valid JSON. Do not include any text before or after the JSON.

{{
  "rewritten_message": "Professional rewritten message (3-6 sentences)",
  "improvements_made": ["Added specific details", "Improved clarity"],
  "tone": "professional|urgent|polite|concerned",
  "estimated_urgency": "routine|urgent|emergency"
}}

Example: "heater broke" → "Hello, I wanted to report that the heating system in my unit stopped working as of this morning. ..." (urgent)"#
    )
}

pub fn move_out_prompt(request: &str, lease_text: &str, notes: Option<&str>, today: NaiveDate) -> String {
    let today = today.format("%B %d, %Y").to_string();
    let mut prompt = format!(
        "You are a property owner evaluating a tenant's move-out request. Review the lease and determine:\n\
         1. If the tenant provided proper notice according to the lease\n\
         2. What financial obligations remain (rent, fees, security deposit)\n\
         3. Clear next steps for the tenant\n\n\
         TODAY'S DATE: {today}\n\
         IMPORTANT: Use this date to calculate notice periods.\n\n\
         MOVE-OUT REQUEST FROM TENANT:\n{request}\n"
    );
    if let Some(notes) = notes {
        prompt.push_str(&format!(
            "\nPROPERTY OWNER'S NOTES:\n{notes}\n\n\
             NOTE: Consider the owner's notes in the response, but base the evaluation on the lease.\n"
        ));
    }
    prompt.push_str(&format!(
        r#"
LEASE DOCUMENT:
{text}

INSTRUCTIONS:
1. Find the required notice period, notice method, rent owed during the notice period, security
   deposit return conditions, move-out fees and early termination clauses.
2. A request to move out on a date is notice given TODAY ({today}).
3. Dates without a year are in the current year, or next year if that date has already passed.
4. Count calendar days from today to the requested date. If that is at least the required notice
   period, notice_period_valid is true; otherwise false.
5. Cite EXACT lease clauses and write a professional response as the owner.

Example (if today were March 1, 2026): "moving out April 15", lease requires 30 days →
45 calendar days ≥ 30 → notice_period_valid = true.

IMPORTANT: Return ONLY valid JSON. Do not include any text before or after the JSON.

{{
  "notice_period_valid": true or false,
  "notice_period_required": "e.g. '30 days'",
  "notice_period_provided": "e.g. '45 days notice, given {today}'",
  "last_day_allowed": "Last day the tenant can occupy the property",
  "rent_owed": "Remaining rent owed, prorated if needed",
  "security_deposit_status": "What will happen with the security deposit",
  "other_fees": "Any other fees or charges",
  "lease_clauses_cited": ["Exact quote from lease clause 1"],
  "response_message": "Message to the tenant (3-5 sentences)",
  "next_steps": ["Action item 1", "Action item 2"]
}}"#,
        text = head(lease_text, ASSISTANT_TEXT_LIMIT),
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(i: usize) -> SearchResult {
        SearchResult {
            title: format!("Law {i}"),
            url: format!("https://law{i}.gov"),
            snippet: "text".into(),
            is_gov: true,
        }
    }

    #[test]
    fn head_cuts_on_char_boundary() {
        assert_eq!(head("héllo", 2), "hé");
        assert_eq!(head("abc", 10), "abc");
    }

    #[test]
    fn native_prompt_truncates_lease() {
        let lease = "x".repeat(ANALYSIS_TEXT_LIMIT + 500);
        let prompt = native_search_analysis_prompt(&lease);
        assert!(prompt.contains(&"x".repeat(ANALYSIS_TEXT_LIMIT)));
        assert!(!prompt.contains(&"x".repeat(ANALYSIS_TEXT_LIMIT + 1)));
        assert!(prompt.contains("Search the web"));
        assert!(prompt.contains("\"lease_info\""));
    }

    #[test]
    fn search_prompt_lists_at_most_ten_results() {
        let results: Vec<_> = (1..=12).map(result).collect();
        let prompt = search_results_analysis_prompt("lease", &results);
        assert!(prompt.contains("RELEVANT LAW SEARCH RESULTS (from DuckDuckGo):"));
        assert!(prompt.contains("\n10. Law 10\n   URL: https://law10.gov\n"));
        assert!(!prompt.contains("11. Law 11"));
        assert!(search_results_analysis_prompt("lease", &[]).contains("No search results provided."));
    }

    #[test]
    fn notes_only_appear_when_given() {
        let with = maintenance_evaluation_prompt("Heater broken", "lease", Some("Fixed last week"));
        assert!(with.contains("LANDLORD'S NOTES/CONTEXT:\nFixed last week"));
        let without = maintenance_evaluation_prompt("Heater broken", "lease", None);
        assert!(!without.contains("LANDLORD'S NOTES"));
    }

    #[test]
    fn move_out_prompt_carries_today() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let prompt = move_out_prompt("Leaving Dec 1", "lease", None, today);
        assert!(prompt.contains("TODAY'S DATE: October 18, 2026"));
        assert!(!prompt.contains("OWNER'S NOTES"));
    }
}

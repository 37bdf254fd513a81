//! Prompt text for sliding-window lease extraction.

use crate::pipeline::window::WindowContext;

/// Output schema and formatting rules shown to the model.
pub const SCHEMA_DEFINITION: &str = r#"**OUTPUT SCHEMA (STRICT - MUST MATCH EXACTLY)**

Return ONLY valid JSON matching this exact structure:

{
  "utility_responsibilities": [
    {
      "utility_name": "string",
      "responsible": "Tenant | Owner",
      "frequency": "Weekly | Bi-Weekly | Monthly | Quarterly | Bi-Annually | Annually | As Needed | One-time | On Demand | Per Occurrence",
      "charges": {"type": "Amount | Percentage", "amount_value": number | null, "percentage": number | null, "base_amount": number | null}
    }
  ],
  "common_area_maintenance": [
    {
      "area_name": "string",
      "responsible": "Tenant | Owner",
      "frequency": "<same values as above>",
      "charges": {"type": "Amount | Percentage", "amount_value": number | null, "percentage": number | null, "base_amount": number | null}
    }
  ],
  "additional_fees": [
    {
      "fee_name": "string",
      "responsible": "Tenant | Owner",
      "frequency": "<same values as above>",
      "charges": {"type": "Amount | Percentage", "amount_value": number | null, "percentage": number | null, "base_amount": number | null}
    }
  ],
  "tenant_improvements": [
    {
      "improvement_item": "string",
      "responsible": "Tenant | Owner",
      "amount": number | null,
      "balance": number | null,
      "recovery_method": "Monthly Amortization | One-time Charge | Rent uplift" | null
    }
  ],
  "term": {
    "lease_start_date": "YYYY-MM-DD",
    "lease_end_date": "YYYY-MM-DD",
    "lease_length": "string",
    "move_in_date": "YYYY-MM-DD",
    "renewal_options": "yes | no",
    "renewal_rent_increase": "string | number"
  },
  "rent_and_deposits": {
    "monthly_base_rent": number,
    "rent_due_date": "1st | 15th | 30th",
    "grace_period": number,
    "late_fee": {"type": "Amount | Percentage", "amount_value": number | null, "percentage": number | null, "base_amount": number | null},
    "security_deposit": number
  },
  "other_deposits": [{"label": "string", "amount": number}],
  "rent_increase_schedule": [
    {
      "start_date": "YYYY-MM-DD",
      "end_date": "YYYY-MM-DD",
      "base_rent": number,
      "frequency": "<same values as above>",
      "increase": {"type": "Amount | Percentage", "value": number | null, "percentage": number | null, "base_amount": number | null},
      "per_sqft_rate": number | null
    }
  ],
  "abatements_discounts": [
    {
      "event_type": "Abatements | Discounts | Waive Rent | Rent Credit | Rent Abatement | Free Rent",
      "start_date": "YYYY-MM-DD",
      "end_date": "YYYY-MM-DD",
      "discount_amount": number,
      "reason": "string"
    }
  ],
  "special_clauses": [{"description": "string"}],
  "nsf_fees": {"amount": number}
}

**CRITICAL RULES:**
1. Output ONLY valid JSON: no markdown, no code blocks, no commentary
2. Use null for missing values and [] for empty lists
3. For "Amount" charges set amount_value and leave percentage null
4. For "Percentage" charges set percentage and optionally base_amount
5. Extract ALL occurrences; every table row is its own array item
6. Dates use YYYY-MM-DD; numbers are numeric, not strings (except renewal_rent_increase)
7. "responsible" is exactly "Tenant" or "Owner"

Your response must start with { and end with }. Nothing else."#;

const EXTRACTION_INSTRUCTIONS: &str = r#"**EXTRACTION INSTRUCTIONS:**

You are extracting structured data from a commercial lease agreement.

**Context:**
- Window ID: {window_id}
- {window_description}
- Overlapping pages appear in more than one window; extract everything you see

**Your Task:**
1. Completeness comes first. Create an entry for every utility, CAM item and fee that is mentioned, even when the amount is unclear or TBD (use null amounts).
2. Scan for:
   - Utilities (electricity, water, gas, internet, trash, sewer, HVAC). If the tenant pays the provider directly, say so in utility_name. If the landlord pays, responsible="Owner".
   - CAM charges (cleaning, landscaping, parking, snow removal, property management). "Proportionate share" without a figure means type="Percentage" with null percentage.
   - Additional fees (admin, processing, insurance, taxes, parking, pet, amenity).
   - Tenant improvements (allowances, build-out costs) with recovery method.
   - Renewal options: set renewal_options="yes" when any renewal right exists and put the number of options, their length, notice period and rent method in renewal_rent_increase.
   - Rent: monthly_base_rent is MONTHLY DOLLARS. When only a per-square-foot rate is given, multiply it by the premises square footage (3,560 sq ft x $3.25 = 11573.00).
   - Security deposit, rent increase schedule (one entry per period), late fee, NSF fee, abatements and special clauses (use restrictions, holdover, termination rights, exclusivity, signage, parking).
3. Late fees are EITHER a flat amount OR a percentage, never both. "Greater of $100 or 10%" becomes type="Amount", amount_value=100.
4. Dates: lease_start_date is the commencement date, move_in_date is possession, lease_end_date is expiration.
5. Only use null when a value is truly absent from these pages.

**Examples:**
"Tenant shall pay $150/month for water and sewer"
→ {"utility_name": "Water and Sewer", "responsible": "Tenant", "frequency": "Monthly", "charges": {"type": "Amount", "amount_value": 150, "percentage": null, "base_amount": null}}

"Tenant's proportionate share of common area maintenance is 8.5% of total operating expenses"
→ {"area_name": "Common Area Maintenance", "responsible": "Tenant", "frequency": "Monthly", "charges": {"type": "Percentage", "amount_value": null, "percentage": 8.5, "base_amount": null}}

"Two (2) options to renew for five (5) years at 95% of fair market value, 180 days notice"
→ "renewal_options": "yes", "renewal_rent_increase": "Two 5-year options at 95% FMV, 180 days notice required""#;

/// Appended to the prompt when the first answer was not parseable JSON.
pub const STRICT_RETRY_SUFFIX: &str = "\n\nCRITICAL: Previous response had formatting issues. \
Output MUST be ONLY valid JSON. Start with { and end with }. \
Absolutely NO explanatory text before or after the JSON.";

/// Full prompt for one window.
pub fn build_extraction_prompt(window_text: &str, ctx: &WindowContext) -> String {
    let instructions = EXTRACTION_INSTRUCTIONS
        .replace("{window_id}", &ctx.window_id.to_string())
        .replace("{window_description}", &ctx.description());
    format!(
        "{SCHEMA_DEFINITION}\n\n{instructions}\n\n\
         **LEASE DOCUMENT (Pages {start}-{end}):**\n\n{window_text}\n\n\
         **NOW EXTRACT THE DATA AS JSON:**\n\n\
         Reminder: Output ONLY the JSON object. Start with {{ and end with }}. No other text.",
        start = ctx.start_page,
        end = ctx.end_page,
    )
}

pub fn build_retry_prompt(prompt: &str) -> String {
    format!("{prompt}{STRICT_RETRY_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::window::plan_windows;

    #[test]
    fn prompt_carries_window_position_and_text() {
        let w = plan_windows(15, 7, 2)[1];
        let prompt = build_extraction_prompt("=== PAGE 6 ===\nRent", &w.context(15));
        assert!(prompt.starts_with("**OUTPUT SCHEMA"));
        assert!(prompt.contains("Window ID: 1"));
        assert!(prompt.contains("MIDDLE section of the lease (pages 6-12 of 15)"));
        assert!(prompt.contains("**LEASE DOCUMENT (Pages 6-12):**\n\n=== PAGE 6 ===\nRent"));
        assert!(prompt.ends_with("Start with { and end with }. No other text."));
    }

    #[test]
    fn retry_prompt_appends_reminder() {
        let retry = build_retry_prompt("base");
        assert!(retry.starts_with("base\n\nCRITICAL"));
    }
}

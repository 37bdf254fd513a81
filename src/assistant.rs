//! Landlord and tenant assistants: maintenance decisions, vendor work
//! orders, move-out review and tenant message rewriting.
//!
//! Every call uses [`FREE_MODEL`] with a short answer budget. A provider
//! failure is returned as an error; an answer that is not usable JSON falls
//! back to a conservative default so the caller always gets a response.

use crate::config::FREE_MODEL;
use crate::error::LeaseAiError;
use crate::llm::{ModelClient, ModelRequest};
use crate::models::{
    MaintenanceEvaluation, MaintenanceWorkflow, MoveOutResponse, TenantMessageRewrite,
    VendorWorkOrder,
};
use crate::pipeline::postprocess::extract_json_object;
use crate::prompts;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: usize = 800;

const MAINTENANCE_FALLBACK_MESSAGE: &str = "We will review your maintenance request and respond shortly.";
const MOVE_OUT_FALLBACK_MESSAGE: &str = "We received your move-out request and will review it shortly.";

pub struct Assistant {
    client: Arc<dyn ModelClient>,
    model: String,
}

impl Assistant {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            model: FREE_MODEL.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One model call; `None` when the answer holds no JSON object.
    async fn ask(&self, task: &str, system: &str, prompt: String) -> Result<Option<Value>, LeaseAiError> {
        let request = ModelRequest::new(&self.model, prompt)
            .system(system)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS);
        let started = Instant::now();
        let completion = self.client.complete(&request).await?;
        debug!(
            "{}: {} answered in {:.2}s ({} in / {} out tokens)",
            task,
            self.model,
            started.elapsed().as_secs_f64(),
            completion.input_tokens,
            completion.output_tokens
        );
        let parsed = extract_json_object(&completion.text).filter(Value::is_object);
        if parsed.is_none() {
            error!("{}: no JSON object in model answer ({} chars)", task, completion.text.len());
        }
        Ok(parsed)
    }

    pub async fn evaluate_maintenance(
        &self,
        lease_text: &str,
        request: &str,
        landlord_notes: Option<&str>,
    ) -> Result<MaintenanceEvaluation, LeaseAiError> {
        info!("Evaluating maintenance request ({} chars)", request.len());
        let prompt = prompts::maintenance_evaluation_prompt(request, lease_text, landlord_notes);
        let answer = self
            .ask("maintenance", prompts::MAINTENANCE_SYSTEM_PROMPT, prompt)
            .await?;
        Ok(match answer {
            Some(data) => maintenance_from_json(&data, request),
            None => MaintenanceEvaluation {
                maintenance_request: request.to_string(),
                decision: "approved".into(),
                response_message: MAINTENANCE_FALLBACK_MESSAGE.into(),
                decision_reasons: vec!["Unable to parse lease evaluation".into()],
                lease_clauses_cited: Vec::new(),
                landlord_responsibility_clause: None,
                tenant_responsibility_clause: None,
                estimated_timeline: None,
                alternative_action: None,
            },
        })
    }

    pub async fn generate_vendor_work_order(
        &self,
        lease_text: &str,
        request: &str,
        landlord_notes: Option<&str>,
    ) -> Result<VendorWorkOrder, LeaseAiError> {
        info!("Generating vendor work order");
        let prompt = prompts::vendor_work_order_prompt(request, lease_text, landlord_notes);
        let answer = self.ask("vendor", prompts::VENDOR_SYSTEM_PROMPT, prompt).await?;
        Ok(match answer {
            Some(data) => work_order_from_json(&data, request),
            None => VendorWorkOrder {
                maintenance_request: request.to_string(),
                work_order_title: "Maintenance Request".into(),
                comprehensive_description: format!(
                    "Please address: {request}. Property details in lease."
                ),
                urgency_level: "routine".into(),
            },
        })
    }

    /// Decision, tenant message and (for approved requests) a work order in
    /// one call.
    pub async fn maintenance_workflow(
        &self,
        lease_text: &str,
        request: &str,
        landlord_notes: Option<&str>,
    ) -> Result<MaintenanceWorkflow, LeaseAiError> {
        info!("Running maintenance workflow");
        let prompt = prompts::maintenance_workflow_prompt(request, lease_text, landlord_notes);
        let answer = self.ask("workflow", prompts::WORKFLOW_SYSTEM_PROMPT, prompt).await?;
        Ok(match answer {
            Some(data) => workflow_from_json(&data, request),
            None => MaintenanceWorkflow {
                maintenance_request: request.to_string(),
                tenant_message: "We have received your maintenance request and will respond shortly."
                    .into(),
                tenant_message_tone: "neutral".into(),
                decision: "approved".into(),
                decision_reasons: vec!["Unable to parse evaluation".into()],
                lease_clauses_cited: Vec::new(),
                vendor_work_order: None,
                estimated_timeline: None,
                alternative_action: None,
            },
        })
    }

    pub async fn evaluate_move_out(
        &self,
        lease_text: &str,
        request: &str,
        owner_notes: Option<&str>,
    ) -> Result<MoveOutResponse, LeaseAiError> {
        self.evaluate_move_out_on(lease_text, request, owner_notes, Local::now().date_naive())
            .await
    }

    /// [`Self::evaluate_move_out`] with notice counted from `today`.
    pub async fn evaluate_move_out_on(
        &self,
        lease_text: &str,
        request: &str,
        owner_notes: Option<&str>,
        today: NaiveDate,
    ) -> Result<MoveOutResponse, LeaseAiError> {
        info!("Evaluating move-out request as of {}", today);
        let prompt = prompts::move_out_prompt(request, lease_text, owner_notes, today);
        let answer = self.ask("move-out", prompts::MOVE_OUT_SYSTEM_PROMPT, prompt).await?;
        Ok(match answer {
            Some(data) => move_out_from_json(&data, request),
            None => move_out_fallback(request),
        })
    }

    pub async fn rewrite_tenant_message(&self, message: &str) -> Result<TenantMessageRewrite, LeaseAiError> {
        info!("Rewriting tenant message ({} chars)", message.len());
        let prompt = prompts::tenant_rewrite_prompt(message);
        let answer = self.ask("rewrite", prompts::REWRITE_SYSTEM_PROMPT, prompt).await?;
        Ok(match answer {
            Some(data) => TenantMessageRewrite {
                original_message: message.to_string(),
                rewritten_message: text_or(&data, "rewritten_message", message),
                improvements_made: string_list(&data, "improvements_made"),
                tone: text_or(&data, "tone", "professional"),
                estimated_urgency: text_or(&data, "estimated_urgency", "routine"),
            },
            None => TenantMessageRewrite {
                original_message: message.to_string(),
                rewritten_message: message.to_string(),
                improvements_made: vec!["Unable to parse AI response".into()],
                tone: "original".into(),
                estimated_urgency: "routine".into(),
            },
        })
    }
}

// ── JSON field access ────────────────────────────────────────────────────

/// A scalar field as text; `null` and missing are `None`.
fn text(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn text_or(data: &Value, key: &str, default: &str) -> String {
    text(data, key).unwrap_or_else(|| default.to_string())
}

fn string_list(data: &Value, key: &str) -> Vec<String> {
    match data.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn flag(data: &Value, key: &str) -> bool {
    match data.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

// ── Answer mapping ───────────────────────────────────────────────────────

fn maintenance_from_json(data: &Value, request: &str) -> MaintenanceEvaluation {
    MaintenanceEvaluation {
        maintenance_request: request.to_string(),
        decision: text_or(data, "decision", "approved"),
        response_message: text_or(data, "response_message", "We will review your request."),
        decision_reasons: string_list(data, "decision_reasons"),
        lease_clauses_cited: string_list(data, "lease_clauses_cited"),
        landlord_responsibility_clause: text(data, "landlord_responsibility_clause"),
        tenant_responsibility_clause: text(data, "tenant_responsibility_clause"),
        estimated_timeline: text(data, "estimated_timeline"),
        alternative_action: text(data, "alternative_action"),
    }
}

fn work_order_from_json(data: &Value, request: &str) -> VendorWorkOrder {
    VendorWorkOrder {
        maintenance_request: request.to_string(),
        work_order_title: text_or(data, "work_order_title", "Maintenance Work Order"),
        comprehensive_description: text(data, "comprehensive_description")
            .unwrap_or_else(|| format!("Please address: {request}")),
        urgency_level: text_or(data, "urgency_level", "routine"),
    }
}

fn workflow_from_json(data: &Value, request: &str) -> MaintenanceWorkflow {
    let decision = text_or(data, "decision", "approved");
    let vendor_work_order = match data.get("vendor_work_order") {
        Some(order @ Value::Object(_)) if decision == "approved" => {
            Some(work_order_from_json(order, request))
        }
        _ => None,
    };
    MaintenanceWorkflow {
        maintenance_request: request.to_string(),
        tenant_message: text_or(
            data,
            "tenant_message",
            "We will review your request and respond shortly.",
        ),
        tenant_message_tone: text_or(data, "tenant_message_tone", "neutral"),
        decision,
        decision_reasons: string_list(data, "decision_reasons"),
        lease_clauses_cited: string_list(data, "lease_clauses_cited"),
        vendor_work_order,
        estimated_timeline: text(data, "estimated_timeline"),
        alternative_action: text(data, "alternative_action"),
    }
}

fn move_out_from_json(data: &Value, request: &str) -> MoveOutResponse {
    let notice_period_valid = flag(data, "notice_period_valid");
    let financial_summary = BTreeMap::from([
        ("rent_owed".to_string(), text_or(data, "rent_owed", "To be calculated")),
        (
            "security_deposit".to_string(),
            text_or(data, "security_deposit_status", "Will be reviewed"),
        ),
        ("other_fees".to_string(), text_or(data, "other_fees", "None specified")),
        ("last_day".to_string(), text_or(data, "last_day_allowed", "Unknown")),
    ]);
    let next_steps = match string_list(data, "next_steps") {
        steps if steps.is_empty() => vec!["We will respond within 2 business days".to_string()],
        steps => steps,
    };
    MoveOutResponse {
        move_out_request: request.to_string(),
        decision: if notice_period_valid { "approved" } else { "requires_attention" }.to_string(),
        response_message: text_or(data, "response_message", "We will review your move-out request."),
        notice_period_valid,
        notice_period_required: text(data, "notice_period_required"),
        notice_period_given: text(data, "notice_period_provided"),
        move_out_date: text(data, "last_day_allowed"),
        financial_summary,
        lease_clauses_cited: string_list(data, "lease_clauses_cited"),
        penalties_or_fees: None,
        next_steps,
        estimated_refund_timeline: None,
    }
}

fn move_out_fallback(request: &str) -> MoveOutResponse {
    MoveOutResponse {
        move_out_request: request.to_string(),
        decision: "requires_attention".into(),
        response_message: MOVE_OUT_FALLBACK_MESSAGE.into(),
        notice_period_valid: false,
        notice_period_required: Some("Unable to determine".into()),
        notice_period_given: Some("Unable to determine".into()),
        move_out_date: Some("Unknown".into()),
        financial_summary: BTreeMap::from([
            ("rent_owed".to_string(), "Unable to calculate".to_string()),
            ("security_deposit".to_string(), "Will be reviewed".to_string()),
            ("other_fees".to_string(), "None specified".to_string()),
        ]),
        lease_clauses_cited: Vec::new(),
        penalties_or_fees: None,
        next_steps: vec!["We will evaluate your request and respond within 2 business days".into()],
        estimated_refund_timeline: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::llm::testing::ScriptedClient;
    use crate::prompts::ASSISTANT_TEXT_LIMIT;

    const LEASE: &str = "Landlord shall maintain heating systems in good repair.";

    #[tokio::test]
    async fn maintenance_decision_is_read_from_fenced_json() {
        let client = ScriptedClient::always(
            "Here you go:\n```json\n{\"decision\": \"rejected\", \"response_message\": \"Sorry.\", \
             \"decision_reasons\": [\"Tenant maintains appliances\"], \"lease_clauses_cited\": [\"Section 9\"], \
             \"alternative_action\": \"Call a repair service\"}\n```",
        );
        let assistant = Assistant::new(client.clone());
        let eval = assistant
            .evaluate_maintenance(LEASE, "Dishwasher leaks", Some("Replaced last year"))
            .await
            .unwrap();
        assert_eq!(eval.decision, "rejected");
        assert_eq!(eval.decision_reasons, vec!["Tenant maintains appliances"]);
        assert_eq!(eval.alternative_action.as_deref(), Some("Call a repair service"));
        assert_eq!(eval.estimated_timeline, None);

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].model, FREE_MODEL);
        assert_eq!(requests[0].max_tokens, MAX_TOKENS);
        assert!(requests[0].prompt.contains("Replaced last year"));
    }

    #[tokio::test]
    async fn unparseable_maintenance_answer_defaults_to_approval() {
        let assistant = Assistant::new(ScriptedClient::always("I cannot decide."));
        let eval = assistant.evaluate_maintenance(LEASE, "Heater broken", None).await.unwrap();
        assert_eq!(eval.decision, "approved");
        assert_eq!(eval.response_message, MAINTENANCE_FALLBACK_MESSAGE);
        assert_eq!(eval.decision_reasons, vec!["Unable to parse lease evaluation"]);
    }

    #[tokio::test]
    async fn model_failure_is_an_error() {
        let assistant = Assistant::new(ScriptedClient::failing(ModelError::Timeout { secs: 60 }));
        let err = assistant.evaluate_maintenance(LEASE, "Heater broken", None).await.unwrap_err();
        assert!(matches!(err, LeaseAiError::AiTimeout { secs: 60 }));
    }

    #[tokio::test]
    async fn vendor_fallback_mentions_request() {
        let assistant = Assistant::new(ScriptedClient::always("no json"));
        let order = assistant
            .generate_vendor_work_order(LEASE, "Heater broken", None)
            .await
            .unwrap();
        assert_eq!(order.work_order_title, "Maintenance Request");
        assert_eq!(
            order.comprehensive_description,
            "Please address: Heater broken. Property details in lease."
        );
        assert_eq!(order.urgency_level, "routine");
    }

    #[tokio::test]
    async fn rejected_workflow_drops_work_order() {
        let assistant = Assistant::new(ScriptedClient::always(
            r#"{"decision": "rejected", "tenant_message": "Not covered.",
                "vendor_work_order": {"work_order_title": "Fix", "comprehensive_description": "x", "urgency_level": "urgent"}}"#,
        ));
        let flow = assistant.maintenance_workflow(LEASE, "Broken blinds", None).await.unwrap();
        assert_eq!(flow.decision, "rejected");
        assert!(flow.vendor_work_order.is_none());
        assert_eq!(flow.tenant_message_tone, "neutral");
    }

    #[tokio::test]
    async fn approved_workflow_keeps_work_order() {
        let assistant = Assistant::new(ScriptedClient::always(
            r#"{"decision": "approved", "tenant_message": "On it.", "tenant_message_tone": "approved",
                "estimated_timeline": "24-48 hours",
                "vendor_work_order": {"work_order_title": "Heater Repair - Unit 4", "urgency_level": "urgent"}}"#,
        ));
        let flow = assistant.maintenance_workflow(LEASE, "Heater broken", None).await.unwrap();
        let order = flow.vendor_work_order.unwrap();
        assert_eq!(order.work_order_title, "Heater Repair - Unit 4");
        assert_eq!(order.comprehensive_description, "Please address: Heater broken");
        assert_eq!(order.maintenance_request, "Heater broken");
    }

    #[tokio::test]
    async fn move_out_decision_follows_notice_validity() {
        let assistant = Assistant::new(ScriptedClient::always(
            r#"{"notice_period_valid": true, "notice_period_required": "30 days",
                "notice_period_provided": "44 days", "last_day_allowed": "December 1, 2026",
                "rent_owed": "$0", "security_deposit_status": "Returned within 30 days",
                "next_steps": ["Schedule inspection"]}"#,
        ));
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let resp = assistant
            .evaluate_move_out_on(LEASE, "Moving out December 1", None, today)
            .await
            .unwrap();
        assert_eq!(resp.decision, "approved");
        assert_eq!(resp.notice_period_given.as_deref(), Some("44 days"));
        assert_eq!(resp.move_out_date.as_deref(), Some("December 1, 2026"));
        assert_eq!(resp.financial_summary["last_day"], "December 1, 2026");
        assert_eq!(resp.financial_summary["other_fees"], "None specified");
        assert_eq!(resp.next_steps, vec!["Schedule inspection"]);
    }

    #[tokio::test]
    async fn move_out_fallback_requires_attention() {
        let assistant = Assistant::new(ScriptedClient::always("sorry"));
        let resp = assistant.evaluate_move_out(LEASE, "Leaving soon", None).await.unwrap();
        assert_eq!(resp.decision, "requires_attention");
        assert!(!resp.notice_period_valid);
        assert_eq!(resp.financial_summary.len(), 3);
    }

    #[tokio::test]
    async fn rewrite_falls_back_to_original() {
        let assistant = Assistant::new(ScriptedClient::always("plain text"));
        let out = assistant.rewrite_tenant_message("heater broke").await.unwrap();
        assert_eq!(out.rewritten_message, "heater broke");
        assert_eq!(out.tone, "original");
        assert_eq!(out.estimated_urgency, "routine");
    }

    #[tokio::test]
    async fn lease_text_is_truncated_for_assistants() {
        let client = ScriptedClient::always("{}");
        let assistant = Assistant::new(client.clone());
        let lease = "y".repeat(ASSISTANT_TEXT_LIMIT * 2);
        assistant.evaluate_maintenance(&lease, "Sink clogged", None).await.unwrap();
        let prompt = &client.requests.lock().unwrap()[0].prompt;
        assert!(!prompt.contains(&"y".repeat(ASSISTANT_TEXT_LIMIT + 1)));
    }
}

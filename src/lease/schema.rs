//! Typed lease extraction schema.
//!
//! Models answer in loose JSON. [`clean_lease_data`] turns the merged answer
//! into [`LeaseData`] one item at a time: an invalid array item is dropped,
//! an invalid single object becomes `None`, and everything else survives.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// ── Enumerations ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeType {
    Amount,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Weekly,
    #[serde(rename = "Bi-Weekly")]
    BiWeekly,
    Monthly,
    Quarterly,
    #[serde(rename = "Bi-Annually")]
    BiAnnually,
    Annually,
    #[serde(rename = "As Needed")]
    AsNeeded,
    #[serde(rename = "One-time")]
    OneTime,
    #[serde(rename = "On Demand")]
    OnDemand,
    #[serde(rename = "Per Occurrence")]
    PerOccurrence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Responsible {
    Tenant,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryMethod {
    #[serde(rename = "Monthly Amortization")]
    MonthlyAmortization,
    #[serde(rename = "One-time Charge")]
    OneTimeCharge,
    #[serde(rename = "Rent uplift")]
    RentUplift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenewalOption {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentDueDate {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "15th")]
    Fifteenth,
    #[serde(rename = "30th")]
    Thirtieth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbatementEventType {
    Abatements,
    Discounts,
    #[serde(rename = "Waive Rent")]
    WaiveRent,
    #[serde(rename = "Rent Credit")]
    RentCredit,
    #[serde(rename = "Rent Abatement")]
    RentAbatement,
    #[serde(rename = "Free Rent")]
    FreeRent,
}

// ── Lenient scalars ──────────────────────────────────────────────────────

/// Accept `1500`, `1500.0`, `"1500"` or `"$1,500.00"`.
fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => {
            let cleaned: String = s.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned
                .parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("not a number: {s:?}")))
        }
        Some(other) => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    opt_number(d)?.ok_or_else(|| de::Error::custom("amount is required"))
}

/// Whole days; `5.0` is accepted, `5.5` is not.
fn opt_whole<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match opt_number(d)? {
        None => Ok(None),
        Some(v) if v.fract() == 0.0 => Ok(Some(v as i64)),
        Some(v) => Err(de::Error::custom(format!("expected a whole number, got {v}"))),
    }
}

/// `"5% annually"` or `5`.
fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("expected text, got {other}"))),
    }
}

fn check_non_negative(field: &str, v: Option<f64>) -> Result<(), String> {
    match v {
        Some(x) if x < 0.0 => Err(format!("{field} must be non-negative (got {x})")),
        _ => Ok(()),
    }
}

// ── Records ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charges {
    #[serde(rename = "type")]
    pub charge_type: ChargeType,
    #[serde(default, deserialize_with = "opt_number")]
    pub amount_value: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub percentage: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub base_amount: Option<f64>,
}

impl Charges {
    fn validate(&self) -> Result<(), String> {
        check_non_negative("amount_value", self.amount_value)?;
        check_non_negative("percentage", self.percentage)?;
        check_non_negative("base_amount", self.base_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityResponsibility {
    pub utility_name: String,
    pub responsible: Responsible,
    pub frequency: Frequency,
    pub charges: Charges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonAreaMaintenance {
    pub area_name: String,
    pub responsible: Responsible,
    pub frequency: Frequency,
    pub charges: Charges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalFee {
    pub fee_name: String,
    pub responsible: Responsible,
    pub frequency: Frequency,
    pub charges: Charges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantImprovement {
    pub improvement_item: String,
    pub responsible: Responsible,
    #[serde(default, deserialize_with = "opt_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub balance: Option<f64>,
    #[serde(default)]
    pub recovery_method: Option<RecoveryMethod>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Term {
    /// YYYY-MM-DD.
    pub lease_start_date: Option<String>,
    pub lease_end_date: Option<String>,
    pub lease_length: Option<String>,
    pub move_in_date: Option<String>,
    pub renewal_options: Option<RenewalOption>,
    #[serde(deserialize_with = "opt_text")]
    pub renewal_rent_increase: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LateFee {
    #[serde(rename = "type")]
    pub charge_type: Option<ChargeType>,
    #[serde(deserialize_with = "opt_number")]
    pub amount_value: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub percentage: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub base_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentAndDeposits {
    #[serde(deserialize_with = "opt_number")]
    pub monthly_base_rent: Option<f64>,
    pub rent_due_date: Option<RentDueDate>,
    /// Days.
    #[serde(deserialize_with = "opt_whole")]
    pub grace_period: Option<i64>,
    pub late_fee: Option<LateFee>,
    #[serde(deserialize_with = "opt_number")]
    pub security_deposit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherDeposit {
    pub label: String,
    #[serde(deserialize_with = "number")]
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentIncrease {
    #[serde(rename = "type")]
    pub charge_type: Option<ChargeType>,
    #[serde(deserialize_with = "opt_number")]
    pub value: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub percentage: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub base_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentIncreaseSchedule {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(deserialize_with = "opt_number")]
    pub base_rent: Option<f64>,
    pub frequency: Option<Frequency>,
    pub increase: Option<RentIncrease>,
    #[serde(deserialize_with = "opt_number")]
    pub per_sqft_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbatementDiscount {
    pub event_type: AbatementEventType,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "opt_number")]
    pub discount_amount: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialClause {
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NsfFees {
    #[serde(deserialize_with = "opt_number")]
    pub amount: Option<f64>,
}

/// Everything extracted from one lease.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaseData {
    pub utility_responsibilities: Vec<UtilityResponsibility>,
    pub common_area_maintenance: Vec<CommonAreaMaintenance>,
    pub additional_fees: Vec<AdditionalFee>,
    pub tenant_improvements: Vec<TenantImprovement>,
    pub term: Option<Term>,
    pub rent_and_deposits: Option<RentAndDeposits>,
    pub other_deposits: Vec<OtherDeposit>,
    pub rent_increase_schedule: Vec<RentIncreaseSchedule>,
    pub abatements_discounts: Vec<AbatementDiscount>,
    pub special_clauses: Vec<SpecialClause>,
    pub nsf_fees: Option<NsfFees>,
}

/// Array fields, in output order.
pub const ARRAY_FIELDS: [&str; 8] = [
    "utility_responsibilities",
    "common_area_maintenance",
    "additional_fees",
    "tenant_improvements",
    "other_deposits",
    "rent_increase_schedule",
    "abatements_discounts",
    "special_clauses",
];

/// Single-object fields.
pub const OBJECT_FIELDS: [&str; 3] = ["term", "rent_and_deposits", "nsf_fees"];

// ── Validation ───────────────────────────────────────────────────────────

trait Checked: Sized + for<'de> Deserialize<'de> {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Checked for UtilityResponsibility {
    fn check(&self) -> Result<(), String> {
        self.charges.validate()
    }
}

impl Checked for CommonAreaMaintenance {
    fn check(&self) -> Result<(), String> {
        self.charges.validate()
    }
}

impl Checked for AdditionalFee {
    fn check(&self) -> Result<(), String> {
        self.charges.validate()
    }
}

impl Checked for TenantImprovement {
    fn check(&self) -> Result<(), String> {
        check_non_negative("amount", self.amount)?;
        check_non_negative("balance", self.balance)
    }
}

impl Checked for OtherDeposit {
    fn check(&self) -> Result<(), String> {
        check_non_negative("amount", Some(self.amount))
    }
}

impl LateFee {
    fn validate(&self) -> Result<(), String> {
        check_non_negative("late_fee.amount_value", self.amount_value)?;
        check_non_negative("late_fee.percentage", self.percentage)?;
        check_non_negative("late_fee.base_amount", self.base_amount)
    }
}

impl RentIncrease {
    fn validate(&self) -> Result<(), String> {
        check_non_negative("increase.value", self.value)?;
        check_non_negative("increase.percentage", self.percentage)?;
        check_non_negative("increase.base_amount", self.base_amount)
    }
}

impl Checked for RentIncreaseSchedule {
    fn check(&self) -> Result<(), String> {
        check_non_negative("base_rent", self.base_rent)?;
        check_non_negative("per_sqft_rate", self.per_sqft_rate)?;
        self.increase.as_ref().map_or(Ok(()), RentIncrease::validate)
    }
}

impl Checked for AbatementDiscount {
    fn check(&self) -> Result<(), String> {
        check_non_negative("discount_amount", self.discount_amount)
    }
}

impl Checked for SpecialClause {}
impl Checked for Term {}

impl Checked for RentAndDeposits {
    fn check(&self) -> Result<(), String> {
        check_non_negative("monthly_base_rent", self.monthly_base_rent)?;
        check_non_negative("security_deposit", self.security_deposit)?;
        self.late_fee.as_ref().map_or(Ok(()), LateFee::validate)
    }
}

impl Checked for NsfFees {
    fn check(&self) -> Result<(), String> {
        check_non_negative("amount", self.amount)
    }
}

fn parse_item<T: Checked>(value: Value) -> Result<T, String> {
    let item: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
    item.check()?;
    Ok(item)
}

fn clean_array<T: Checked>(root: &Value, field: &str, dropped: &mut Vec<String>) -> Vec<T> {
    let Some(items) = root.get(field).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match parse_item::<T>(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Removed invalid item from {}[{}]: {}", field, i, e);
                dropped.push(format!("{field}[{i}]: {e}"));
                None
            }
        })
        .collect()
}

fn clean_object<T: Checked>(root: &Value, field: &str, dropped: &mut Vec<String>) -> Option<T> {
    let value = root.get(field)?;
    if value.is_null() {
        return None;
    }
    match parse_item::<T>(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Set {} to None: {}", field, e);
            dropped.push(format!("{field}: {e}"));
            None
        }
    }
}

/// Validate merged JSON into [`LeaseData`], returning what was discarded.
pub fn clean_lease_data(root: &Value) -> (LeaseData, Vec<String>) {
    let mut dropped = Vec::new();
    let data = LeaseData {
        utility_responsibilities: clean_array(root, "utility_responsibilities", &mut dropped),
        common_area_maintenance: clean_array(root, "common_area_maintenance", &mut dropped),
        additional_fees: clean_array(root, "additional_fees", &mut dropped),
        tenant_improvements: clean_array(root, "tenant_improvements", &mut dropped),
        term: clean_object(root, "term", &mut dropped),
        rent_and_deposits: clean_object(root, "rent_and_deposits", &mut dropped),
        other_deposits: clean_array(root, "other_deposits", &mut dropped),
        rent_increase_schedule: clean_array(root, "rent_increase_schedule", &mut dropped),
        abatements_discounts: clean_array(root, "abatements_discounts", &mut dropped),
        special_clauses: clean_array(root, "special_clauses", &mut dropped),
        nsf_fees: clean_object(root, "nsf_fees", &mut dropped),
    };
    (data, dropped)
}

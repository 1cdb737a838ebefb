use super::currency::Currency;
use super::recommendation::Recommendation;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One sustainability metric, e.g. `carbon_footprint` in kg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SustainabilityMetric {
    pub value: Decimal,
    pub unit: String,
}

/// Produced by the engine per `(resource, plugin)` pair (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostResult {
    pub resource_type: String,
    pub resource_id: String,

    /// Identifier of the plugin that produced this result.
    pub source: String,

    pub currency: Currency,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Decimal>,

    #[serde(default)]
    pub breakdown: BTreeMap<String, Decimal>,

    #[serde(default)]
    pub sustainability: BTreeMap<String, SustainabilityMetric>,

    #[serde(default)]
    pub recommendations: Vec<Recommendation>,

    #[serde(default)]
    pub notes: Vec<String>,
}

impl CostResult {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>, source: impl Into<String>, currency: Currency) -> Self {
        CostResult {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            source: source.into(),
            currency,
            monthly: None,
            hourly: None,
            total_cost: None,
            start_date: None,
            end_date: None,
            delta: None,
            breakdown: BTreeMap::new(),
            sustainability: BTreeMap::new(),
            recommendations: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Build an `ERROR:`-annotated zero-cost result for resource-level
    /// failure isolation (spec.md §4.3 "Resource-level error isolation").
    pub fn error(resource_type: impl Into<String>, resource_id: impl Into<String>, source: impl Into<String>, currency: Currency, message: impl Into<String>) -> Self {
        let mut result = CostResult::new(resource_type, resource_id, source, currency);
        result.notes.push(format!("ERROR: {}", message.into()));
        result
    }

    pub fn is_error(&self) -> bool {
        self.notes.iter().any(|n| n.starts_with("ERROR:"))
    }

    /// True when the result has no cost at all: mutually exclusive with
    /// being a valid explicit-zero answer only via `notes` (spec.md §3.3
    /// invariant — consumers distinguish via `Notes`).
    pub fn is_zero_cost(&self) -> bool {
        self.monthly.unwrap_or(Decimal::ZERO) == Decimal::ZERO
            && self.total_cost.unwrap_or(Decimal::ZERO) == Decimal::ZERO
    }

    pub fn with_monthly(mut self, monthly: Decimal) -> Self {
        self.monthly = Some(monthly);
        self
    }

    pub fn with_total_cost(mut self, total: Decimal, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.total_cost = Some(total);
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    #[test]
    fn zero_cost_without_error_note_is_a_valid_zero() {
        let r = CostResult::new("aws:x", "id", "plugin", usd()).with_monthly(dec!(0));
        assert!(r.is_zero_cost());
        assert!(!r.is_error());
    }

    #[test]
    fn error_result_carries_error_prefixed_note() {
        let r = CostResult::error("aws:x", "id", "plugin", usd(), "boom");
        assert!(r.is_error());
        assert!(r.is_zero_cost());
        assert_eq!(r.notes[0], "ERROR: boom");
    }
}

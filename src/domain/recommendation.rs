use super::currency::Currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a recommendation (spec.md §3.4, §3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Active,
    Dismissed,
    Snoozed,
}

/// A single optimization suggestion attached to a resource's cost result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Opaque plugin-assigned identifier, stable across runs so the
    /// dismissal store can key on it.
    pub id: String,

    /// Short action tag, e.g. `RIGHTSIZE`, `TERMINATE`, `MIGRATE`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Single-line human-readable summary.
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_savings: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,

    pub status: RecommendationStatus,

    /// Caveats or warnings surfaced verbatim beneath the description.
    #[serde(default)]
    pub reasoning: Vec<String>,
}

impl Recommendation {
    pub fn new(id: impl Into<String>, type_: impl Into<String>, description: impl Into<String>) -> Self {
        Recommendation {
            id: id.into(),
            type_: type_.into(),
            description: description.into(),
            estimated_savings: None,
            currency: None,
            status: RecommendationStatus::Active,
            reasoning: Vec::new(),
        }
    }

    pub fn with_savings(mut self, savings: Decimal, currency: Currency) -> Self {
        self.estimated_savings = Some(savings);
        self.currency = Some(currency);
        self
    }
}

/// Stable sort by estimated savings descending, ties preserving insertion
/// order (spec.md §4.3 aggregation pass, step 3).
pub fn sort_by_savings_desc(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| {
        let a_savings = a.estimated_savings.unwrap_or(Decimal::ZERO);
        let b_savings = b.estimated_savings.unwrap_or(Decimal::ZERO);
        b_savings.cmp(&a_savings)
    });
}

/// A snapshot of a dismissed recommendation's display-relevant fields,
/// preserved so it can be shown even after the plugin stops returning it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastKnown {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_savings: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(rename = "type")]
    pub type_: String,
    pub resource_id: String,
    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sort_descending_stable_on_ties() {
        let usd = Currency::new("USD").unwrap();
        let mut recs = vec![
            Recommendation::new("1", "RIGHTSIZE", "a").with_savings(dec!(10), usd.clone()),
            Recommendation::new("2", "TERMINATE", "b").with_savings(dec!(30), usd.clone()),
            Recommendation::new("3", "MIGRATE", "c").with_savings(dec!(30), usd.clone()),
            Recommendation::new("4", "RIGHTSIZE", "d"),
        ];
        sort_by_savings_desc(&mut recs);
        let ids: Vec<&str> = recs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1", "4"]);
    }
}

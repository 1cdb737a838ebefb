//! Output renderers — thin contract only (SPEC_FULL.md §4.9, component
//! C12). `ReportRow` is a flattened, renderer-agnostic view over one
//! `(ResourceDescriptor, CostResult)` pair; `to_json` and `to_table_rows`
//! are the only two projections the core provides. An interactive renderer
//! consumes `ReportRow` the same way; drawing the widget itself is out of
//! scope here.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::cost::CostResult;
use crate::domain::currency::Currency;
use crate::domain::resource::ResourceDescriptor;

/// One renderer-agnostic row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub resource_type: String,
    pub resource_id: String,
    pub provider: String,
    pub source: String,
    pub currency: Currency,
    pub monthly: Option<Decimal>,
    pub hourly: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    /// Description of the highest-savings recommendation, if any — results
    /// already carry recommendations pre-sorted by the engine's
    /// aggregation pass.
    pub top_recommendation: Option<String>,
    /// First note, so an `ERROR:`-prefixed annotation is visible without
    /// inspecting the full `CostResult`.
    pub note: Option<String>,
}

impl ReportRow {
    pub fn new(resource: &ResourceDescriptor, result: &CostResult) -> Self {
        ReportRow {
            resource_type: result.resource_type.clone(),
            resource_id: result.resource_id.clone(),
            provider: resource.provider.clone(),
            source: result.source.clone(),
            currency: result.currency.clone(),
            monthly: result.monthly,
            hourly: result.hourly,
            total_cost: result.total_cost,
            top_recommendation: result.recommendations.first().map(|r| r.description.clone()),
            note: result.notes.first().cloned(),
        }
    }
}

/// Pairs each result with its originating resource by `(ResourceType,
/// ResourceID)`. A result whose resource is absent from `resources` is
/// skipped — the engine never produces one for a descriptor it wasn't
/// given, but a caller assembling its own result set should not panic on
/// mismatched input.
pub fn to_table_rows(resources: &[ResourceDescriptor], results: &[CostResult]) -> Vec<ReportRow> {
    let by_key: HashMap<(&str, &str), &ResourceDescriptor> = resources.iter().map(|r| ((r.type_.as_str(), r.id.as_str()), r)).collect();

    results
        .iter()
        .filter_map(|result| {
            by_key
                .get(&(result.resource_type.as_str(), result.resource_id.as_str()))
                .map(|resource| ReportRow::new(resource, result))
        })
        .collect()
}

/// JSON-serialized rows, one array entry per `ReportRow`.
pub fn to_json(rows: &[ReportRow]) -> crate::error::Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Recommendation;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    #[test]
    fn to_table_rows_pairs_by_type_and_id() {
        let resources = vec![ResourceDescriptor::new("aws:ec2/instance:Instance", "r1", "aws")];
        let results = vec![CostResult::new("aws:ec2/instance:Instance", "r1", "plugin", usd()).with_monthly(dec!(10))];

        let rows = to_table_rows(&resources, &results);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].provider, "aws");
        assert_eq!(rows[0].monthly, Some(dec!(10)));
    }

    #[test]
    fn result_without_matching_resource_is_skipped() {
        let resources = vec![ResourceDescriptor::new("aws:ec2/instance:Instance", "r1", "aws")];
        let results = vec![CostResult::new("aws:ec2/instance:Instance", "r2", "plugin", usd())];

        assert!(to_table_rows(&resources, &results).is_empty());
    }

    #[test]
    fn top_recommendation_reflects_first_sorted_entry() {
        let resource = ResourceDescriptor::new("aws:ec2/instance:Instance", "r1", "aws");
        let mut result = CostResult::new("aws:ec2/instance:Instance", "r1", "plugin", usd());
        result.recommendations = vec![Recommendation::new("rec1", "RIGHTSIZE", "downsize to t3.small").with_savings(dec!(50), usd())];

        let row = ReportRow::new(&resource, &result);
        assert_eq!(row.top_recommendation.as_deref(), Some("downsize to t3.small"));
    }

    #[test]
    fn error_note_surfaces_on_the_row() {
        let resource = ResourceDescriptor::new("aws:ec2/instance:Instance", "r1", "aws");
        let result = CostResult::error("aws:ec2/instance:Instance", "r1", "plugin", usd(), "plugin unreachable");

        let row = ReportRow::new(&resource, &result);
        assert_eq!(row.note.as_deref(), Some("ERROR: plugin unreachable"));
    }

    #[test]
    fn to_json_produces_an_array() {
        let rows = vec![ReportRow {
            resource_type: "aws:ec2".to_string(),
            resource_id: "r1".to_string(),
            provider: "aws".to_string(),
            source: "plugin".to_string(),
            currency: usd(),
            monthly: Some(dec!(10)),
            hourly: None,
            total_cost: None,
            top_recommendation: None,
            note: None,
        }];
        let json = to_json(&rows).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed[0]["resourceId"], "r1");
    }
}

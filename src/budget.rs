//! Budget evaluation (spec.md §4.7, component C8): scope filtering, spend
//! computation, threshold alerts, and exit-code resolution. Runs downstream
//! of the engine's aggregated result set; never touches plugins or storage
//! itself.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::config::budget::{AlertType, BudgetsConfig, ScopedBudget, TagBudget};
use crate::domain::cost::CostResult;
use crate::domain::currency::Currency;
use crate::domain::resource::ResourceDescriptor;

/// One triggered alert (spec.md §4.7 step 4).
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetAlert {
    pub scope: String,
    pub alert_type: AlertType,
    pub threshold: Decimal,
    pub ratio: Decimal,
    pub spend: Decimal,
    pub amount: Decimal,
    pub currency: Currency,
}

/// Evaluation of one scope (global, provider, tag, or resource type).
#[derive(Debug, Clone)]
pub struct ScopeEvaluation {
    pub scope: String,
    pub actual_spend: Decimal,
    pub forecasted_spend: Decimal,
    pub amount: Decimal,
    pub currency: Currency,
    pub alerts: Vec<BudgetAlert>,
    exit_on_threshold: bool,
    exit_code: u16,
}

impl ScopeEvaluation {
    pub fn triggered(&self) -> bool {
        !self.alerts.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BudgetReport {
    pub scopes: Vec<ScopeEvaluation>,
    /// Tag-scope tie-break notices (spec.md §4.7 "Tag-scope precedence").
    pub warnings: Vec<String>,
}

impl BudgetReport {
    /// The effective process exit code directive, or `None` when nothing
    /// triggered an exit (spec.md §4.7 "Exit code"). When more than one
    /// triggered scope has `ExitOnThreshold=true`, the highest resolved
    /// exit code wins.
    pub fn exit_directive(&self) -> Option<u16> {
        self.scopes
            .iter()
            .filter(|s| s.exit_on_threshold && s.triggered())
            .map(|s| s.exit_code)
            .max()
    }

    pub fn all_alerts(&self) -> Vec<&BudgetAlert> {
        self.scopes.iter().flat_map(|s| s.alerts.iter()).collect()
    }
}

/// Reads a resource's tag map from its `tagsAll` property, falling back to
/// `tags` (spec.md §8 scenario 6 uses `tagsAll`; `tags` covers plan-sourced
/// resources that never go through state ingest's `tagsAll` injection).
fn resource_tags(resource: &ResourceDescriptor) -> Vec<(String, String)> {
    for key in ["tagsAll", "tags"] {
        if let Some(obj) = resource.properties.get(key).and_then(|v| v.as_object()) {
            return obj
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect();
        }
    }
    Vec::new()
}

/// Picks the winning tag budget for one resource: highest `priority`, ties
/// broken by selector string lexicographic order (spec.md §4.7 "Tag-scope
/// precedence"). Returns `None` when no selector matches.
fn winning_tag_budget<'a>(tags: &[(String, String)], budgets: &'a [TagBudget], warnings: &mut Vec<String>) -> Option<&'a TagBudget> {
    let mut candidates: Vec<&TagBudget> = budgets
        .iter()
        .filter(|b| tags.iter().any(|(k, v)| b.matches(k, v)))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.selector.cmp(&b.selector)));
    if candidates.len() > 1 && candidates[0].priority == candidates[1].priority {
        warnings.push(format!(
            "tag budgets '{}' and '{}' tie at priority {}; resolved to '{}' by lexicographic order",
            candidates[0].selector, candidates[1].selector, candidates[0].priority, candidates[0].selector
        ));
    }
    Some(candidates[0])
}

fn spend_for(result: &CostResult, is_projection: bool) -> Decimal {
    if is_projection {
        result.monthly.unwrap_or(Decimal::ZERO)
    } else {
        result.total_cost.unwrap_or(Decimal::ZERO)
    }
}

#[allow(clippy::too_many_arguments)]
fn evaluate_scope(
    scope: impl Into<String>,
    budget: &ScopedBudget,
    results: &[&CostResult],
    is_projection: bool,
    period_total_days: Decimal,
    days_elapsed_in_period: Decimal,
    default_exit_on_threshold: bool,
    default_exit_code: u16,
) -> ScopeEvaluation {
    let scope = scope.into();
    let actual_spend: Decimal = results.iter().map(|r| spend_for(r, is_projection)).sum();

    // Forecasted spend equals actual under projection; under actual-cost
    // evaluation it extrapolates spend-to-date across the rest of the
    // period (spec.md §4.7 step 3).
    let forecasted_spend = if is_projection || days_elapsed_in_period <= Decimal::ZERO {
        actual_spend
    } else {
        actual_spend * (period_total_days / days_elapsed_in_period)
    };

    let mut alerts = Vec::new();
    if budget.amount > Decimal::ZERO {
        for alert in &budget.alerts {
            let spend = match alert.alert_type {
                AlertType::Actual => actual_spend,
                AlertType::Forecasted => forecasted_spend,
            };
            let ratio = spend / budget.amount;
            if ratio >= alert.threshold / Decimal::from(100) {
                alerts.push(BudgetAlert {
                    scope: scope.clone(),
                    alert_type: alert.alert_type,
                    threshold: alert.threshold,
                    ratio,
                    spend,
                    amount: budget.amount,
                    currency: budget.currency.clone(),
                });
            }
        }
    }

    ScopeEvaluation {
        scope,
        actual_spend,
        forecasted_spend,
        amount: budget.amount,
        currency: budget.currency.clone(),
        exit_on_threshold: budget.exit_on_threshold.unwrap_or(default_exit_on_threshold),
        exit_code: budget.exit_code.unwrap_or(default_exit_code),
        alerts,
    }
}

/// Evaluate every configured scope against an aggregated result set
/// (spec.md §4.7). `is_projection` selects `Monthly` vs `TotalCost` as the
/// actual-spend basis. `days_elapsed_in_period` is the caller's current
/// position within `period_total_days` (e.g. day-of-month / days-in-month),
/// used only for the forecasted-spend extrapolation under actual-cost mode.
pub fn evaluate(
    config: &BudgetsConfig,
    results: &[CostResult],
    resources: &[ResourceDescriptor],
    is_projection: bool,
    period_total_days: Decimal,
    days_elapsed_in_period: Decimal,
) -> BudgetReport {
    let mut report = BudgetReport::default();
    let default_exit_on_threshold = config.exit_on_threshold.unwrap_or(false);
    let default_exit_code = config.exit_code.unwrap_or(1);

    let resource_by_id: HashMap<&str, &ResourceDescriptor> = resources.iter().map(|r| (r.id.as_str(), r)).collect();

    if let Some(global) = &config.global {
        let all: Vec<&CostResult> = results.iter().collect();
        report.scopes.push(evaluate_scope(
            "global",
            global,
            &all,
            is_projection,
            period_total_days,
            days_elapsed_in_period,
            default_exit_on_threshold,
            default_exit_code,
        ));
    }

    for (provider, budget) in &config.providers {
        let filtered: Vec<&CostResult> = results
            .iter()
            .filter(|r| resource_by_id.get(r.resource_id.as_str()).map(|res| res.provider == *provider).unwrap_or(false))
            .collect();
        report.scopes.push(evaluate_scope(
            format!("provider:{provider}"),
            budget,
            &filtered,
            is_projection,
            period_total_days,
            days_elapsed_in_period,
            default_exit_on_threshold,
            default_exit_code,
        ));
    }

    for (type_, budget) in &config.types {
        let filtered: Vec<&CostResult> = results.iter().filter(|r| &r.resource_type == type_).collect();
        report.scopes.push(evaluate_scope(
            format!("type:{type_}"),
            budget,
            &filtered,
            is_projection,
            period_total_days,
            days_elapsed_in_period,
            default_exit_on_threshold,
            default_exit_code,
        ));
    }

    if !config.tags.is_empty() {
        let mut resources_by_selector: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for resource in resources {
            let tags = resource_tags(resource);
            if tags.is_empty() {
                continue;
            }
            if let Some(winner) = winning_tag_budget(&tags, &config.tags, &mut report.warnings) {
                resources_by_selector.entry(winner.selector.as_str()).or_default().push(resource.id.as_str());
            }
        }

        for tag in &config.tags {
            let Some(ids) = resources_by_selector.get(tag.selector.as_str()) else {
                continue;
            };
            let filtered: Vec<&CostResult> = results.iter().filter(|r| ids.contains(&r.resource_id.as_str())).collect();
            report.scopes.push(evaluate_scope(
                format!("tag:{}", tag.selector),
                &tag.budget,
                &filtered,
                is_projection,
                period_total_days,
                days_elapsed_in_period,
                default_exit_on_threshold,
                default_exit_code,
            ));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::budget::AlertConfig;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn scoped(amount: Decimal, alerts: Vec<AlertConfig>) -> ScopedBudget {
        ScopedBudget {
            amount,
            currency: usd(),
            period: crate::config::budget::Period::Monthly,
            alerts,
            exit_on_threshold: None,
            exit_code: None,
        }
    }

    fn result(id: &str, resource_type: &str, monthly: Decimal) -> CostResult {
        CostResult::new(resource_type, id, "plugin", usd()).with_monthly(monthly)
    }

    #[test]
    fn global_scope_aggregates_all_results() {
        let config = BudgetsConfig {
            global: Some(scoped(dec!(100), vec![])),
            ..Default::default()
        };
        let results = vec![result("r1", "aws:ec2", dec!(40)), result("r2", "aws:ec2", dec!(60))];
        let report = evaluate(&config, &results, &[], true, dec!(30), dec!(30));
        assert_eq!(report.scopes[0].actual_spend, dec!(100));
    }

    #[test]
    fn alert_fires_when_ratio_meets_threshold() {
        let config = BudgetsConfig {
            global: Some(scoped(
                dec!(100),
                vec![AlertConfig {
                    threshold: dec!(80),
                    alert_type: AlertType::Actual,
                }],
            )),
            ..Default::default()
        };
        let results = vec![result("r1", "aws:ec2", dec!(85))];
        let report = evaluate(&config, &results, &[], true, dec!(30), dec!(30));
        assert_eq!(report.scopes[0].alerts.len(), 1);
        assert_eq!(report.scopes[0].alerts[0].ratio, dec!(0.85));
    }

    #[test]
    fn alert_does_not_fire_below_threshold() {
        let config = BudgetsConfig {
            global: Some(scoped(
                dec!(100),
                vec![AlertConfig {
                    threshold: dec!(80),
                    alert_type: AlertType::Actual,
                }],
            )),
            ..Default::default()
        };
        let results = vec![result("r1", "aws:ec2", dec!(50))];
        let report = evaluate(&config, &results, &[], true, dec!(30), dec!(30));
        assert!(report.scopes[0].alerts.is_empty());
    }

    #[test]
    fn provider_scope_filters_by_resource_provider() {
        let mut config = BudgetsConfig {
            global: Some(scoped(dec!(1000), vec![])),
            ..Default::default()
        };
        config.providers.insert("aws".to_string(), scoped(dec!(50), vec![]));

        let resources = vec![
            ResourceDescriptor::new("aws:ec2/instance:Instance", "r1", "aws"),
            ResourceDescriptor::new("gcp:compute/instance:Instance", "r2", "gcp"),
        ];
        let results = vec![result("r1", "aws:ec2/instance:Instance", dec!(40)), result("r2", "gcp:compute/instance:Instance", dec!(40))];

        let report = evaluate(&config, &results, &resources, true, dec!(30), dec!(30));
        let provider_scope = report.scopes.iter().find(|s| s.scope == "provider:aws").unwrap();
        assert_eq!(provider_scope.actual_spend, dec!(40));
    }

    #[test]
    fn forecasted_spend_extrapolates_under_actual_mode() {
        let config = BudgetsConfig {
            global: Some(scoped(dec!(1000), vec![])),
            ..Default::default()
        };
        let results = vec![result("r1", "aws:ec2", dec!(50))];
        // 10 days elapsed of a 30-day period: forecast = 50 * 30/10 = 150.
        let report = evaluate(&config, &results, &[], false, dec!(30), dec!(10));
        assert_eq!(report.scopes[0].forecasted_spend, dec!(150));
    }

    #[test]
    fn tag_scope_precedence_prefers_higher_priority() {
        let mut config = BudgetsConfig {
            global: Some(scoped(dec!(1000), vec![])),
            ..Default::default()
        };
        config.tags.push(TagBudget {
            selector: "env:production".to_string(),
            priority: 10,
            budget: scoped(dec!(50), vec![]),
        });
        config.tags.push(TagBudget {
            selector: "team:*".to_string(),
            priority: 1,
            budget: scoped(dec!(200), vec![]),
        });

        let mut resource = ResourceDescriptor::new("aws:ec2/instance:Instance", "r1", "aws");
        let mut tags = serde_json::Map::new();
        tags.insert("env".to_string(), serde_json::Value::String("production".to_string()));
        tags.insert("team".to_string(), serde_json::Value::String("platform".to_string()));
        resource.properties.insert(
            "tagsAll".to_string(),
            crate::domain::resource::PropertyValue(serde_json::Value::Object(tags)),
        );

        let results = vec![result("r1", "aws:ec2/instance:Instance", dec!(30))];
        let report = evaluate(&config, &results, &[resource], true, dec!(30), dec!(30));

        let production_scope = report.scopes.iter().find(|s| s.scope == "tag:env:production");
        assert!(production_scope.is_some());
        assert!(report.scopes.iter().all(|s| s.scope != "tag:team:*"));
    }

    #[test]
    fn exit_directive_is_none_when_nothing_triggers() {
        let config = BudgetsConfig {
            global: Some(scoped(
                dec!(100),
                vec![AlertConfig {
                    threshold: dec!(80),
                    alert_type: AlertType::Actual,
                }],
            )),
            ..Default::default()
        };
        let results = vec![result("r1", "aws:ec2", dec!(10))];
        let report = evaluate(&config, &results, &[], true, dec!(30), dec!(30));
        assert_eq!(report.exit_directive(), None);
    }

    #[test]
    fn exit_directive_uses_scope_override_when_triggered() {
        let mut global = scoped(
            dec!(100),
            vec![AlertConfig {
                threshold: dec!(50),
                alert_type: AlertType::Actual,
            }],
        );
        global.exit_on_threshold = Some(true);
        global.exit_code = Some(3);
        let config = BudgetsConfig {
            global: Some(global),
            ..Default::default()
        };
        let results = vec![result("r1", "aws:ec2", dec!(90))];
        let report = evaluate(&config, &results, &[], true, dec!(30), dec!(30));
        assert_eq!(report.exit_directive(), Some(3));
    }
}

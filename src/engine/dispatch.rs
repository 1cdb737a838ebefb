//! Broadcast/chain dispatch strategies (spec.md §4.3). Both functions take
//! an already priority-sorted, non-empty slice of matches and talk to the
//! plugin registry directly; `Engine::dispatch_resource` decides which one
//! to call based on whether all priorities tie.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::cost::CostResult;
use crate::domain::resource::ResourceDescriptor;
use crate::error::FinFocusError;
use crate::plugin::{PluginClient, PluginCostResponse};
use crate::router::PluginMatch;

use super::{placeholder_currency, PartialFailure, Query};

fn apply_response(resource: &ResourceDescriptor, plugin_name: &str, response: PluginCostResponse) -> CostResult {
    let currency = response.currency.unwrap_or_else(placeholder_currency);
    let mut result = CostResult::new(&resource.type_, &resource.id, plugin_name, currency);
    result.monthly = response.monthly;
    result.hourly = response.hourly;
    result.total_cost = response.total_cost;
    result.start_date = response.start_date;
    result.end_date = response.end_date;
    result.delta = response.delta;
    result.breakdown = response.breakdown;
    result.sustainability = response.sustainability;
    result.notes = response.notes;
    result
}

async fn call_plugin(plugin: &Arc<dyn PluginClient>, resource: &ResourceDescriptor, query: &Query) -> crate::error::Result<Option<PluginCostResponse>> {
    match query {
        Query::Projected => plugin.get_projected_cost(resource).await,
        Query::Actual { start, end } => plugin.get_actual_cost(resource, *start, *end).await,
    }
}

/// Equal-priority dispatch: call every matched plugin concurrently and keep
/// every non-error, non-empty response, including explicit zero-cost
/// answers (spec.md §4.3 "Broadcast mode"). Only when nothing at all
/// survives does the resource get a single `ERROR:` result plus a
/// `PartialFailure`.
pub(crate) async fn broadcast(
    plugins: &HashMap<String, Arc<dyn PluginClient>>,
    resource: &ResourceDescriptor,
    query: &Query,
    matches: &[PluginMatch],
) -> (Vec<CostResult>, Option<PartialFailure>) {
    let calls = matches.iter().map(|m| {
        let plugins = plugins;
        async move {
            let Some(plugin) = plugins.get(&m.plugin_name) else {
                return Err(format!("plugin '{}' is not registered", m.plugin_name));
            };
            match call_plugin(plugin, resource, query).await {
                Ok(Some(response)) => Ok(apply_response(resource, &m.plugin_name, response)),
                Ok(None) => Err(format!("plugin '{}' returned an empty result", m.plugin_name)),
                Err(e) => Err(format!("plugin '{}' failed: {e}", m.plugin_name)),
            }
        }
    });

    let outcomes = futures::future::join_all(calls).await;

    let mut results = Vec::new();
    let mut messages = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(message) => messages.push(message),
        }
    }

    if results.is_empty() {
        let message = messages.join("; ");
        let error_result = CostResult::error(&resource.type_, &resource.id, "broadcast", placeholder_currency(), &message);
        return (
            vec![error_result],
            Some(PartialFailure {
                resource_type: resource.type_.clone(),
                resource_id: resource.id.clone(),
                message,
            }),
        );
    }

    (results, None)
}

/// Priority-ordered dispatch: try matches in order, stop at the first
/// success. A match whose call fails with a transport error or an empty
/// result is skipped in favor of the next one only when `fallback` is set;
/// otherwise the chain halts immediately (spec.md §4.3 "Chain mode", §9 open
/// question (c)). An explicit `PluginRejected` halts the chain unconditionally
/// regardless of `fallback` (spec.md §7 item 6).
pub(crate) async fn chain(
    plugins: &HashMap<String, Arc<dyn PluginClient>>,
    resource: &ResourceDescriptor,
    query: &Query,
    matches: &[PluginMatch],
) -> (Vec<CostResult>, Option<PartialFailure>) {
    let mut last_message = String::new();

    for m in matches {
        let Some(plugin) = plugins.get(&m.plugin_name) else {
            last_message = format!("plugin '{}' is not registered", m.plugin_name);
            if m.fallback {
                continue;
            }
            break;
        };

        match call_plugin(plugin, resource, query).await {
            Ok(Some(response)) => {
                return (vec![apply_response(resource, &m.plugin_name, response)], None);
            }
            Ok(None) => {
                last_message = format!("plugin '{}' returned an empty result", m.plugin_name);
            }
            Err(FinFocusError::PluginRejected { message, .. }) => {
                last_message = format!("plugin '{}' rejected the request: {message}", m.plugin_name);
                break;
            }
            Err(e) => {
                last_message = format!("plugin '{}' failed: {e}", m.plugin_name);
            }
        }

        if !m.fallback {
            break;
        }
    }

    let error_result = CostResult::error(&resource.type_, &resource.id, "chain", placeholder_currency(), &last_message);
    (
        vec![error_result],
        Some(PartialFailure {
            resource_type: resource.type_.clone(),
            resource_id: resource.id.clone(),
            message: last_message,
        }),
    )
}

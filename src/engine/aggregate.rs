//! Aggregation and enrichment pass (spec.md §4.3 "Aggregation and
//! enrichment pass"), run once per call after per-resource dispatch
//! completes: attach recommendations, filter out dismissed/snoozed ones, and
//! stable-sort what remains by estimated savings.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::domain::cost::CostResult;
use crate::domain::recommendation::{sort_by_savings_desc, Recommendation};
use crate::domain::resource::ResourceDescriptor;
use crate::plugin::{Capability, PluginClient};

use super::Engine;

/// Step 1-3 of the aggregation pass: batch `GetRecommendationsForResources`
/// per matched plugin, drop anything the dismissal store excludes, and
/// stable-sort by estimated savings descending (spec.md §4.3, §4.6).
pub(crate) async fn attach_recommendations(engine: &Engine, resources: &[ResourceDescriptor], results: &mut [CostResult]) {
    let mut by_plugin: HashMap<String, Vec<ResourceDescriptor>> = HashMap::new();
    for resource in resources {
        for m in engine.resolve_matches(resource, Capability::Recommendations) {
            by_plugin.entry(m.plugin_name).or_default().push(resource.clone());
        }
    }

    let mut by_resource_id: HashMap<String, Vec<Recommendation>> = HashMap::new();
    for (plugin_name, plugin_resources) in by_plugin {
        let Some(plugin) = engine.plugins.get(&plugin_name) else {
            continue;
        };
        match fetch(plugin, &plugin_resources).await {
            Ok(map) => {
                for (resource_id, recs) in map {
                    by_resource_id.entry(resource_id).or_default().extend(recs);
                }
            }
            Err(e) => {
                warn!(plugin = %plugin_name, error = %e, "failed to fetch recommendations, resource results unaffected");
            }
        }
    }

    if by_resource_id.is_empty() {
        return;
    }

    let dismissed: Option<HashSet<String>> = engine.dismissals().map(|store| store.dismissed_ids().into_iter().collect());

    for result in results.iter_mut() {
        let Some(mut recs) = by_resource_id.remove(&result.resource_id) else {
            continue;
        };
        if let Some(dismissed) = &dismissed {
            recs.retain(|r| !dismissed.contains(&r.id));
        }
        sort_by_savings_desc(&mut recs);
        result.recommendations = recs;
    }
}

async fn fetch(
    plugin: &Arc<dyn PluginClient>,
    resources: &[ResourceDescriptor],
) -> crate::error::Result<std::collections::BTreeMap<String, Vec<Recommendation>>> {
    plugin.get_recommendations_for_resources(resources).await
}

//! Engine (spec.md §4.3, component C6): orchestrates per-resource plugin
//! dispatch, priority chains, fallback, aggregation, and enrichment. The
//! hardest part of the repository per spec.md — owns concurrency,
//! partial-failure semantics, and the downstream rendering contract.

mod aggregate;
mod dispatch;

pub use aggregate::attach_recommendations;

use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AnalyzerConfig;
use crate::dismissal::store::DismissalStore;
use crate::domain::cost::CostResult;
use crate::domain::currency::Currency;
use crate::domain::resource::ResourceDescriptor;
use crate::plugin::{Capability, PluginClient};
use crate::router::Router;

/// A single per-resource failure that did not abort the overall call
/// (spec.md §7 "PartialFailure").
#[derive(Debug, Clone)]
pub struct PartialFailure {
    pub resource_type: String,
    pub resource_id: String,
    pub message: String,
}

/// Output of one engine call: the aggregated result set plus a side-channel
/// of per-resource failures (spec.md §7 "the engine never returns a single
/// fatal error when a result set can be constructed").
#[derive(Debug, Clone, Default)]
pub struct EngineReport {
    pub results: Vec<CostResult>,
    pub partial_failures: Vec<PartialFailure>,
    /// Set when the call was cancelled before all resources were processed
    /// (spec.md §5 "Cancellation").
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub worker_pool_size: usize,
    pub per_resource_timeout: Duration,
    pub total_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            worker_pool_size: 8,
            per_resource_timeout: Duration::from_secs(30),
            total_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&AnalyzerConfig> for EngineConfig {
    fn from(c: &AnalyzerConfig) -> Self {
        EngineConfig {
            worker_pool_size: c.worker_pool_size,
            per_resource_timeout: Duration::from_secs(c.per_resource_timeout_secs),
            total_timeout: Duration::from_secs(c.total_timeout_secs),
        }
    }
}

/// What capability query to run against a resource's matched plugins.
#[derive(Debug, Clone)]
pub(crate) enum Query {
    Projected,
    Actual {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Query {
    fn capability(&self) -> Capability {
        match self {
            Query::Projected => Capability::ProjectedCosts,
            Query::Actual { .. } => Capability::ActualCosts,
        }
    }
}

pub struct Engine {
    router: Option<Router>,
    plugins: HashMap<String, Arc<dyn PluginClient>>,
    dismissals: Option<Arc<DismissalStore>>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(plugins: Vec<Arc<dyn PluginClient>>, router: Option<Router>, config: EngineConfig) -> Self {
        let plugins = plugins.into_iter().map(|p| (p.name().to_string(), p)).collect();
        Engine {
            router,
            plugins,
            dismissals: None,
            config,
        }
    }

    pub fn with_dismissal_store(mut self, store: Arc<DismissalStore>) -> Self {
        self.dismissals = Some(store);
        self
    }

    pub async fn get_projected_costs(
        &self,
        resources: &[ResourceDescriptor],
        cancel: CancellationToken,
    ) -> EngineReport {
        self.run(resources, Query::Projected, cancel).await
    }

    pub async fn get_actual_costs(
        &self,
        resources: &[ResourceDescriptor],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> EngineReport {
        self.run(resources, Query::Actual { start, end }, cancel).await
    }

    async fn run(&self, resources: &[ResourceDescriptor], query: Query, cancel: CancellationToken) -> EngineReport {
        let worker_pool_size = self.config.worker_pool_size.max(1);
        let per_resource_timeout = self.config.per_resource_timeout;
        let capability = query.capability();
        let engine = self;

        let stream = futures::stream::iter(resources.iter().cloned().enumerate())
            .map(move |(index, resource)| {
                let cancel = cancel.clone();
                let query = query.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (index, resource, None);
                    }
                    let matches = engine.resolve_matches(&resource, capability);
                    let work = engine.dispatch_resource(&resource, &query, matches);
                    let outcome = tokio::select! {
                        res = tokio::time::timeout(per_resource_timeout, work) => res.ok(),
                        _ = cancel.cancelled() => None,
                    };
                    (index, resource, outcome)
                }
            })
            .buffer_unordered(worker_pool_size);
        tokio::pin!(stream);

        let mut report = EngineReport::default();
        let mut ordered: Vec<Option<(Vec<CostResult>, Option<PartialFailure>)>> = (0..resources.len()).map(|_| None).collect();
        let sleep = tokio::time::sleep(self.config.total_timeout);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                item = stream.next() => {
                    match item {
                        Some((index, _resource, Some((results, failure)))) => {
                            ordered[index] = Some((results, failure));
                        }
                        Some((index, resource, None)) => {
                            ordered[index] = Some((
                                vec![],
                                Some(PartialFailure {
                                    resource_type: resource.type_.clone(),
                                    resource_id: resource.id.clone(),
                                    message: "resource dispatch timed out or cancelled".to_string(),
                                }),
                            ));
                        }
                        None => break,
                    }
                }
                _ = &mut sleep => {
                    report.cancelled = true;
                    warn!("engine call exceeded total timeout, returning partial results");
                    break;
                }
            }
        }

        for slot in ordered {
            if let Some((results, failure)) = slot {
                report.results.extend(results);
                if let Some(f) = failure {
                    report.partial_failures.push(f);
                }
            }
        }

        if !report.results.is_empty() {
            aggregate::attach_recommendations(self, resources, &mut report.results).await;
        }

        info!(
            resources = resources.len(),
            results = report.results.len(),
            failures = report.partial_failures.len(),
            cancelled = report.cancelled,
            "engine dispatch complete"
        );
        report
    }

    fn resolve_matches(&self, resource: &ResourceDescriptor, feature: Capability) -> Vec<crate::router::PluginMatch> {
        match &self.router {
            Some(router) => router.select_plugins(resource, feature),
            None => self
                .plugins
                .values()
                .map(|p| crate::router::PluginMatch {
                    plugin_name: p.name().to_string(),
                    reason: crate::router::MatchReason::Global,
                    priority: 0,
                    fallback: true,
                })
                .collect(),
        }
    }

    async fn dispatch_resource(
        &self,
        resource: &ResourceDescriptor,
        query: &Query,
        matches: Vec<crate::router::PluginMatch>,
    ) -> (Vec<CostResult>, Option<PartialFailure>) {
        if matches.is_empty() {
            if self.router.is_some() {
                // Router exists but selected nothing: skip, not a failure
                // (spec.md §4.2 "an empty result means no plugin selected,
                // skip this resource for this feature").
                return (vec![], None);
            }
            return (
                vec![],
                Some(PartialFailure {
                    resource_type: resource.type_.clone(),
                    resource_id: resource.id.clone(),
                    message: "no plugins available".to_string(),
                }),
            );
        }

        let all_equal_priority = matches.iter().all(|m| m.priority == matches[0].priority);
        if all_equal_priority {
            dispatch::broadcast(&self.plugins, resource, query, &matches).await
        } else {
            dispatch::chain(&self.plugins, resource, query, &matches).await
        }
    }

    pub fn router(&self) -> Option<&Router> {
        self.router.as_ref()
    }

    pub fn dismissals(&self) -> Option<&Arc<DismissalStore>> {
        self.dismissals.as_ref()
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }
}

pub(crate) fn placeholder_currency() -> Currency {
    Currency::new("USD").expect("USD is a valid ISO 4217 code")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{MockPluginClient, PluginMetadata};
    use async_trait::async_trait;

    fn resource(id: &str) -> ResourceDescriptor {
        ResourceDescriptor::new("aws:ec2/instance:Instance", id, "aws")
    }

    fn ok_plugin(name: &str, monthly: rust_decimal::Decimal) -> Arc<dyn PluginClient> {
        let mut mock = MockPluginClient::new();
        mock.expect_name().return_const(name.to_string());
        mock.expect_metadata()
            .returning(move || Ok(PluginMetadata::new(name).with_providers(["aws"])));
        mock.expect_get_projected_cost().returning(move |_| {
            Ok(Some(crate::plugin::PluginCostResponse {
                currency: Some(Currency::new("USD").unwrap()),
                monthly: Some(monthly),
                ..Default::default()
            }))
        });
        mock.expect_get_recommendations_for_resources()
            .returning(|_| Ok(Default::default()));
        Arc::new(mock)
    }

    #[tokio::test]
    async fn broadcast_mode_keeps_both_equal_priority_results() {
        let plugins = vec![ok_plugin("a", rust_decimal::Decimal::from(10)), ok_plugin("b", rust_decimal::Decimal::from(0))];
        let router = Router::automatic(vec![
            PluginMetadata::new("a").with_providers(["*"]),
            PluginMetadata::new("b").with_providers(["*"]),
        ]);
        let engine = Engine::new(plugins, Some(router), EngineConfig::default());
        let report = engine
            .get_projected_costs(&[resource("r1")], CancellationToken::new())
            .await;
        assert_eq!(report.results.len(), 2);
        assert!(report.partial_failures.is_empty());
    }

    #[tokio::test]
    async fn resource_order_preserved() {
        let plugins = vec![ok_plugin("a", rust_decimal::Decimal::from(1))];
        let router = Router::automatic(vec![PluginMetadata::new("a").with_providers(["*"])]);
        let engine = Engine::new(plugins, Some(router), EngineConfig::default());
        let resources = vec![resource("r1"), resource("r2"), resource("r3")];
        let report = engine.get_projected_costs(&resources, CancellationToken::new()).await;
        let ids: Vec<&str> = report.results.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn no_router_no_plugins_is_partial_failure() {
        let engine = Engine::new(vec![], None, EngineConfig::default());
        let report = engine.get_projected_costs(&[resource("r1")], CancellationToken::new()).await;
        assert!(report.results.is_empty());
        assert_eq!(report.partial_failures.len(), 1);
    }

    #[tokio::test]
    async fn empty_router_selection_is_silently_skipped_not_a_failure() {
        // Router configured but with no plugins registered at all: for a
        // resource whose provider matches nothing, select_plugins returns
        // empty and the router IS present, so this must not count as a
        // partial failure.
        let router = Router::automatic(vec![]);
        let engine = Engine::new(vec![], Some(router), EngineConfig::default());
        let report = engine.get_projected_costs(&[resource("r1")], CancellationToken::new()).await;
        assert!(report.results.is_empty());
        assert!(report.partial_failures.is_empty());
    }

    struct FailingMock;
    #[async_trait]
    impl PluginClient for FailingMock {
        fn name(&self) -> &str {
            "failing"
        }
        async fn metadata(&self) -> crate::error::Result<PluginMetadata> {
            Ok(PluginMetadata::new("failing").with_providers(["*"]))
        }
        async fn get_projected_cost(&self, _resource: &ResourceDescriptor) -> crate::plugin::PluginCallResult {
            Err(crate::error::FinFocusError::PluginTransport {
                plugin: "failing".to_string(),
                message: "connection refused".to_string(),
            })
        }
        async fn get_actual_cost(
            &self,
            _resource: &ResourceDescriptor,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> crate::plugin::PluginCallResult {
            unreachable!()
        }
        async fn get_recommendations_for_resources(
            &self,
            _resources: &[ResourceDescriptor],
        ) -> crate::error::Result<std::collections::BTreeMap<String, Vec<crate::domain::recommendation::Recommendation>>> {
            Ok(Default::default())
        }
    }

    #[tokio::test]
    async fn chain_mode_falls_back_past_transport_error() {
        let config = crate::config::routing::RoutingConfig {
            plugins: vec![
                crate::config::routing::PluginRouting {
                    name: "failing".to_string(),
                    features: None,
                    patterns: None,
                    priority: 20,
                    fallback: true,
                },
                crate::config::routing::PluginRouting {
                    name: "ok".to_string(),
                    features: None,
                    patterns: None,
                    priority: 10,
                    fallback: true,
                },
            ],
        };
        let metadata = vec![
            PluginMetadata::new("failing").with_providers(["aws"]),
            PluginMetadata::new("ok").with_providers(["aws"]),
        ];
        let router = Router::new(metadata, config).unwrap();
        let plugins: Vec<Arc<dyn PluginClient>> = vec![Arc::new(FailingMock), ok_plugin("ok", rust_decimal::Decimal::from(42))];
        let engine = Engine::new(plugins, Some(router), EngineConfig::default());
        let report = engine.get_projected_costs(&[resource("r1")], CancellationToken::new()).await;
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].source, "ok");
        assert!(report.partial_failures.is_empty());
    }
}

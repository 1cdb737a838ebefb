//! Plugin host transport boundary (spec.md §4.1/C5).
//!
//! Process spawning and gRPC framing are assumed available per spec.md §1
//! ("Plugin transport mechanics... are assumed available") and are therefore
//! out of scope here; this module defines the trait boundary the engine
//! dispatches against (`PluginClient`) plus the capability/metadata types
//! the router and engine both need. Tests exercise the boundary with
//! in-process mocks, matching the teacher's `ApiKeyStore`/`DlqStore` pattern
//! of trait-boundary-first, transport-agnostic testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::cost::SustainabilityMetric;
use crate::domain::recommendation::Recommendation;
use crate::domain::resource::ResourceDescriptor;
use crate::error::Result;

/// Named operation a plugin can provide (spec.md GLOSSARY "Capability /
/// feature"). The recognized set is closed per spec.md §4.2 `Validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    ProjectedCosts,
    ActualCosts,
    Recommendations,
    Carbon,
    DryRun,
    Budgets,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::ProjectedCosts,
        Capability::ActualCosts,
        Capability::Recommendations,
        Capability::Carbon,
        Capability::DryRun,
        Capability::Budgets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ProjectedCosts => "ProjectedCosts",
            Capability::ActualCosts => "ActualCosts",
            Capability::Recommendations => "Recommendations",
            Capability::Carbon => "Carbon",
            Capability::DryRun => "DryRun",
            Capability::Budgets => "Budgets",
        }
    }

    pub fn parse(name: &str) -> Option<Capability> {
        Capability::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata a plugin publishes at negotiation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,

    /// Provider tags this plugin declares support for. Empty or containing
    /// `"*"` means global/universal support (spec.md §4.2 "Automatic
    /// layer").
    #[serde(default)]
    pub supported_providers: Vec<String>,

    /// Declared capabilities. `None` means "legacy plugin" — matches all
    /// capabilities (spec.md §4.2 step 2).
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        PluginMetadata {
            name: name.into(),
            supported_providers: Vec::new(),
            capabilities: None,
        }
    }

    pub fn with_providers(mut self, providers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.supported_providers = providers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = Some(capabilities.into_iter().collect());
        self
    }

    pub fn is_global(&self) -> bool {
        self.supported_providers.is_empty()
            || self.supported_providers.iter().any(|p| p == "*")
    }

    pub fn supports_capability(&self, capability: Capability) -> bool {
        match &self.capabilities {
            None => true,
            Some(caps) => caps.contains(&capability),
        }
    }
}

/// A plugin's cost answer for one resource, before the engine attaches
/// `Source` and `ResourceType`/`ResourceID` (spec.md §3.3). `None` return
/// from a call models "empty result" (no cost data), distinct from an error.
#[derive(Debug, Clone, Default)]
pub struct PluginCostResponse {
    pub currency: Option<crate::domain::currency::Currency>,
    pub monthly: Option<Decimal>,
    pub hourly: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub delta: Option<Decimal>,
    pub breakdown: BTreeMap<String, Decimal>,
    pub sustainability: BTreeMap<String, SustainabilityMetric>,
    pub notes: Vec<String>,
}

/// Per-resource RPC outcome used for fallback decisions (spec.md §4.3, §7).
pub type PluginCallResult = Result<Option<PluginCostResponse>>;

/// The trait boundary every cost-source plugin implements. `#[automock]`
/// must precede `#[async_trait]` for mockall to expand correctly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PluginClient: Send + Sync {
    fn name(&self) -> &str;

    async fn metadata(&self) -> Result<PluginMetadata>;

    async fn get_projected_cost(&self, resource: &ResourceDescriptor) -> PluginCallResult;

    async fn get_actual_cost(
        &self,
        resource: &ResourceDescriptor,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PluginCallResult;

    /// Batched recommendation lookup keyed by `ResourceDescriptor::id`
    /// (spec.md §4.3 "GetRecommendationsForResources").
    async fn get_recommendations_for_resources(
        &self,
        resources: &[ResourceDescriptor],
    ) -> Result<BTreeMap<String, Vec<Recommendation>>>;
}

//! Routing configuration schema (spec.md §3.5, §6 "Configuration YAML
//! surface").

use serde::{Deserialize, Serialize};

use crate::pattern::ResourcePattern;
use crate::plugin::Capability;

fn default_true() -> bool {
    true
}

/// One configured plugin's routing rule (spec.md §3.5 `PluginRouting`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRouting {
    pub name: String,

    #[serde(default)]
    pub features: Option<Vec<Capability>>,

    #[serde(default)]
    pub patterns: Option<Vec<ResourcePattern>>,

    #[serde(default)]
    pub priority: i64,

    #[serde(default = "default_true")]
    pub fallback: bool,
}

impl PluginRouting {
    pub fn matches_feature(&self, feature: Capability) -> bool {
        match &self.features {
            None => true,
            Some(features) if features.is_empty() => true,
            Some(features) => features.contains(&feature),
        }
    }
}

/// Top-level `routing:` config section. Absent ⇒ automatic provider routing
/// is the router's only strategy (spec.md §3.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub plugins: Vec<PluginRouting>,
}

impl RoutingConfig {
    pub fn find(&self, plugin_name: &str) -> Option<&PluginRouting> {
        self.plugins.iter().find(|p| p.name == plugin_name)
    }
}

//! Router (spec.md §4.2, component C4): given a resource and a capability
//! name, returns an ordered list of plugin matches.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::routing::RoutingConfig;
use crate::domain::resource::ResourceDescriptor;
use crate::error::Result;
use crate::pattern;
use crate::plugin::{Capability, PluginMetadata};

/// Why the router selected a plugin (spec.md GLOSSARY "Match reason").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchReason {
    Automatic,
    Pattern,
    Global,
}

/// One routing decision. `priority`/`fallback` are always resolved (never
/// `Option`) — the router applies all defaults before returning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMatch {
    pub plugin_name: String,
    pub reason: MatchReason,
    pub priority: i64,
    pub fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Pure function of router state + inputs (spec.md §8 "Router idempotence").
/// Holds the available plugin set (in discovery order) and the optional
/// routing config; all pattern compilation happens at construction and is
/// cached process-wide by `pattern::compile` (spec.md §4.2 "Performance").
#[derive(Debug, Clone)]
pub struct Router {
    plugins: Vec<PluginMetadata>,
    config: Option<RoutingConfig>,
}

impl Router {
    /// Construct a router, eagerly compiling (and caching) every configured
    /// pattern so a bad pattern fails fast rather than on first
    /// `select_plugins` call.
    pub fn new(plugins: Vec<PluginMetadata>, config: RoutingConfig) -> Result<Self> {
        for routing in &config.plugins {
            if let Some(patterns) = &routing.patterns {
                for p in patterns {
                    pattern::compile(p)?;
                }
            }
        }
        Ok(Router {
            plugins,
            config: Some(config),
        })
    }

    /// A router with no routing config: automatic provider routing only.
    pub fn automatic(plugins: Vec<PluginMetadata>) -> Self {
        Router {
            plugins,
            config: None,
        }
    }

    fn find_metadata(&self, name: &str) -> Option<&PluginMetadata> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Selection algorithm (spec.md §4.2 "Selection algorithm", steps 1-5).
    pub fn select_plugins(&self, resource: &ResourceDescriptor, feature: Capability) -> Vec<PluginMatch> {
        let Some(config) = &self.config else {
            // No router config: automatic layer only, every plugin at
            // priority 0 (broadcast), default fallback true.
            return self
                .plugins
                .iter()
                .filter(|p| p.is_global() || p.supported_providers.iter().any(|pr| pr == &resource.provider))
                .map(|p| PluginMatch {
                    plugin_name: p.name.clone(),
                    reason: if p.is_global() {
                        MatchReason::Global
                    } else {
                        MatchReason::Automatic
                    },
                    priority: 0,
                    fallback: true,
                })
                .collect();
        };

        let mut matched: HashSet<String> = HashSet::new();
        let mut ordered: Vec<PluginMatch> = Vec::new();

        // 1. Pattern layer, config order, restricted to available plugins.
        for routing in &config.plugins {
            if self.find_metadata(&routing.name).is_none() {
                continue;
            }
            let Some(patterns) = &routing.patterns else {
                continue;
            };
            let is_match = patterns.iter().any(|p| {
                pattern::compile(p)
                    .map(|compiled| compiled.is_match(&resource.type_))
                    .unwrap_or(false)
            });
            if is_match && routing.matches_feature(feature) {
                matched.insert(routing.name.clone());
                ordered.push(PluginMatch {
                    plugin_name: routing.name.clone(),
                    reason: MatchReason::Pattern,
                    priority: routing.priority,
                    fallback: routing.fallback,
                });
            }
        }

        // 2. Automatic layer, discovery order, for plugins not already
        //    matched by the pattern layer.
        for plugin in &self.plugins {
            if matched.contains(&plugin.name) {
                continue;
            }
            let reason = if plugin.is_global() {
                Some(MatchReason::Global)
            } else if plugin.supported_providers.iter().any(|p| p == &resource.provider) {
                Some(MatchReason::Automatic)
            } else {
                None
            };
            let Some(reason) = reason else { continue };

            let inherited = config.find(&plugin.name);
            let (priority, fallback, passes_feature) = match inherited {
                Some(routing) => (routing.priority, routing.fallback, routing.matches_feature(feature)),
                None => (0, true, plugin.supports_capability(feature)),
            };
            if !passes_feature {
                continue;
            }

            matched.insert(plugin.name.clone());
            ordered.push(PluginMatch {
                plugin_name: plugin.name.clone(),
                reason,
                priority,
                fallback,
            });
        }

        // 4. Stable sort by priority descending; `sort_by` is stable so the
        //    insertion order above (config order, then discovery order)
        //    survives as the tie-break (spec.md §4.2 step 4).
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        // 5. Equal-priority broadcast rule is implicit: the caller (engine)
        //    treats an all-priority-0 result as broadcast mode.
        ordered
    }

    /// Configured fallback policy for a plugin; `true` for unknown names
    /// (spec.md §4.2 `ShouldFallback`).
    pub fn should_fallback(&self, plugin_name: &str) -> bool {
        self.config
            .as_ref()
            .and_then(|c| c.find(plugin_name))
            .map(|r| r.fallback)
            .unwrap_or(true)
    }

    /// Eager check (spec.md §4.2 `Validate`): every referenced plugin name
    /// exists (error), every pattern compiles (error, already guaranteed by
    /// `new`), every feature name is recognized (warning — `Capability` is
    /// a closed enum so this is always satisfied at the type level, kept as
    /// a warning slot for forward compatibility), duplicate plugin entries
    /// with overlapping scope (warning).
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport {
            valid: true,
            ..Default::default()
        };
        let Some(config) = &self.config else {
            return report;
        };

        let known: HashSet<&str> = self.plugins.iter().map(|p| p.name.as_str()).collect();
        for routing in &config.plugins {
            if !known.contains(routing.name.as_str()) {
                report.valid = false;
                report
                    .errors
                    .push(format!("routing references unknown plugin '{}'", routing.name));
            }
            if let Some(patterns) = &routing.patterns {
                for p in patterns {
                    if let Err(e) = pattern::compile(p) {
                        report.valid = false;
                        report.errors.push(e.to_string());
                    }
                }
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for routing in &config.plugins {
            if !seen.insert(routing.name.as_str()) {
                report
                    .warnings
                    .push(format!("duplicate routing entry for plugin '{}'", routing.name));
            }
        }

        report
    }
}

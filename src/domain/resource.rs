use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Well-known property keys injected by ingest (spec.md §3.1).
pub mod reserved_keys {
    pub const URN: &str = "pulumi:urn";
    pub const CLOUD_ID: &str = "pulumi:cloudId";
    pub const ARN: &str = "pulumi:arn";
    pub const CREATED: &str = "pulumi:created";
    pub const MODIFIED: &str = "pulumi:modified";
    pub const EXTERNAL: &str = "pulumi:external";
}

/// A single property value. Properties carry heterogeneous JSON-shaped data
/// originating from arbitrary IaC tool output; this thin wrapper over
/// `serde_json::Value` preserves round-trip fidelity through the plugin RPC
/// boundary while giving call sites a small typed accessor API instead of
/// matching on `serde_json::Value` everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyValue(pub serde_json::Value);

impl PropertyValue {
    pub fn string<S: Into<String>>(s: S) -> Self {
        PropertyValue(serde_json::Value::String(s.into()))
    }

    pub fn bool(b: bool) -> Self {
        PropertyValue(serde_json::Value::Bool(b))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.0.as_bool()
    }

    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.0.as_object()
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(v: serde_json::Value) -> Self {
        PropertyValue(v)
    }
}

/// An ordered, deterministic map from property key to value.
///
/// `BTreeMap` rather than `HashMap` so that two descriptors built from the
/// same inputs compare and serialize identically regardless of insertion
/// order — required by the ingest equivalence invariant (spec.md §8).
pub type Properties = BTreeMap<String, PropertyValue>;

/// Merge two property maps under the rule in spec.md §4.1: base entries
/// first, overlay entries replace on key conflict. `None` + `None` yields
/// `None`; either side present yields `Some`, even if the other side is
/// empty.
pub fn merge_properties(
    base: Option<&Properties>,
    overlay: Option<&Properties>,
) -> Option<Properties> {
    match (base, overlay) {
        (None, None) => None,
        (base, overlay) => {
            let mut merged = Properties::new();
            if let Some(b) = base {
                merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            if let Some(o) = overlay {
                merged.extend(o.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(merged)
        }
    }
}

/// The canonical, provider-agnostic representation of one deployable
/// resource (spec.md §3.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Provider-qualified type token, e.g. `aws:ec2/instance:Instance`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Opaque per-resource identifier (the plan/state URN).
    pub id: String,

    /// Lowercase provider tag, `"unknown"` when not extractable.
    pub provider: String,

    /// Arbitrary JSON-shaped properties, possibly empty.
    #[serde(default)]
    pub properties: Properties,
}

impl ResourceDescriptor {
    pub fn new(type_: impl Into<String>, id: impl Into<String>, provider: impl Into<String>) -> Self {
        ResourceDescriptor {
            type_: type_.into(),
            id: id.into(),
            provider: provider.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn reserved_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_, self.id)
    }
}

/// Keyed on `(type_, id)`, not `properties`.
impl Hash for ResourceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_.hash(state);
        self.id.hash(state);
    }
}

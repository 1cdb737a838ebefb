use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::resource::{merge_properties, reserved_keys, Properties, PropertyValue, ResourceDescriptor};
use crate::error::{FinFocusError, Result};
use crate::provider::extract_provider;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub time: Option<String>,
    pub magic: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResource {
    pub urn: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub id: Option<String>,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub external: bool,
    pub provider: Option<String>,
    #[serde(default)]
    pub inputs: Option<Properties>,
    #[serde(default)]
    pub outputs: Option<Properties>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    pub manifest: Option<Manifest>,
    #[serde(default)]
    pub resources: Vec<StateResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateDocument {
    pub version: Option<i64>,
    pub deployment: Deployment,
}

/// Pull an `arn` string out of a resolved property map, if present, for
/// injection under the reserved `pulumi:arn` key.
fn extract_arn(properties: &Properties) -> Option<String> {
    properties
        .get("arn")
        .and_then(PropertyValue::as_str)
        .map(str::to_string)
}

fn resource_to_descriptor(resource: &StateResource) -> ResourceDescriptor {
    let provider = resource
        .provider
        .clone()
        .unwrap_or_else(|| extract_provider(&resource.type_));

    let mut properties = merge_properties(resource.outputs.as_ref(), resource.inputs.as_ref())
        .unwrap_or_default();

    if let Some(arn) = extract_arn(&properties) {
        properties.insert(reserved_keys::ARN.to_string(), PropertyValue::string(arn));
    }
    if let Some(cloud_id) = &resource.id {
        properties.insert(
            reserved_keys::CLOUD_ID.to_string(),
            PropertyValue::string(cloud_id.clone()),
        );
    }
    if let Some(created) = resource.created {
        properties.insert(
            reserved_keys::CREATED.to_string(),
            PropertyValue::string(created.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
        );
    }
    if let Some(modified) = resource.modified {
        properties.insert(
            reserved_keys::MODIFIED.to_string(),
            PropertyValue::string(modified.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
        );
    }
    if resource.external {
        properties.insert(
            reserved_keys::EXTERNAL.to_string(),
            PropertyValue::string("true"),
        );
    }

    ResourceDescriptor {
        type_: resource.type_.clone(),
        id: resource.urn.clone(),
        provider,
        properties,
    }
}

impl StateDocument {
    /// Parse a state document from an in-memory byte buffer. Only
    /// `custom: true` resources are emitted (spec.md §4.1 "State ingest").
    pub fn from_bytes(bytes: &[u8]) -> Result<Vec<ResourceDescriptor>> {
        let doc: StateDocument = serde_json::from_slice(bytes)
            .map_err(|e| FinFocusError::IngestParse(format!("state document: {e}")))?;

        Ok(doc
            .deployment
            .resources
            .iter()
            .filter(|r| r.custom)
            .map(resource_to_descriptor)
            .collect())
    }

    /// Load and parse a state document from a file. Always exactly a read
    /// followed by `from_bytes`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Vec<ResourceDescriptor>> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}

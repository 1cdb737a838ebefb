use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::resource::{merge_properties, Properties, ResourceDescriptor};
use crate::error::{FinFocusError, Result};
use crate::provider::extract_provider;

/// A step operation, per spec.md §6. Unrecognized ops (anything beyond the
/// five listed here) are tolerated at the JSON level and treated as `Other`,
/// which ingest silently skips — the spec says "unrecognized ops are
/// silently ignored", not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOp {
    Create,
    Update,
    Same,
    Delete,
    #[serde(other)]
    Other,
}

impl StepOp {
    fn is_ingested(self) -> bool {
        matches!(self, StepOp::Create | StepOp::Update | StepOp::Same)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub urn: Option<String>,
    #[serde(default)]
    pub inputs: Option<Properties>,
    #[serde(default)]
    pub outputs: Option<Properties>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub op: StepOp,
    pub urn: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub inputs: Option<Properties>,
    #[serde(default)]
    pub outputs: Option<Properties>,
    #[serde(default)]
    pub new_state: Option<StateSnapshot>,
    #[serde(default)]
    pub old_state: Option<StateSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanDocument {
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

/// Third `::`-segment of a URN, used as the type-token fallback when a step
/// omits `type` (spec.md §4.1 "Plan ingest").
fn type_from_urn(urn: &str) -> Option<&str> {
    urn.split("::").nth(2)
}

/// Outputs selection order, highest first: step-level outputs → new-state
/// outputs → old-state outputs (only for update/same). Inputs overlay
/// outputs (spec.md §3.2).
fn resolve_properties(step: &PlanStep) -> Option<Properties> {
    let outputs = step
        .outputs
        .clone()
        .or_else(|| step.new_state.as_ref().and_then(|s| s.outputs.clone()))
        .or_else(|| {
            if matches!(step.op, StepOp::Update | StepOp::Same) {
                step.old_state.as_ref().and_then(|s| s.outputs.clone())
            } else {
                None
            }
        });

    let inputs = step.inputs.clone();

    merge_properties(outputs.as_ref(), inputs.as_ref())
}

fn step_to_descriptor(step: &PlanStep) -> ResourceDescriptor {
    let type_ = step
        .type_
        .clone()
        .or_else(|| type_from_urn(&step.urn).map(str::to_string))
        .unwrap_or_default();
    let provider = extract_provider(&type_);
    let properties = resolve_properties(step).unwrap_or_default();

    ResourceDescriptor {
        type_,
        id: step.urn.clone(),
        provider,
        properties,
    }
}

impl PlanDocument {
    /// Parse a plan document from an in-memory byte buffer. Emission order
    /// preserves plan order (spec.md §8 "Plan order preservation"); `delete`
    /// steps and unrecognized ops are excluded (spec.md §8 "Deleted
    /// resources excluded").
    pub fn from_bytes(bytes: &[u8]) -> Result<Vec<ResourceDescriptor>> {
        let doc: PlanDocument = serde_json::from_slice(bytes)
            .map_err(|e| FinFocusError::IngestParse(format!("plan document: {e}")))?;

        Ok(doc
            .steps
            .iter()
            .filter(|s| s.op.is_ingested())
            .map(step_to_descriptor)
            .collect())
    }

    /// Load and parse a plan document from a file. Always exactly a read
    /// followed by `from_bytes`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Vec<ResourceDescriptor>> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}

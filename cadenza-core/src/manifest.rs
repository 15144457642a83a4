//! Typed model of a parsed agent manifest.
//!
//! A manifest YAML defines an agent as an ordered pipeline of primitive steps:
//!
//! ```yaml
//! metadata:
//!   name: "support-triage"
//!   version: "1.0"
//!   observability:
//!     enabled: true
//!
//! workflow:
//!   - id: classify
//!     type: llm
//!     config:
//!       model: "gpt-4o-mini"
//!       system: "Classify the request."
//!       messages: "$input.messages"
//!     result: classification
//!
//!   - id: shape
//!     type: output-generator
//!     config:
//!       json: "$stepResult.classification.text"
//!
//! return:
//!   category: "$json.category"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CadenzaError, Result};

/// A parsed, validated agent definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentManifest {
    /// Agent metadata (name, version, observability settings)
    pub metadata: ManifestMetadata,

    /// Ordered list of workflow steps
    pub workflow: Vec<WorkflowStep>,

    /// Optional template shaping the final response; may embed variable
    /// references resolved against the finished execution context
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    pub return_template: Option<Value>,
}

/// Manifest metadata block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Agent name
    pub name: String,

    /// Version string
    pub version: String,

    /// Optional observability settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilitySettings>,
}

/// Observability settings for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Whether per-step tracing is enabled. Accepts both boolean and string
    /// forms (`true`, `"true"`, `"1"`, `"yes"`, `"on"`)
    #[serde(default)]
    pub enabled: Flag,
}

/// A boolean flag that tolerates the string spellings manifest authors use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    /// A plain YAML boolean
    Bool(bool),
    /// A string form such as `"true"` or `"yes"`
    Text(String),
}

impl Default for Flag {
    fn default() -> Self {
        Self::Bool(false)
    }
}

impl Flag {
    /// Whether the flag is set.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Text(text) => {
                matches!(
                    text.trim().to_lowercase().as_str(),
                    "true" | "1" | "yes" | "on" | "enabled"
                )
            }
        }
    }
}

/// One entry in the workflow sequence, bound to a handler by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step id (unique within the manifest)
    pub id: String,

    /// Handler type; key into the handler registry
    #[serde(rename = "type")]
    pub step_type: String,

    /// Handler-specific configuration; recognized keys are defined by the
    /// bound handler, which also resolves any variable references inside
    #[serde(default = "empty_config")]
    pub config: Value,

    /// Context variable name storing this step's non-streaming output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

fn empty_config() -> Value {
    Value::Object(serde_json::Map::new())
}

impl AgentManifest {
    /// Whether observability tracing is enabled for this agent.
    #[must_use]
    pub fn observability_enabled(&self) -> bool {
        self.metadata
            .observability
            .as_ref()
            .is_some_and(|settings| settings.enabled.is_enabled())
    }

    /// Validate structural invariants: a non-empty workflow, non-empty
    /// per-step `id` and `type`, and ids unique within the manifest.
    pub fn validate(&self) -> Result<()> {
        if self.workflow.is_empty() {
            return Err(CadenzaError::validation(
                "workflow",
                "workflow must contain at least one step",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (index, step) in self.workflow.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(CadenzaError::validation(
                    "workflow.id",
                    format!("step at index {index} has an empty id"),
                ));
            }
            if step.step_type.trim().is_empty() {
                return Err(CadenzaError::validation(
                    "workflow.type",
                    format!("step '{}' has an empty type", step.id),
                ));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(CadenzaError::validation(
                    "workflow.id",
                    format!("duplicate step id '{}'", step.id),
                ));
            }
        }

        Ok(())
    }
}

//! Tool system exposed to language models.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cadenza_core::error::Result;

pub mod builtin;

pub use builtin::EchoTool;

/// Tool schema definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Parameter schema (JSON Schema)
    pub parameters: Value,
}

/// Tool execution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool execution was successful
    pub success: bool,
    /// Tool output content
    pub content: String,
    /// Error message if execution failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    /// Create a failed tool result.
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

/// A callable exposed to the model: description + parameter schema + execute.
#[async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    /// Get the tool's schema definition.
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: Value) -> Result<ToolResult>;

    /// Get the tool name.
    fn name(&self) -> String {
        self.schema().name
    }

    /// Get the tool description.
    fn description(&self) -> String {
        self.schema().description
    }
}

/// Helper to build a simple object parameter schema.
#[must_use]
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

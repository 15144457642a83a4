//! Built-in tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use cadenza_core::error::{CadenzaError, Result};

use super::{object_schema, Tool, ToolResult, ToolSchema};

/// Echo tool for testing and debugging.
#[derive(Debug, Clone, Default)]
pub struct EchoTool;

impl EchoTool {
    /// Create a new echo tool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo".to_string(),
            description: "Echo back the provided message. Useful for testing and debugging."
                .to_string(),
            parameters: object_schema(
                json!({
                    "message": {
                        "type": "string",
                        "description": "Message to echo back"
                    }
                }),
                &["message"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult> {
        #[derive(Deserialize)]
        struct EchoArgs {
            message: String,
        }

        let args: EchoArgs = serde_json::from_value(arguments)
            .map_err(|e| CadenzaError::tool("echo", format!("Invalid arguments: {e}")))?;

        Ok(ToolResult::success(args.message))
    }
}

//! The core step primitives: `llm`, `chat`, `output-generator`, `call-agent`.
//!
//! Every handler follows the same discipline: resolve variable references in
//! its own configuration, then either produce a record for downstream steps
//! or a stream that ends the pipeline.

use std::sync::Arc;

use serde_json::Value;

use cadenza_core::context::JsonMap;
use cadenza_core::error::{CadenzaError, Result};

use crate::registry::Registries;

mod call_agent;
mod chat;
mod llm;
mod output;

pub use call_agent::CallAgentHandler;
pub use chat::ChatHandler;
pub use llm::LlmHandler;
pub use output::OutputHandler;

/// Provider used by `llm`/`chat` when the step names none.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Upper bound on tool-calling rounds inside one `llm` step.
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Register the four core primitives on a registry bundle.
///
/// Handlers hold a weak reference back to the bundle, so the bundle remains
/// solely owned by its `Arc` and drops normally.
pub fn register_builtins(registries: &Arc<Registries>) {
    registries
        .handlers
        .register("llm", Arc::new(LlmHandler::new(Arc::downgrade(registries))));
    registries
        .handlers
        .register("chat", Arc::new(ChatHandler::new(Arc::downgrade(registries))));
    registries
        .handlers
        .register("output-generator", Arc::new(OutputHandler::new()));
    registries.handlers.register(
        "call-agent",
        Arc::new(CallAgentHandler::new(Arc::downgrade(registries))),
    );
}

/// View a handler config as the mapping it must be.
pub(crate) fn as_object(config: &Value) -> Result<&JsonMap> {
    config
        .as_object()
        .ok_or_else(|| CadenzaError::validation("config", "step config must be a mapping"))
}

/// A resolved value that a handler requires to be a non-empty string.
pub(crate) fn require_string(value: &Value, reference: &str) -> Result<String> {
    match value {
        Value::String(text) if !text.is_empty() => Ok(text.clone()),
        Value::Null => Err(CadenzaError::reference(
            reference,
            "required reference resolved to nothing",
        )),
        other => Err(CadenzaError::validation(
            reference,
            format!("expected a string, got {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_object_rejects_scalars() {
        assert!(as_object(&json!({"a": 1})).is_ok());
        assert!(as_object(&json!("nope")).is_err());
    }

    #[test]
    fn test_require_string() {
        assert_eq!(require_string(&json!("ok"), "$x").unwrap(), "ok");
        assert!(matches!(
            require_string(&Value::Null, "$x").unwrap_err(),
            CadenzaError::Reference { .. }
        ));
        assert!(matches!(
            require_string(&json!(5), "$x").unwrap_err(),
            CadenzaError::Validation { .. }
        ));
    }
}

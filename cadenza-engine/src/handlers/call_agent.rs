//! The `call-agent` primitive: run another agent's manifest as a sub-step.

use std::sync::Weak;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use cadenza_core::context::ExecutionContext;
use cadenza_core::error::{CadenzaError, Result};
use cadenza_core::handler::{HandlerOutput, StepHandler};
use cadenza_core::loader::load_manifest;
use cadenza_core::vars::resolve_in_context;

use super::require_string;
use crate::executor::WorkflowExecutor;
use crate::registry::Registries;

/// Handler for `type: call-agent` steps.
///
/// Config keys: `agentId` (required), `input?`. The sub-agent manifest is
/// found through the registered agent locator, loaded, and executed by a
/// child executor one nesting level deeper. The sub-execution owns its own
/// context; traces never merge across the boundary. A streaming response
/// from the sub-agent propagates outward and short-circuits the outer
/// pipeline too.
pub struct CallAgentHandler {
    registries: Weak<Registries>,
}

impl CallAgentHandler {
    /// Create the handler over a registry bundle.
    #[must_use]
    pub fn new(registries: Weak<Registries>) -> Self {
        Self { registries }
    }
}

#[async_trait]
impl StepHandler for CallAgentHandler {
    async fn call(&self, config: &Value, ctx: &mut ExecutionContext) -> Result<HandlerOutput> {
        let registries = Registries::upgrade(&self.registries)?;

        let map = super::as_object(config)?;
        let agent_id_value = map
            .get("agentId")
            .map(|value| resolve_in_context(value, ctx))
            .ok_or_else(|| CadenzaError::validation("agentId", "agentId is required"))?;
        let agent_id = require_string(&agent_id_value, "agentId")?;

        // `input: null` (or an unresolved reference) falls back to the
        // outer input, same as omitting the key.
        let input = match map.get("input").map(|value| resolve_in_context(value, ctx)) {
            Some(value) if !value.is_null() => value,
            _ => ctx.input.clone(),
        };

        let locator = registries.locator().ok_or_else(|| {
            CadenzaError::agent(agent_id.clone(), "no agent locator registered")
        })?;
        let path = locator.locate(&agent_id).ok_or_else(|| {
            CadenzaError::agent(agent_id.clone(), "agent manifest not found")
        })?;

        debug!("Invoking sub-agent '{}' from {}", agent_id, path.display());
        let manifest = load_manifest(&path)?;

        let executor = WorkflowExecutor::with_depth(manifest, registries, ctx.depth + 1);
        executor.execute(input).await
    }
}

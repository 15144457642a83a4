//! The `llm` primitive: a single blocking generation, with an optional
//! bounded tool loop.

use std::sync::Weak;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use cadenza_core::context::{ExecutionContext, JsonMap};
use cadenza_core::error::{CadenzaError, Result};
use cadenza_core::handler::{HandlerOutput, StepHandler};
use cadenza_core::message::{MessageRole, ModelMessage};
use cadenza_core::vars::{resolve, ResolveScope};

use super::{as_object, DEFAULT_PROVIDER, MAX_TOOL_ROUNDS};
use crate::convert::MessageConverter;
use crate::provider::{GenerationRequest, ModelConfig, TokenUsage};
use crate::registry::Registries;

/// Handler for `type: llm` steps.
///
/// Config keys: `provider?`, `model?`, `system?`, `messages`, `tools?`,
/// `temperature?`, `maxTokens?`. The resolved `messages` value is taken in
/// the model-message shape as-is; no conversion happens here. Never returns
/// a stream.
pub struct LlmHandler {
    registries: Weak<Registries>,
}

impl LlmHandler {
    /// Create the handler over a registry bundle.
    #[must_use]
    pub fn new(registries: Weak<Registries>) -> Self {
        Self { registries }
    }
}

#[async_trait]
impl StepHandler for LlmHandler {
    async fn call(&self, config: &Value, ctx: &mut ExecutionContext) -> Result<HandlerOutput> {
        let registries = Registries::upgrade(&self.registries)?;

        as_object(config)?;
        let resolved = resolve(config, &ResolveScope::from_context(ctx));
        let map = as_object(&resolved)?;

        let provider_name = map
            .get("provider")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROVIDER);
        let provider = registries.providers.get(provider_name).ok_or_else(|| {
            CadenzaError::provider(
                provider_name,
                format!(
                    "provider not registered. Registered providers: [{}]",
                    registries.providers.names().join(", ")
                ),
            )
        })?;

        let model_config: ModelConfig = serde_json::from_value(resolved.clone())?;
        let system = extract_system(map)?;
        let messages = extract_messages(map)?;
        let tool_names = extract_tool_names(map)?;

        let model = provider.create_model(&model_config).await?;

        if tool_names.is_empty() {
            let generation = model
                .generate(GenerationRequest { system, messages })
                .await?;
            return record(generation.text, generation.usage);
        }

        // Bind every named tool before the first generation; a miss is a
        // configuration error.
        let tools = tool_names
            .iter()
            .map(|name| {
                registries
                    .tools
                    .get(name)
                    .ok_or_else(|| CadenzaError::tool(name.clone(), "tool not found in registry"))
            })
            .collect::<Result<Vec<_>>>()?;

        let instructions = MessageConverter::render_tool_instructions(&tools);
        let system = Some(match system {
            Some(existing) => format!("{existing}\n\n{instructions}"),
            None => instructions,
        });

        let mut conversation = messages;
        let mut total_usage = TokenUsage::default();
        let mut round = 0;

        loop {
            round += 1;
            let generation = model
                .generate(GenerationRequest {
                    system: system.clone(),
                    messages: conversation.clone(),
                })
                .await?;
            total_usage = total_usage.add(generation.usage);

            let calls = MessageConverter::extract_tool_calls(&generation.text);
            // The final round returns whatever the model said, tool calls
            // included.
            if calls.is_empty() || round == MAX_TOOL_ROUNDS {
                return record(generation.text, total_usage);
            }

            debug!("Tool round {}: {} call(s)", round, calls.len());
            conversation.push(ModelMessage::assistant(generation.text.clone()));

            for call in calls {
                let observation = match tools.iter().find(|tool| tool.name() == call.tool_name) {
                    Some(tool) => {
                        let result = tool.execute(call.arguments).await?;
                        let body = if result.success {
                            result.content
                        } else {
                            result.error.unwrap_or_else(|| "tool failed".to_string())
                        };
                        MessageConverter::format_observation(&call.tool_name, &body)
                    }
                    None => MessageConverter::format_observation(
                        &call.tool_name,
                        "no such tool is available",
                    ),
                };
                conversation.push(ModelMessage {
                    role: MessageRole::Tool,
                    content: observation,
                });
            }
        }
    }
}

fn extract_system(map: &JsonMap) -> Result<Option<String>> {
    match map.get("system") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(CadenzaError::validation(
            "system",
            format!("expected a string, got {other}"),
        )),
    }
}

fn extract_messages(map: &JsonMap) -> Result<Vec<ModelMessage>> {
    let messages = map
        .get("messages")
        .ok_or_else(|| CadenzaError::validation("messages", "messages is required"))?;
    if messages.is_null() {
        return Err(CadenzaError::reference(
            "messages",
            "messages reference resolved to nothing",
        ));
    }
    serde_json::from_value(messages.clone())
        .map_err(|e| CadenzaError::validation("messages", format!("invalid message list: {e}")))
}

fn extract_tool_names(map: &JsonMap) -> Result<Vec<String>> {
    match map.get("tools") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CadenzaError::validation("tools", "tools must be a list of tool names")
                })
            })
            .collect(),
        Some(other) => Err(CadenzaError::validation(
            "tools",
            format!("expected a list of tool names, got {other}"),
        )),
    }
}

fn record(text: String, usage: TokenUsage) -> Result<HandlerOutput> {
    let mut map = JsonMap::new();
    map.insert("text".to_string(), Value::String(text));
    map.insert("usage".to_string(), serde_json::to_value(usage)?);
    Ok(HandlerOutput::Record(map))
}

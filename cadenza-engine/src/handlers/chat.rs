//! The `chat` primitive: a streaming generation returned as a UI message
//! stream, short-circuiting the pipeline.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use cadenza_core::context::{ExecutionContext, JsonMap};
use cadenza_core::error::{CadenzaError, Result};
use cadenza_core::handler::{HandlerOutput, StepHandler};
use cadenza_core::message::UiMessage;
use cadenza_core::stream::{StreamEvent, StreamResponse};
use cadenza_core::vars::{resolve, ResolveScope};

use super::{as_object, DEFAULT_PROVIDER};
use crate::convert::MessageConverter;
use crate::provider::{GenerationRequest, ModelConfig, TokenChunk, TokenUsage};
use crate::registry::{CallbackEvent, LifecycleCallback, Registries};

/// Handler for `type: chat` steps.
///
/// Config mirrors `llm` plus `onFinish?`/`onError?` naming lifecycle
/// callbacks. The definitional difference from `llm` is the message shape:
/// resolved `messages` are UI messages with typed parts and are converted to
/// flat model messages before generation. The returned stream carries the
/// UI message stream framing and, when a trace is active, a transient
/// `data-trace` part ahead of the token stream.
pub struct ChatHandler {
    registries: Weak<Registries>,
}

impl ChatHandler {
    /// Create the handler over a registry bundle.
    #[must_use]
    pub fn new(registries: Weak<Registries>) -> Self {
        Self { registries }
    }

    fn lookup_callback(
        registries: &Registries,
        map: &JsonMap,
        key: &str,
    ) -> Option<Arc<dyn LifecycleCallback>> {
        let name = map.get(key).and_then(Value::as_str)?;
        let callback = registries.callbacks.get(name);
        if callback.is_none() {
            warn!("Callback '{}' named by {} is not registered; ignoring", name, key);
        }
        callback
    }
}

#[async_trait]
impl StepHandler for ChatHandler {
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
        let system = match map.get("system") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => {
                return Err(CadenzaError::validation(
                    "system",
                    format!("expected a string, got {other}"),
                ))
            }
        };

        let messages_value = map
            .get("messages")
            .ok_or_else(|| CadenzaError::validation("messages", "messages is required"))?;
        if messages_value.is_null() {
            return Err(CadenzaError::reference(
                "messages",
                "messages reference resolved to nothing",
            ));
        }
        let ui_messages: Vec<UiMessage> = serde_json::from_value(messages_value.clone())
            .map_err(|e| {
                CadenzaError::validation("messages", format!("invalid UI message list: {e}"))
            })?;
        let messages = MessageConverter::to_model_messages(&ui_messages);

        let on_finish = Self::lookup_callback(&registries, map, "onFinish");
        let on_error = Self::lookup_callback(&registries, map, "onError");

        let model = provider.create_model(&model_config).await?;
        let tokens = model.stream(GenerationRequest { system, messages }).await?;

        // Snapshot the trace before the stream detaches from the context.
        let trace_part = ctx.trace.as_ref().filter(|t| !t.is_empty()).map(|events| {
            StreamEvent::transient_data(
                "trace",
                format!("trace-{}", Uuid::new_v4()),
                json!({ "events": events }),
            )
        });

        let message_id = format!("msg_{}", Uuid::new_v4());
        let text_id = format!("txt_{}", Uuid::new_v4());

        let events = async_stream::stream! {
            yield StreamEvent::start_with_id(message_id);
            if let Some(part) = trace_part {
                yield part;
            }
            yield StreamEvent::text_start(text_id.clone());

            let mut text = String::new();
            let mut usage = TokenUsage::default();
            let mut failed = false;

            futures::pin_mut!(tokens);
            while let Some(chunk) = tokens.next().await {
                match chunk {
                    Ok(TokenChunk::Delta(delta)) => {
                        text.push_str(&delta);
                        yield StreamEvent::text_delta(text_id.clone(), delta);
                    }
                    Ok(TokenChunk::Done { usage: final_usage }) => {
                        usage = final_usage;
                    }
                    Err(error) => {
                        let message = error.to_string();
                        if let Some(callback) = &on_error {
                            callback
                                .invoke(CallbackEvent::Error { message: message.clone() })
                                .await;
                        }
                        yield StreamEvent::error(message);
                        failed = true;
                        break;
                    }
                }
            }

            yield StreamEvent::text_end(text_id.clone());

            if !failed {
                if let Some(callback) = &on_finish {
                    callback.invoke(CallbackEvent::Finish { text, usage }).await;
                }
                yield StreamEvent::finish();
            }
        };

        Ok(HandlerOutput::Stream(StreamResponse::new(events)))
    }
}

//! The `output-generator` primitive: a dependency-free deterministic
//! transform for reshaping step results.
//!
//! The `json` key parses structured content out of model text (unwrapping
//! fenced code blocks when present) into the `json` context variable; the
//! `template` key projects a response shape. Together they let a manifest
//! parse an LLM answer and build the final return value without another
//! model call.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use cadenza_core::context::ExecutionContext;
use cadenza_core::error::Result;
use cadenza_core::handler::{HandlerOutput, StepHandler};
use cadenza_core::vars::resolve_in_context;

use super::as_object;

/// Context variable populated by the `json` config key.
const JSON_VARIABLE: &str = "json";

/// Handler for `type: output-generator` steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputHandler;

impl OutputHandler {
    /// Create the handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepHandler for OutputHandler {
    async fn call(&self, config: &Value, ctx: &mut ExecutionContext) -> Result<HandlerOutput> {
        let map = as_object(config)?;

        let mut parsed_json: Option<Value> = None;
        if let Some(json_template) = map.get("json") {
            let resolved = resolve_in_context(json_template, ctx);
            let parsed = match resolved {
                Value::String(text) => match extract_json(&text)
                    .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
                {
                    Some(value) => value,
                    None => {
                        warn!("output-generator: could not parse JSON from resolved string");
                        Value::Object(Map::new())
                    }
                },
                Value::Null => {
                    warn!("output-generator: json reference resolved to nothing");
                    Value::Object(Map::new())
                }
                other => other,
            };
            ctx.set_variable(JSON_VARIABLE, parsed.clone());
            parsed_json = Some(parsed);
        }

        if let Some(template) = map.get("template") {
            let resolved = resolve_in_context(template, ctx);
            return Ok(HandlerOutput::record_from_value(resolved));
        }

        if let Some(Value::Object(parsed)) = parsed_json {
            return Ok(HandlerOutput::Record(parsed));
        }

        Ok(HandlerOutput::Record(Map::new()))
    }
}

/// Find the JSON payload inside free-form model text: the body of the first
/// fenced code block if one exists, otherwise the first balanced object or
/// array.
fn extract_json(text: &str) -> Option<&str> {
    if let Some(fenced) = extract_fenced(text) {
        return Some(fenced);
    }
    extract_balanced(text)
}

fn extract_fenced(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

fn extract_balanced(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

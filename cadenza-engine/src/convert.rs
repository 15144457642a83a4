//! Message conversion between the UI-message and model-message shapes, plus
//! the text protocol the tool loop speaks.
//!
//! The chat primitive converts part-structured UI messages to flat model
//! messages through [`MessageConverter`]; the llm primitive does not convert.
//! Keeping the converter behind this seam lets non-Web embedders substitute
//! their own conversion without touching the primitives.

use serde_json::Value;
use std::sync::Arc;

use cadenza_core::message::{MessageRole, ModelMessage, UiMessage, UiMessagePart, UiRole};

use crate::tool::Tool;

/// Utility for converting messages between the two shapes and for rendering
/// the tool protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageConverter;

impl MessageConverter {
    /// Convert UI messages (typed `parts`) to model messages (flat `content`).
    #[must_use]
    pub fn to_model_messages(messages: &[UiMessage]) -> Vec<ModelMessage> {
        messages.iter().map(Self::convert_single_message).collect()
    }

    /// Convert a single UI message to the model shape.
    #[must_use]
    pub fn convert_single_message(message: &UiMessage) -> ModelMessage {
        let role = match message.role {
            UiRole::User => MessageRole::User,
            UiRole::Assistant => MessageRole::Assistant,
            UiRole::System => MessageRole::System,
        };

        let content = message
            .parts
            .iter()
            .filter_map(|part| match part {
                UiMessagePart::Text { text } => Some(text.clone()),
                UiMessagePart::File { url, .. } => Some(format!("[file] {url}")),
                // Reasoning and data parts are client-side context only.
                UiMessagePart::Reasoning { .. } | UiMessagePart::Data { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        ModelMessage { role, content }
    }

    /// Render the tool catalog and calling protocol for the system prompt.
    #[must_use]
    pub fn render_tool_instructions(tools: &[Arc<dyn Tool>]) -> String {
        let names: Vec<String> = tools.iter().map(|tool| tool.name()).collect();

        let mut text = String::from("## Available Tools\n\n");
        for tool in tools {
            let schema = tool.schema();
            text.push_str(&format!(
                "- {}: {}\n  Parameters: {}\n",
                schema.name, schema.description, schema.parameters
            ));
        }
        text.push_str(&format!(
            "\nTo call a tool, respond with exactly:\n\
             Action: the tool to use, one of [{}]\n\
             Action Input: the input to the tool as a JSON object\n\
             \nAfter each Observation you may call another tool or answer directly.\n",
            names.join(", ")
        ));
        text
    }

    /// Extract tool calls from assistant message content.
    #[must_use]
    pub fn extract_tool_calls(content: &str) -> Vec<ToolCallExtraction> {
        let mut tool_calls = Vec::new();

        if content.contains("Action:") {
            let lines: Vec<&str> = content.lines().collect();
            for (i, line) in lines.iter().enumerate() {
                if line.trim().starts_with("Action:") {
                    if let Some(tool_name) = Self::extract_tool_name(line) {
                        let args = if i + 1 < lines.len() {
                            Self::extract_tool_args(lines[i + 1])
                        } else {
                            Value::Null
                        };

                        tool_calls.push(ToolCallExtraction {
                            tool_name,
                            arguments: args,
                        });
                    }
                }
            }
        }

        tool_calls
    }

    /// Extract tool name from an action line.
    fn extract_tool_name(line: &str) -> Option<String> {
        // Pattern: "Action: tool_name"
        if let Some(action_part) = line.trim().strip_prefix("Action:") {
            let tool_name = action_part.trim();
            if !tool_name.is_empty() {
                return Some(tool_name.to_string());
            }
        }
        None
    }

    /// Extract tool arguments from an action input line.
    fn extract_tool_args(line: &str) -> Value {
        // Pattern: "Action Input: {json}" or "Action Input: simple_string"
        if let Some(input_part) = line.trim().strip_prefix("Action Input:") {
            let input_str = input_part.trim();

            if let Ok(json_value) = serde_json::from_str(input_str) {
                return json_value;
            }

            return serde_json::json!({ "input": input_str });
        }

        Value::Null
    }

    /// Format a tool result for inclusion in the conversation.
    #[must_use]
    pub fn format_observation(tool_name: &str, result: &str) -> String {
        format!("Observation: Tool '{tool_name}' returned: {result}")
    }
}

/// Extracted tool call information.
#[derive(Debug, Clone)]
pub struct ToolCallExtraction {
    /// Name of the tool to call
    pub tool_name: String,
    /// Arguments for the tool call
    pub arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::EchoTool;

    #[test]
    fn test_convert_flattens_parts() {
        let messages = vec![UiMessage {
            id: Some("m1".to_string()),
            role: UiRole::User,
            parts: vec![
                UiMessagePart::Text {
                    text: "line one".to_string(),
                },
                UiMessagePart::Reasoning {
                    text: "hidden".to_string(),
                },
                UiMessagePart::Text {
                    text: "line two".to_string(),
                },
            ],
        }];

        let converted = MessageConverter::to_model_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, MessageRole::User);
        assert_eq!(converted[0].content, "line one\nline two");
    }

    #[test]
    fn test_convert_role_mapping() {
        let msg = UiMessage {
            id: None,
            role: UiRole::System,
            parts: vec![UiMessagePart::Text {
                text: "be terse".to_string(),
            }],
        };
        assert_eq!(
            MessageConverter::convert_single_message(&msg).role,
            MessageRole::System
        );
    }

    #[test]
    fn test_extract_tool_calls() {
        let content =
            "Thought: I need to echo.\nAction: echo\nAction Input: {\"message\": \"hi\"}";
        let calls = MessageConverter::extract_tool_calls(content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "echo");
        assert_eq!(calls[0].arguments["message"], "hi");
    }

    #[test]
    fn test_extract_tool_calls_non_json_input() {
        let content = "Action: search\nAction Input: rust workflow engines";
        let calls = MessageConverter::extract_tool_calls(content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["input"], "rust workflow engines");
    }

    #[test]
    fn test_no_tool_calls_in_plain_answer() {
        assert!(MessageConverter::extract_tool_calls("The answer is 42.").is_empty());
    }

    #[test]
    fn test_render_tool_instructions_lists_names() {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(EchoTool::new())];
        let text = MessageConverter::render_tool_instructions(&tools);
        assert!(text.contains("echo"));
        assert!(text.contains("Action Input"));
    }

    #[test]
    fn test_format_observation() {
        let obs = MessageConverter::format_observation("echo", "hi");
        assert_eq!(obs, "Observation: Tool 'echo' returned: hi");
    }
}

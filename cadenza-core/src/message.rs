//! The two message shapes that flow through the engine.
//!
//! [`ModelMessage`] is the flat-content shape model providers consume.
//! [`UiMessage`] is the part-structured shape interactive clients produce and
//! render. They are distinct nominal types with an explicit conversion (owned
//! by the engine's converter seam), never an overload of one another.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a model-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions
    System,
    /// End-user turn
    User,
    /// Model turn
    Assistant,
    /// Tool result turn
    Tool,
}

/// A model-facing message with flat string content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    /// Message role
    pub role: MessageRole,
    /// Flat text content
    pub content: String,
}

impl ModelMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a UI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    /// System message
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

/// A client-facing message composed of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    /// Unique identifier assigned by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Message role
    pub role: UiRole,

    /// Ordered content parts
    #[serde(default)]
    pub parts: Vec<UiMessagePart>,
}

/// One part of a UI message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiMessagePart {
    /// Plain text content
    Text {
        /// The text content
        text: String,
    },

    /// Model reasoning content
    Reasoning {
        /// The reasoning text
        text: String,
    },

    /// File attachment reference
    File {
        /// File URL
        url: String,
        /// IANA media type
        #[serde(rename = "mediaType")]
        media_type: String,
    },

    /// Application-defined data part (`data-*` typed)
    #[serde(untagged)]
    Data {
        /// Custom type name, by convention prefixed `data-`
        #[serde(rename = "type")]
        data_type: String,
        /// Data payload
        data: Value,
    },
}

impl UiMessage {
    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: UiRole::User,
            parts: vec![UiMessagePart::Text { text: text.into() }],
        }
    }

    /// Create an assistant message with a single text part.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: UiRole::Assistant,
            parts: vec![UiMessagePart::Text { text: text.into() }],
        }
    }

    /// Concatenated text of all text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                UiMessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

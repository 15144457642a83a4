//! Error types for the Cadenza workflow engine.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CadenzaError>;

/// Comprehensive error types for manifest loading and workflow execution
#[derive(Error, Debug)]
pub enum CadenzaError {
    /// Manifest parse errors (unreadable file, malformed YAML, forbidden tags)
    #[error("Failed to parse manifest '{path}': {message}")]
    Parse {
        /// Path or label of the offending document
        path: String,
        /// Parse cause
        message: String,
    },

    /// Structural validation errors (missing fields, duplicate ids, empty workflow)
    #[error("Validation error: {field} - {message}")]
    Validation {
        /// Field name
        field: String,
        /// Error message
        message: String,
    },

    /// A required variable reference resolved to nothing
    #[error("Reference error: {reference} - {message}")]
    Reference {
        /// The unresolved reference expression
        reference: String,
        /// Error message
        message: String,
    },

    /// A step named a type with no registered handler
    #[error("Unknown step type '{step_type}' for step '{step_id}'. Registered types: [{registered}]")]
    UnknownStepType {
        /// Step id from the manifest
        step_id: String,
        /// The unresolvable type
        step_type: String,
        /// Comma-separated list of registered handler types
        registered: String,
    },

    /// Step handler failures
    #[error("Handler error in step '{step_id}': {message}")]
    Handler {
        /// Step id from the manifest
        step_id: String,
        /// Error message
        message: String,
    },

    /// Model provider failures (unknown provider, client construction, generation)
    #[error("Provider error: {provider} - {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Tool-related errors
    #[error("Tool error: {tool_name} - {message}")]
    Tool {
        /// Tool name
        tool_name: String,
        /// Error message
        message: String,
    },

    /// Sub-agent composition errors
    #[error("Agent error: {agent_id} - {message}")]
    Agent {
        /// Agent id passed to `call-agent`
        agent_id: String,
        /// Error message
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic execution errors with context
    #[error("Execution error: {message}")]
    Execution {
        /// Error message
        message: String,
    },
}

impl CadenzaError {
    /// Create a parse error
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a reference error
    pub fn reference(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reference {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create an unknown-step-type error
    pub fn unknown_step_type(
        step_id: impl Into<String>,
        step_type: impl Into<String>,
        registered: impl Into<String>,
    ) -> Self {
        Self::UnknownStepType {
            step_id: step_id.into(),
            step_type: step_type.into(),
            registered: registered.into(),
        }
    }

    /// Create a handler error
    pub fn handler(step_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            step_id: step_id.into(),
            message: message.into(),
        }
    }

    /// Create a provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool error
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Create an agent error
    pub fn agent(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Agent {
            agent_id: agent_id.into(),
            message: message.into(),
        }
    }

    /// Create a generic execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Validation { .. } => "validation",
            Self::Reference { .. } => "reference",
            Self::UnknownStepType { .. } => "unknown_step_type",
            Self::Handler { .. } => "handler",
            Self::Provider { .. } => "provider",
            Self::Tool { .. } => "tool",
            Self::Agent { .. } => "agent",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::Execution { .. } => "execution",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CadenzaError::validation("workflow", "workflow must not be empty");
        assert!(matches!(err, CadenzaError::Validation { .. }));
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_error_display() {
        let err = CadenzaError::tool("echo", "tool not found in registry");
        let display = format!("{err}");
        assert!(display.contains("echo"));
        assert!(display.contains("tool not found in registry"));
    }

    #[test]
    fn test_unknown_step_type_lists_registered() {
        let err = CadenzaError::unknown_step_type("s1", "mystery", "llm, chat");
        let display = format!("{err}");
        assert!(display.contains("'mystery'"));
        assert!(display.contains("'s1'"));
        assert!(display.contains("llm, chat"));
    }
}

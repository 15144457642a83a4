//! Sanitized lifecycle events for workflow observability.
//!
//! Trace events record *that* a step ran and how it ended, never *what* it
//! did: no configuration values, no resolved references, no prompts, and no
//! raw error messages. Errors are reduced to a closed [`ErrorKind`] before
//! they reach an event. The field set of each event is closed; extending it
//! is a schema change, not a convenience.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CadenzaError;

/// A sanitized lifecycle event emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TraceEvent {
    /// A step is about to execute.
    StepStart {
        /// Step id from the manifest
        #[serde(rename = "stepId")]
        step_id: String,
        /// Step type from the manifest
        #[serde(rename = "stepType")]
        step_type: String,
        /// Zero-based position within the workflow
        #[serde(rename = "stepIndex")]
        step_index: usize,
        /// Total number of steps in the workflow
        #[serde(rename = "totalSteps")]
        total_steps: usize,
        /// Milliseconds since the Unix epoch
        timestamp: i64,
    },

    /// A step finished successfully.
    StepComplete {
        /// Step id from the manifest
        #[serde(rename = "stepId")]
        step_id: String,
        /// Step type from the manifest
        #[serde(rename = "stepType")]
        step_type: String,
        /// Zero-based position within the workflow
        #[serde(rename = "stepIndex")]
        step_index: usize,
        /// Total number of steps in the workflow
        #[serde(rename = "totalSteps")]
        total_steps: usize,
        /// Milliseconds since the Unix epoch
        timestamp: i64,
        /// Wall-clock step duration in milliseconds
        duration: u64,
    },

    /// A step failed.
    StepError {
        /// Step id from the manifest
        #[serde(rename = "stepId")]
        step_id: String,
        /// Step type from the manifest
        #[serde(rename = "stepType")]
        step_type: String,
        /// Zero-based position within the workflow
        #[serde(rename = "stepIndex")]
        step_index: usize,
        /// Total number of steps in the workflow
        #[serde(rename = "totalSteps")]
        total_steps: usize,
        /// Milliseconds since the Unix epoch
        timestamp: i64,
        /// Wall-clock step duration in milliseconds
        duration: u64,
        /// Classified failure kind; never the raw message
        #[serde(rename = "errorType")]
        error_type: ErrorKind,
    },
}

impl TraceEvent {
    /// Create a step-start event stamped with the current time.
    #[must_use]
    pub fn start(
        step_id: impl Into<String>,
        step_type: impl Into<String>,
        step_index: usize,
        total_steps: usize,
    ) -> Self {
        Self::StepStart {
            step_id: step_id.into(),
            step_type: step_type.into(),
            step_index,
            total_steps,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Create a step-complete event stamped with the current time.
    #[must_use]
    pub fn complete(
        step_id: impl Into<String>,
        step_type: impl Into<String>,
        step_index: usize,
        total_steps: usize,
        duration: u64,
    ) -> Self {
        Self::StepComplete {
            step_id: step_id.into(),
            step_type: step_type.into(),
            step_index,
            total_steps,
            timestamp: Utc::now().timestamp_millis(),
            duration,
        }
    }

    /// Create a step-error event stamped with the current time.
    #[must_use]
    pub fn error(
        step_id: impl Into<String>,
        step_type: impl Into<String>,
        step_index: usize,
        total_steps: usize,
        duration: u64,
        error_type: ErrorKind,
    ) -> Self {
        Self::StepError {
            step_id: step_id.into(),
            step_type: step_type.into(),
            step_index,
            total_steps,
            timestamp: Utc::now().timestamp_millis(),
            duration,
            error_type,
        }
    }

    /// The step id this event refers to.
    #[must_use]
    pub fn step_id(&self) -> &str {
        match self {
            Self::StepStart { step_id, .. }
            | Self::StepComplete { step_id, .. }
            | Self::StepError { step_id, .. } => step_id,
        }
    }

    /// The zero-based step index this event refers to.
    #[must_use]
    pub fn step_index(&self) -> usize {
        match self {
            Self::StepStart { step_index, .. }
            | Self::StepComplete { step_index, .. }
            | Self::StepError { step_index, .. } => *step_index,
        }
    }
}

/// Closed classification of step failures, safe to surface in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The operation exceeded a deadline
    Timeout,
    /// Authentication or authorization was refused
    AuthFailed,
    /// Input or configuration failed validation
    Validation,
    /// The network layer failed
    Network,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Classify an error by case-insensitive substring match over its
    /// rendered form. The rendered text stays here; only the kind escapes.
    #[must_use]
    pub fn classify(error: &CadenzaError) -> Self {
        Self::from_message(&error.to_string())
    }

    /// Classify an arbitrary error message.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        let text = message.to_lowercase();
        if text.contains("timeout") || text.contains("timed out") {
            Self::Timeout
        } else if text.contains("auth") || text.contains("unauthorized") {
            Self::AuthFailed
        } else if text.contains("valid") {
            Self::Validation
        } else if text.contains("network") || text.contains("econnrefused") {
            Self::Network
        } else {
            Self::Unknown
        }
    }

    /// The snake_case wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::AuthFailed => "auth_failed",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }
}

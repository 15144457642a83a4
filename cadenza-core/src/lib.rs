//! # Cadenza Core
//!
//! Core types and contracts for the Cadenza declarative workflow engine.
//!
//! This crate provides the foundational building blocks the engine crate
//! executes against:
//!
//! - **Manifest model**: [`AgentManifest`], [`WorkflowStep`], and the safe
//!   YAML loader that refuses executable payloads
//! - **Execution state**: [`ExecutionContext`] with insertion-ordered
//!   variables and optional tracing
//! - **Variable resolution**: whole-value and in-string substitution over
//!   `$input.*`, `$stepResult.*`, and `$env.*` references
//! - **Handler contract**: [`StepHandler`] and the [`HandlerOutput`]
//!   stream-or-record sum type
//! - **Message shapes**: model-facing [`ModelMessage`] and client-facing
//!   [`UiMessage`] as distinct nominal types
//! - **Observability**: sanitized [`TraceEvent`]s and the closed
//!   [`ErrorKind`] failure classification
//!
//! ## Quick Start
//!
//! ```rust
//! use cadenza_core::prelude::*;
//!
//! let manifest = parse_manifest(r#"
//! metadata:
//!   name: "greeter"
//!   version: "1.0"
//! workflow:
//!   - id: shape
//!     type: output-generator
//!     config:
//!       template:
//!         greeting: "Hello $input.name"
//! "#).unwrap();
//!
//! assert_eq!(manifest.workflow.len(), 1);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod error;
pub mod handler;
pub mod loader;
pub mod manifest;
pub mod message;
pub mod stream;
pub mod trace;
pub mod vars;

// Re-exports for convenience
pub use context::{ExecutionContext, JsonMap};
pub use error::{CadenzaError, Result};
pub use handler::{HandlerOutput, StepHandler};
pub use loader::{load_manifest, parse_manifest};
pub use manifest::{AgentManifest, Flag, ManifestMetadata, ObservabilitySettings, WorkflowStep};
pub use message::{MessageRole, ModelMessage, UiMessage, UiMessagePart, UiRole};
pub use stream::{EventStream, StreamEvent, StreamResponse};
pub use trace::{ErrorKind, TraceEvent};

/// Reserved key under which a collected trace is attached to blocking results.
pub const TRACE_KEY: &str = "__trace";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{ExecutionContext, JsonMap};
    pub use crate::error::{CadenzaError, Result};
    pub use crate::handler::{HandlerOutput, StepHandler};
    pub use crate::loader::{load_manifest, parse_manifest};
    pub use crate::manifest::{AgentManifest, ManifestMetadata, WorkflowStep};
    pub use crate::message::{MessageRole, ModelMessage, UiMessage, UiMessagePart, UiRole};
    pub use crate::stream::{StreamEvent, StreamResponse};
    pub use crate::trace::{ErrorKind, TraceEvent};
    pub use crate::vars::{resolve, resolve_in_context, ResolveScope};
    pub use crate::TRACE_KEY;
}

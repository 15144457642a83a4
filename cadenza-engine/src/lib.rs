//! # Cadenza Engine
//!
//! Workflow executor, registries, and core primitives for the Cadenza
//! declarative workflow engine.
//!
//! An agent is a YAML manifest: metadata, an ordered pipeline of steps, and
//! an optional return template. This crate executes those pipelines:
//!
//! - **Registries**: handler, provider, tool, and callback registries with
//!   last-write-wins override semantics
//! - **Executor**: strictly sequential scheduling with streaming
//!   short-circuit and sanitized per-step tracing
//! - **Primitives**: `llm` (blocking generation with a bounded tool loop),
//!   `chat` (streaming UI-message response), `output-generator`
//!   (deterministic JSON transform), and `call-agent` (sub-agent composition)
//! - **Providers**: siumai-backed `openai`, `anthropic`, and `ollama` model
//!   factories behind the [`ModelProvider`] seam
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cadenza_engine::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> cadenza_core::Result<()> {
//! let registries = Registries::with_builtins();
//! let manifest = cadenza_core::load_manifest("agents/support.yaml")?;
//!
//! let executor = WorkflowExecutor::new(manifest, registries);
//! match executor.execute(json!({"messages": []})).await? {
//!     HandlerOutput::Stream(response) => {
//!         // Forward response.into_sse() through the transport layer.
//!         let _ = response;
//!     }
//!     HandlerOutput::Record(record) => {
//!         println!("{}", serde_json::to_string_pretty(&record)?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod convert;
pub mod executor;
pub mod handlers;
pub mod provider;
pub mod registry;
pub mod tool;

// Re-exports for convenience
pub use convert::MessageConverter;
pub use executor::{WorkflowExecutor, MAX_AGENT_DEPTH};
pub use handlers::{
    CallAgentHandler, ChatHandler, LlmHandler, OutputHandler, DEFAULT_PROVIDER, MAX_TOOL_ROUNDS,
};
pub use provider::{
    Generation, GenerationRequest, ModelConfig, ModelHandle, ModelProvider, SiumaiProvider,
    TokenChunk, TokenStream, TokenUsage,
};
pub use registry::{
    AgentLocator, CallbackEvent, DirectoryLocator, LifecycleCallback, Registries, Registry,
};
pub use tool::{EchoTool, Tool, ToolResult, ToolSchema};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::convert::MessageConverter;
    pub use crate::executor::WorkflowExecutor;
    pub use crate::provider::{ModelHandle, ModelProvider, SiumaiProvider};
    pub use crate::registry::{AgentLocator, DirectoryLocator, LifecycleCallback, Registries};
    pub use crate::tool::{Tool, ToolResult, ToolSchema};

    pub use cadenza_core::prelude::*;
}

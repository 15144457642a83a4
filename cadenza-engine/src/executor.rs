//! Sequential workflow executor.
//!
//! Runs a manifest's steps strictly in order against a fresh
//! [`ExecutionContext`]. A step returning a record feeds downstream steps; a
//! step returning a stream ends the pipeline and the stream is forwarded to
//! the caller as-is. The executor is stateless across calls, so concurrent
//! executions of one manifest are independent.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, instrument};

use cadenza_core::context::{ExecutionContext, JsonMap};
use cadenza_core::error::{CadenzaError, Result};
use cadenza_core::handler::HandlerOutput;
use cadenza_core::manifest::AgentManifest;
use cadenza_core::trace::{ErrorKind, TraceEvent};
use cadenza_core::vars::resolve_in_context;
use cadenza_core::TRACE_KEY;

use crate::registry::Registries;

/// Maximum `call-agent` nesting before an execution is refused. Guards
/// against manifest cycles.
pub const MAX_AGENT_DEPTH: usize = 8;

/// Executes one agent manifest.
#[derive(Debug)]
pub struct WorkflowExecutor {
    manifest: AgentManifest,
    registries: Arc<Registries>,
    depth: usize,
}

impl WorkflowExecutor {
    /// Create an executor for a top-level execution.
    #[must_use]
    pub fn new(manifest: AgentManifest, registries: Arc<Registries>) -> Self {
        Self::with_depth(manifest, registries, 0)
    }

    /// Create an executor at a given sub-agent nesting level.
    #[must_use]
    pub fn with_depth(manifest: AgentManifest, registries: Arc<Registries>, depth: usize) -> Self {
        Self {
            manifest,
            registries,
            depth,
        }
    }

    /// The manifest this executor runs.
    #[must_use]
    pub fn manifest(&self) -> &AgentManifest {
        &self.manifest
    }

    /// Execute the workflow against an input payload.
    ///
    /// Returns either the short-circuiting stream of the first streaming
    /// step, or the blocking record shaped by the `return` template (falling
    /// back to the last step's output or the accumulated variables). When
    /// observability is enabled and events were recorded, the record carries
    /// them under the reserved `__trace` key.
    #[instrument(skip(self, input), fields(agent = %self.manifest.metadata.name, depth = self.depth))]
    pub async fn execute(&self, input: Value) -> Result<HandlerOutput> {
        if self.depth > MAX_AGENT_DEPTH {
            return Err(CadenzaError::validation(
                "call-agent",
                format!("maximum sub-agent depth exceeded ({MAX_AGENT_DEPTH})"),
            ));
        }

        let mut ctx = ExecutionContext::new(input).with_depth(self.depth);
        if self.manifest.observability_enabled() {
            ctx = ctx.with_trace();
        }

        let total_steps = self.manifest.workflow.len();
        let mut last_record: Option<JsonMap> = None;

        for (index, step) in self.manifest.workflow.iter().enumerate() {
            let handler = self.registries.handlers.get(&step.step_type).ok_or_else(|| {
                CadenzaError::unknown_step_type(
                    step.id.clone(),
                    step.step_type.clone(),
                    self.registries.handlers.names().join(", "),
                )
            })?;

            ctx.push_event(TraceEvent::start(
                step.id.clone(),
                step.step_type.clone(),
                index,
                total_steps,
            ));
            debug!("Executing step {}/{}: {}", index + 1, total_steps, step.id);
            let started = Instant::now();

            match handler.call(&step.config, &mut ctx).await {
                Ok(output) => {
                    let duration = started.elapsed().as_millis() as u64;
                    ctx.push_event(TraceEvent::complete(
                        step.id.clone(),
                        step.step_type.clone(),
                        index,
                        total_steps,
                        duration,
                    ));

                    match output {
                        HandlerOutput::Stream(response) => {
                            // Streaming ends the pipeline; the trace rides
                            // inside the stream (if the handler chose to),
                            // never on the return value.
                            debug!("Step '{}' returned a stream; short-circuiting", step.id);
                            return Ok(HandlerOutput::Stream(response));
                        }
                        HandlerOutput::Record(record) => {
                            if let Some(name) = &step.result {
                                ctx.set_variable(name.clone(), Value::Object(record.clone()));
                            }
                            last_record = Some(record);
                        }
                    }
                }
                Err(error) => {
                    let duration = started.elapsed().as_millis() as u64;
                    ctx.push_event(TraceEvent::error(
                        step.id.clone(),
                        step.step_type.clone(),
                        index,
                        total_steps,
                        duration,
                        ErrorKind::classify(&error),
                    ));
                    return Err(error);
                }
            }
        }

        let mut result = if let Some(template) = &self.manifest.return_template {
            match resolve_in_context(template, &ctx) {
                Value::Object(map) => map,
                other => {
                    let mut map = JsonMap::new();
                    map.insert("value".to_string(), other);
                    map
                }
            }
        } else if self
            .manifest
            .workflow
            .last()
            .is_some_and(|step| step.result.is_none())
        {
            last_record.unwrap_or_default()
        } else {
            ctx.variables.clone()
        };

        if ctx.has_trace_events() {
            if let Some(events) = &ctx.trace {
                // A trace that fails to serialize is dropped rather than
                // allowed to fail the execution.
                if let Ok(trace_value) = serde_json::to_value(events) {
                    result.insert(TRACE_KEY.to_string(), trace_value);
                }
            }
        }

        Ok(HandlerOutput::Record(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DirectoryLocator;
    use async_trait::async_trait;
    use cadenza_core::handler::StepHandler;
    use cadenza_core::loader::parse_manifest;
    use cadenza_core::stream::{StreamEvent, StreamResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Handler returning a fixed record and counting invocations.
    struct FixedHandler {
        record: JsonMap,
        calls: Arc<AtomicUsize>,
    }

    impl FixedHandler {
        fn new(record: Value) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let handler = Arc::new(Self {
                record: record.as_object().cloned().unwrap_or_default(),
                calls: Arc::clone(&calls),
            });
            (handler, calls)
        }
    }

    #[async_trait]
    impl StepHandler for FixedHandler {
        async fn call(&self, _: &Value, _: &mut ExecutionContext) -> Result<HandlerOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerOutput::Record(self.record.clone()))
        }
    }

    /// Handler returning a one-event stream and counting invocations.
    struct StreamingHandler {
        calls: Arc<AtomicUsize>,
    }

    impl StreamingHandler {
        fn new() -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl StepHandler for StreamingHandler {
        async fn call(&self, _: &Value, _: &mut ExecutionContext) -> Result<HandlerOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerOutput::Stream(StreamResponse::from_events(vec![
                StreamEvent::start(),
                StreamEvent::finish(),
            ])))
        }
    }

    /// Handler that always fails with a given message.
    struct FailingHandler(&'static str);

    #[async_trait]
    impl StepHandler for FailingHandler {
        async fn call(&self, _: &Value, _: &mut ExecutionContext) -> Result<HandlerOutput> {
            Err(CadenzaError::execution(self.0))
        }
    }

    fn empty_registries() -> Arc<Registries> {
        Registries::empty()
    }

    fn run_manifest(yaml: &str, registries: &Arc<Registries>) -> WorkflowExecutor {
        WorkflowExecutor::new(parse_manifest(yaml).unwrap(), Arc::clone(registries))
    }

    // Scenario 1: linear chain, no trace.
    #[tokio::test]
    async fn test_linear_chain_last_step_without_result() {
        let registries = empty_registries();
        let (llm, _) = FixedHandler::new(json!({"text": "hi", "usage": {}}));
        registries.handlers.register("llm", llm);
        registries
            .handlers
            .register("output-generator", Arc::new(crate::handlers::OutputHandler::new()));

        let executor = run_manifest(
            r#"
metadata:
  name: "chain"
  version: "1.0"
workflow:
  - id: s1
    type: llm
    result: out
  - id: s2
    type: output-generator
    config:
      template:
        text: "$stepResult.out.text"
"#,
            &registries,
        );

        let output = executor.execute(json!({})).await.unwrap();
        let map = output.into_record().unwrap();
        // The last step has no `result`, so its output is returned directly.
        assert_eq!(map["text"], json!("hi"));
        assert!(!map.contains_key("out"));
        assert!(!map.contains_key(TRACE_KEY));
    }

    #[tokio::test]
    async fn test_linear_chain_accumulates_when_last_step_named() {
        let registries = empty_registries();
        let (first, _) = FixedHandler::new(json!({"text": "one"}));
        let (second, _) = FixedHandler::new(json!({"text": "two"}));
        registries.handlers.register("first", first);
        registries.handlers.register("second", second);

        let executor = run_manifest(
            r#"
metadata:
  name: "accumulate"
  version: "1.0"
workflow:
  - id: a
    type: first
    result: a_out
  - id: b
    type: second
    result: b_out
"#,
            &registries,
        );

        let map = executor
            .execute(json!({}))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["a_out", "b_out"]);
        assert_eq!(map["a_out"]["text"], json!("one"));
        assert_eq!(map["b_out"]["text"], json!("two"));
    }

    // Scenario 2: streaming short-circuit.
    #[tokio::test]
    async fn test_streaming_short_circuit() {
        let registries = empty_registries();
        let (chat, chat_calls) = StreamingHandler::new();
        let (llm, llm_calls) = FixedHandler::new(json!({"text": "never"}));
        registries.handlers.register("chat", chat);
        registries.handlers.register("llm", llm);

        let executor = run_manifest(
            r#"
metadata:
  name: "stream"
  version: "1.0"
workflow:
  - id: c
    type: chat
  - id: after
    type: llm
    result: out
"#,
            &registries,
        );

        let output = executor.execute(json!({})).await.unwrap();
        assert!(output.is_stream());
        assert_eq!(chat_calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm_calls.load(Ordering::SeqCst), 0);
    }

    // Scenario 3: JSON parse output.
    #[tokio::test]
    async fn test_json_parse_pipeline() {
        let registries = empty_registries();
        let (producer, _) = FixedHandler::new(json!({
            "text": "```json\n{\"tags\": [\"a\", \"b\"]}\n```"
        }));
        registries.handlers.register("producer", producer);
        registries
            .handlers
            .register("output-generator", Arc::new(crate::handlers::OutputHandler::new()));

        let executor = run_manifest(
            r#"
metadata:
  name: "parse"
  version: "1.0"
workflow:
  - id: make
    type: producer
    result: x
  - id: shape
    type: output-generator
    config:
      json: "$stepResult.x.text"
      template:
        tags: "$json.tags"
"#,
            &registries,
        );

        let map = executor
            .execute(json!({}))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(map["tags"], json!(["a", "b"]));
    }

    // Scenario 4: return template shaping.
    #[tokio::test]
    async fn test_return_template_is_pure_projection() {
        let registries = empty_registries();
        let (first, _) = FixedHandler::new(json!({"text": "ignored"}));
        let (second, _) = FixedHandler::new(json!({"text": "done"}));
        registries.handlers.register("first", first);
        registries.handlers.register("second", second);

        let executor = run_manifest(
            r#"
metadata:
  name: "shaped"
  version: "1.0"
workflow:
  - id: s1
    type: first
    result: s1
  - id: s2
    type: second
    result: s2
return:
  ok: true
  v: "$stepResult.s2.text"
"#,
            &registries,
        );

        let map = executor
            .execute(json!({}))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(map["ok"], json!(true));
        assert_eq!(map["v"], json!("done"));
        // No accumulated keys leak through the projection.
        assert!(!map.contains_key("s1"));
        assert!(!map.contains_key("s2"));
    }

    #[tokio::test]
    async fn test_non_mapping_return_template_wrapped() {
        let registries = empty_registries();
        let (only, _) = FixedHandler::new(json!({"text": "x"}));
        registries.handlers.register("only", only);

        let executor = run_manifest(
            r#"
metadata:
  name: "scalar-return"
  version: "1.0"
workflow:
  - id: s1
    type: only
    result: s1
return: "$stepResult.s1.text"
"#,
            &registries,
        );

        let map = executor
            .execute(json!({}))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(map["value"], json!("x"));
    }

    // Scenario 5: observability, blocking path.
    #[tokio::test]
    async fn test_blocking_trace_event_ordering() {
        let registries = empty_registries();
        let (handler, _) = FixedHandler::new(json!({"n": 1}));
        registries.handlers.register("step", handler);

        let executor = run_manifest(
            r#"
metadata:
  name: "traced"
  version: "1.0"
  observability:
    enabled: true
workflow:
  - id: a
    type: step
    result: a
  - id: b
    type: step
    result: b
  - id: c
    type: step
    result: c
"#,
            &registries,
        );

        let map = executor
            .execute(json!({}))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        let trace: Vec<TraceEvent> =
            serde_json::from_value(map[TRACE_KEY].clone()).unwrap();
        assert_eq!(trace.len(), 6);

        let expected = [
            ("a", true),
            ("a", false),
            ("b", true),
            ("b", false),
            ("c", true),
            ("c", false),
        ];
        for (event, (id, is_start)) in trace.iter().zip(expected) {
            assert_eq!(event.step_id(), id);
            assert_eq!(matches!(event, TraceEvent::StepStart { .. }), is_start);
            if let TraceEvent::StepComplete { duration, .. } = event {
                // Durations are unsigned; asserting presence is the point.
                let _ = duration;
            }
        }
    }

    #[tokio::test]
    async fn test_trace_absent_when_disabled() {
        let registries = empty_registries();
        let (handler, _) = FixedHandler::new(json!({"n": 1}));
        registries.handlers.register("step", handler);

        let executor = run_manifest(
            r#"
metadata:
  name: "untraced"
  version: "1.0"
workflow:
  - id: a
    type: step
    result: a
"#,
            &registries,
        );

        let map = executor
            .execute(json!({}))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert!(!map.contains_key(TRACE_KEY));
    }

    // Scenario 6: error classification without message leakage.
    #[tokio::test]
    async fn test_error_propagates_and_classifies() {
        let registries = empty_registries();
        let (ok, _) = FixedHandler::new(json!({"n": 1}));
        registries.handlers.register("ok", ok);
        registries
            .handlers
            .register("fails", Arc::new(FailingHandler("connect ECONNREFUSED 10.0.0.1:443")));

        let executor = run_manifest(
            r#"
metadata:
  name: "failing"
  version: "1.0"
  observability:
    enabled: true
workflow:
  - id: fine
    type: ok
    result: fine
  - id: broken
    type: fails
"#,
            &registries,
        );

        let err = executor.execute(json!({})).await.unwrap_err();
        assert!(format!("{err}").contains("ECONNREFUSED"));
        assert_eq!(ErrorKind::classify(&err), ErrorKind::Network);

        // The sanitized event itself carries the kind, not the message.
        let event = TraceEvent::error("broken", "fails", 1, 2, 1, ErrorKind::classify(&err));
        let rendered = serde_json::to_string(&event).unwrap();
        assert!(rendered.contains("\"errorType\":\"network\""));
        assert!(!rendered.contains("ECONNREFUSED"));
    }

    #[tokio::test]
    async fn test_unknown_step_type_names_step_and_lists_types() {
        let registries = empty_registries();
        let (handler, _) = FixedHandler::new(json!({}));
        registries.handlers.register("known", handler);

        let executor = run_manifest(
            r#"
metadata:
  name: "unknown"
  version: "1.0"
workflow:
  - id: s1
    type: mystery
"#,
            &registries,
        );

        let err = executor.execute(json!({})).await.unwrap_err();
        let message = format!("{err}");
        assert!(message.contains("mystery"));
        assert!(message.contains("s1"));
        assert!(message.contains("known"));
    }

    #[tokio::test]
    async fn test_depth_limit_breaks_agent_cycles() {
        // An agent that calls itself; the depth limit must stop it.
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("loop.yaml"),
            r#"
metadata:
  name: "loop"
  version: "1.0"
workflow:
  - id: again
    type: call-agent
    config:
      agentId: loop
"#,
        )
        .unwrap();

        let registries = Registries::with_builtins();
        registries.set_locator(Arc::new(DirectoryLocator::new(dir.path())));

        let manifest = cadenza_core::loader::load_manifest(dir.path().join("loop.yaml")).unwrap();
        let executor = WorkflowExecutor::new(manifest, registries);
        let err = executor.execute(json!({})).await.unwrap_err();
        assert!(format!("{err}").contains("depth"));
    }

    #[tokio::test]
    async fn test_identical_runs_yield_identical_returns() {
        let registries = empty_registries();
        let (handler, _) = FixedHandler::new(json!({"text": "stable"}));
        registries.handlers.register("step", handler);

        let yaml = r#"
metadata:
  name: "deterministic"
  version: "1.0"
workflow:
  - id: s1
    type: step
    result: s1
return:
  v: "$stepResult.s1.text"
"#;
        let first = run_manifest(yaml, &registries)
            .execute(json!({}))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        let second = run_manifest(yaml, &registries)
            .execute(json!({}))
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(first, second);
    }
}

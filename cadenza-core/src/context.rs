//! Per-execution state shared across workflow steps.

use serde_json::Value;

use crate::trace::TraceEvent;

/// Insertion-preserving JSON mapping used for context variables and records.
///
/// The workspace enables serde_json's `preserve_order` feature, so this map
/// iterates in insertion order.
pub type JsonMap = serde_json::Map<String, Value>;

/// Execution state carried through one `execute` call.
///
/// Created by the executor, lent to step handlers, and discarded when the
/// top-level call returns. Handlers mutate it only through the variables
/// slot, conventionally by returning a record the executor writes.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Opaque request payload, conventionally a mapping containing `messages`
    pub input: Value,

    /// Step results stored by variable name, in insertion order
    pub variables: JsonMap,

    /// Lifecycle events, present only when observability is enabled
    pub trace: Option<Vec<TraceEvent>>,

    /// Sub-agent nesting level of this execution (0 for top-level calls)
    pub depth: usize,
}

impl ExecutionContext {
    /// Create a context for a top-level execution without tracing.
    #[must_use]
    pub fn new(input: Value) -> Self {
        Self {
            input,
            variables: JsonMap::new(),
            trace: None,
            depth: 0,
        }
    }

    /// Enable trace collection on this context.
    #[must_use]
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    /// Set the sub-agent nesting level.
    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Store a step result under a variable name.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Look up a stored variable.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Append a trace event. A no-op when tracing is disabled; never fails,
    /// so trace bookkeeping cannot mask a step error.
    pub fn push_event(&mut self, event: TraceEvent) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(event);
        }
    }

    /// Whether tracing is enabled and at least one event was recorded.
    #[must_use]
    pub fn has_trace_events(&self) -> bool {
        self.trace.as_ref().is_some_and(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceEvent;
    use serde_json::json;

    #[test]
    fn test_variables_preserve_insertion_order() {
        let mut ctx = ExecutionContext::new(json!({}));
        ctx.set_variable("zeta", json!(1));
        ctx.set_variable("alpha", json!(2));
        ctx.set_variable("mid", json!(3));

        let keys: Vec<_> = ctx.variables.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_push_event_without_trace_is_noop() {
        let mut ctx = ExecutionContext::new(json!({}));
        ctx.push_event(TraceEvent::start("s1", "llm", 0, 1));
        assert!(ctx.trace.is_none());
        assert!(!ctx.has_trace_events());
    }

    #[test]
    fn test_push_event_with_trace() {
        let mut ctx = ExecutionContext::new(json!({})).with_trace();
        assert!(!ctx.has_trace_events());
        ctx.push_event(TraceEvent::start("s1", "llm", 0, 1));
        assert!(ctx.has_trace_events());
        assert_eq!(ctx.trace.as_ref().unwrap().len(), 1);
    }
}

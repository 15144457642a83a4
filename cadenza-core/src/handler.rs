//! The uniform step handler contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::{ExecutionContext, JsonMap};
use crate::error::Result;
use crate::stream::StreamResponse;

/// What a step handler produced: either a streaming response that terminates
/// the pipeline, or a record that feeds downstream steps.
///
/// This sum type is the central abstraction of the engine. A handler
/// returning [`HandlerOutput::Record`] must not begin or own any stream; a
/// handler returning [`HandlerOutput::Stream`] transfers stream ownership to
/// the executor, which forwards it to the caller untouched.
#[derive(Debug)]
pub enum HandlerOutput {
    /// A streaming response; the pipeline ends here
    Stream(StreamResponse),
    /// A typed record, stored under the step's `result` variable when set
    Record(JsonMap),
}

impl HandlerOutput {
    /// Wrap a record map.
    #[must_use]
    pub fn record(map: JsonMap) -> Self {
        Self::Record(map)
    }

    /// Build a record from a JSON value, wrapping non-objects as
    /// `{"value": ...}`.
    #[must_use]
    pub fn record_from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Record(map),
            other => {
                let mut map = JsonMap::new();
                map.insert("value".to_string(), other);
                Self::Record(map)
            }
        }
    }

    /// Whether this output is a stream.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Unwrap the record, if this output is one.
    #[must_use]
    pub fn into_record(self) -> Option<JsonMap> {
        match self {
            Self::Record(map) => Some(map),
            Self::Stream(_) => None,
        }
    }
}

/// A step handler: the implementation bound to a workflow step `type`.
///
/// Handlers receive the step's raw configuration and are responsible for
/// resolving any variable references inside it. They may suspend freely; the
/// executor awaits each step to completion before starting the next.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Execute one step against the shared context.
    async fn call(&self, config: &Value, ctx: &mut ExecutionContext) -> Result<HandlerOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_value_wraps_scalars() {
        let output = HandlerOutput::record_from_value(json!("plain"));
        let map = output.into_record().unwrap();
        assert_eq!(map.get("value"), Some(&json!("plain")));
    }

    #[test]
    fn test_record_from_value_keeps_objects() {
        let output = HandlerOutput::record_from_value(json!({"text": "hi"}));
        let map = output.into_record().unwrap();
        assert_eq!(map.get("text"), Some(&json!("hi")));
        assert!(map.get("value").is_none());
    }

    #[test]
    fn test_stream_outputs_are_not_records() {
        let output = HandlerOutput::Stream(crate::stream::StreamResponse::from_events(Vec::new()));
        assert!(output.is_stream());
        assert!(output.into_record().is_none());
    }
}

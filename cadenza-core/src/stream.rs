//! UI message stream events and the streaming response wrapper.
//!
//! Streaming handlers synthesize a sequence of [`StreamEvent`]s following the
//! start/delta/end pattern and hand it to the executor as a
//! [`StreamResponse`], which the host transport forwards, most simply as
//! Server-Sent Events via [`StreamResponse::into_sse`].

use std::fmt;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event of a UI message stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Beginning of a new message.
    #[serde(rename = "start")]
    Start {
        /// Unique identifier for this message
        #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Beginning of a text block.
    TextStart {
        /// Identifier for this text block
        id: String,
    },

    /// Incremental text content.
    TextDelta {
        /// Identifier matching the text-start event
        id: String,
        /// Incremental text content
        delta: String,
    },

    /// End of a text block.
    TextEnd {
        /// Identifier matching the text-start event
        id: String,
    },

    /// Stream failure surfaced to the client.
    Error {
        /// Error text
        #[serde(rename = "errorText")]
        error_text: String,
    },

    /// End of the message.
    Finish,

    /// Application-defined data event (`data-*` typed). Transient parts are
    /// delivered to the client but not appended to the persisted message.
    #[serde(untagged)]
    Data {
        /// Custom type name, by convention prefixed `data-`
        #[serde(rename = "type")]
        data_type: String,
        /// Stable part identifier
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Data payload
        data: Value,
        /// Whether the part is delivery-only
        #[serde(skip_serializing_if = "Option::is_none")]
        transient: Option<bool>,
    },
}

impl StreamEvent {
    /// Create a message-start event without an id.
    #[must_use]
    pub fn start() -> Self {
        Self::Start { message_id: None }
    }

    /// Create a message-start event with an id.
    pub fn start_with_id(message_id: impl Into<String>) -> Self {
        Self::Start {
            message_id: Some(message_id.into()),
        }
    }

    /// Create a text-start event.
    pub fn text_start(id: impl Into<String>) -> Self {
        Self::TextStart { id: id.into() }
    }

    /// Create a text-delta event.
    pub fn text_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    /// Create a text-end event.
    pub fn text_end(id: impl Into<String>) -> Self {
        Self::TextEnd { id: id.into() }
    }

    /// Create an error event.
    pub fn error(error_text: impl Into<String>) -> Self {
        Self::Error {
            error_text: error_text.into(),
        }
    }

    /// Create a finish event.
    #[must_use]
    pub fn finish() -> Self {
        Self::Finish
    }

    /// Create a custom data event; `name` is prefixed with `data-`.
    pub fn data(name: impl Into<String>, data: Value) -> Self {
        Self::Data {
            data_type: format!("data-{}", name.into()),
            id: None,
            data,
            transient: None,
        }
    }

    /// Create a transient data event with a stable part id.
    pub fn transient_data(name: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self::Data {
            data_type: format!("data-{}", name.into()),
            id: Some(id.into()),
            data,
            transient: Some(true),
        }
    }
}

/// A boxed stream of UI message events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A streaming handler response.
///
/// Terminates the pipeline when returned from a step: the executor forwards
/// it to the caller without invoking further steps. Ownership of the inner
/// stream transfers with the value.
pub struct StreamResponse {
    inner: EventStream,
}

impl StreamResponse {
    /// Wrap an event stream.
    pub fn new(stream: impl Stream<Item = StreamEvent> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Build a response from a fixed event sequence.
    #[must_use]
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        Self::new(futures::stream::iter(events))
    }

    /// Unwrap the inner event stream.
    #[must_use]
    pub fn into_inner(self) -> EventStream {
        self.inner
    }

    /// Encode the stream as Server-Sent Events `data: {json}\n\n` lines,
    /// suitable for direct forwarding by an HTTP layer.
    #[must_use]
    pub fn into_sse(self) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        Box::pin(self.inner.filter_map(|event| async move {
            serde_json::to_string(&event)
                .ok()
                .map(|json| format!("data: {json}\n\n"))
        }))
    }

    /// Drain the stream into a vector. Intended for tests.
    pub async fn collect_events(self) -> Vec<StreamEvent> {
        self.inner.collect().await
    }
}

impl fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("inner", &"<event stream>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let event = StreamEvent::text_delta("txt_0", "Hello");
        let json_event = serde_json::to_value(&event).unwrap();
        assert_eq!(json_event, json!({"type": "text-delta", "id": "txt_0", "delta": "Hello"}));

        let finish = serde_json::to_value(StreamEvent::finish()).unwrap();
        assert_eq!(finish, json!({"type": "finish"}));
    }

    #[test]
    fn test_transient_data_event_shape() {
        let event = StreamEvent::transient_data("trace", "trace-1", json!({"events": []}));
        let json_event = serde_json::to_value(&event).unwrap();
        assert_eq!(json_event["type"], "data-trace");
        assert_eq!(json_event["id"], "trace-1");
        assert_eq!(json_event["transient"], true);
        assert_eq!(json_event["data"], json!({"events": []}));
    }

    #[tokio::test]
    async fn test_collect_events_preserves_order() {
        let response = StreamResponse::from_events(vec![
            StreamEvent::start(),
            StreamEvent::text_start("t"),
            StreamEvent::text_delta("t", "hi"),
            StreamEvent::text_end("t"),
            StreamEvent::finish(),
        ]);
        let events = response.collect_events().await;
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], StreamEvent::start());
        assert_eq!(events[4], StreamEvent::finish());
    }

    #[tokio::test]
    async fn test_sse_framing() {
        let response = StreamResponse::from_events(vec![StreamEvent::text_delta("t", "hi")]);
        let lines: Vec<String> = response.into_sse().collect().await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("data: "));
        assert!(lines[0].ends_with("\n\n"));
        assert!(lines[0].contains("text-delta"));
    }
}

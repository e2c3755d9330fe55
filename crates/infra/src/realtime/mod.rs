//! Realtime publication over a pub/sub sink.
//!
//! The sink is an external collaborator: it accepts an opaque subscriber key
//! (the agent's `pubsub_token`) and a payload, and owes no response. The
//! [`RealtimePublisher`] addresses it with the token carried in the event's
//! `user` object and pushes the `push_event_data` view.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use supportflow_events::{Event, Listener, ListenerError};

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::RedisRealtimeSink;

/// Sink transport failure.
#[derive(Debug, Error)]
#[error("sink unavailable: {0}")]
pub struct SinkError(pub String);

/// Pub/sub sink addressed by an opaque per-subscriber key.
pub trait RealtimeSink: Send + Sync {
    fn push(&self, subscriber_key: &str, payload: &JsonValue) -> Result<(), SinkError>;
}

impl<S> RealtimeSink for Arc<S>
where
    S: RealtimeSink + ?Sized,
{
    fn push(&self, subscriber_key: &str, payload: &JsonValue) -> Result<(), SinkError> {
        (**self).push(subscriber_key, payload)
    }
}

/// In-memory sink for tests/dev. Records every push.
#[derive(Debug, Default)]
pub struct InMemoryRealtimeSink {
    pushes: Mutex<Vec<(String, JsonValue)>>,
}

impl InMemoryRealtimeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every (subscriber key, payload) pair pushed so far, in push order.
    pub fn pushes(&self) -> Vec<(String, JsonValue)> {
        self.pushes.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl RealtimeSink for InMemoryRealtimeSink {
    fn push(&self, subscriber_key: &str, payload: &JsonValue) -> Result<(), SinkError> {
        self.pushes
            .lock()
            .map_err(|_| SinkError("recorder lock poisoned".to_string()))?
            .push((subscriber_key.to_string(), payload.clone()));
        Ok(())
    }
}

/// Pushes realtime updates for events that carry a subscriber.
pub struct RealtimePublisher<S> {
    sink: S,
}

impl<S> RealtimePublisher<S>
where
    S: RealtimeSink,
{
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    fn message(event: &Event) -> JsonValue {
        // User-carrying events push the compact push_event_data view; other
        // events push their payload as-is.
        let data = match event.payload().user() {
            Some(user) => json!({
                "name": user.get("name").cloned().unwrap_or(JsonValue::Null),
                "avatar_url": user.get("avatar_url").cloned().unwrap_or(JsonValue::Null),
            }),
            None => event.payload().to_value(),
        };

        json!({
            "event": event.kind().as_str(),
            "data": data,
        })
    }
}

impl<S> Listener for RealtimePublisher<S>
where
    S: RealtimeSink,
{
    fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        let key = event
            .payload()
            .user_str("pubsub_token")
            .ok_or(ListenerError::MissingAttribute("user.pubsub_token"))?;

        self.sink
            .push(key, &Self::message(event))
            .map_err(|e| ListenerError::Sink(e.to_string()))
    }
}

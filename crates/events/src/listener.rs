//! The listener contract: one independent unit of work per event kind.

use std::sync::Arc;

use thiserror::Error;

use crate::event::Event;

/// Stable identity of a listener registration.
///
/// Identities make registration order deterministic to reason about and let
/// tests introspect/remove specific registrations. They are plain names
/// ("notification_materializer"), not generated ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(String);

impl ListenerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListenerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ListenerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Failure raised inside a listener's `handle`.
///
/// These are absorbed by the dispatcher into the dispatch outcome. They are
/// observability data, never control flow back to the producer.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// A persistent write failed (e.g. the notification-settings store).
    #[error("store write failed: {0}")]
    Store(String),

    /// Outbound delivery failed (e.g. webhook endpoint unreachable or 4xx/5xx).
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The realtime sink was unavailable.
    #[error("realtime sink unavailable: {0}")]
    Sink(String),

    /// The event payload is missing an attribute this listener requires.
    #[error("event payload missing attribute `{0}`")]
    MissingAttribute(&'static str),

    /// Anything else a listener implementation needs to surface.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A unit of work reacting to one event kind.
///
/// # Contract
/// - `handle` runs synchronously on the dispatching thread; blocking I/O is
///   allowed and delays only listeners later in the same dispatch.
/// - Implementations must be safe to invoke twice with the same logical
///   event (producers may re-dispatch under retry); idempotence is each
///   listener's own concern, not the dispatcher's.
/// - Implementations own their external resources (store handle, HTTP
///   client, pub/sub sink) and any per-call timeout those need.
pub trait Listener: Send + Sync {
    fn handle(&self, event: &Event) -> Result<(), ListenerError>;
}

impl<L> Listener for Arc<L>
where
    L: Listener + ?Sized,
{
    fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        (**self).handle(event)
    }
}

//! The fan-out engine.
//!
//! `Dispatcher::dispatch` resolves every listener registered for an event's
//! kind and invokes each one **synchronously, in registration order, under
//! fault isolation**. Ordering matters because later listeners may depend on
//! earlier ones having completed (webhook emission after notification-setting
//! persistence); isolation matters because a slow or failing listener (a
//! webhook network call) must never block or corrupt the listeners after it,
//! nor roll back the producer's own persistence. Ordering without coupling
//! failure domains is the whole point of this component.
//!
//! ## Error semantics
//!
//! - An unrecognized event name on the string-named path →
//!   [`DispatchError::UnknownEventKind`]; no listener runs.
//! - A listener `Err` → captured into the [`DispatchOutcome`], attributed to
//!   that listener's identity, logged, and never propagated. The producer's
//!   call is fire-and-record: lifecycle code must not fail a user-facing
//!   create/update/destroy because a downstream notification failed.
//!
//! ## Concurrency
//!
//! The dispatcher is stateless across calls and `Clone` (it holds the
//! registry by `Arc`). Independent dispatches may run concurrently on
//! different threads; the registry is read-only after startup, so they
//! contend on nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::{Event, EventError, EventKind, Payload};
use crate::listener::{ListenerError, ListenerId};
use crate::registry::ListenerRegistry;

/// Producer-visible dispatch failure.
///
/// This is the only error a producer ever sees from dispatch; listener
/// failures are absorbed into the outcome instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    UnknownEventKind(#[from] EventError),
}

/// Per-listener delivery record inside a [`DispatchOutcome`].
#[derive(Debug)]
pub struct Delivery {
    listener: ListenerId,
    result: Result<(), ListenerError>,
}

impl Delivery {
    pub fn listener(&self) -> &ListenerId {
        &self.listener
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&ListenerError> {
        self.result.as_ref().err()
    }
}

/// Aggregate result of one dispatch: success or a captured failure for each
/// listener, in invocation order.
///
/// Producers are not required to inspect this; it exists for observability,
/// never for control flow back to the caller.
#[derive(Debug)]
pub struct DispatchOutcome {
    kind: EventKind,
    deliveries: Vec<Delivery>,
}

impl DispatchOutcome {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Number of listeners invoked.
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    /// True when no listener was registered for the kind (a valid outcome,
    /// e.g. during early bring-up or tests).
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// True when every invoked listener succeeded (vacuously true for zero
    /// listeners).
    pub fn fully_delivered(&self) -> bool {
        self.deliveries.iter().all(Delivery::succeeded)
    }

    /// The deliveries that failed, in invocation order.
    pub fn failures(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|d| !d.succeeded())
    }
}

/// The fan-out engine. Owns the registry handle and the dispatch loop,
/// nothing else: every external resource belongs to some listener.
///
/// Constructed once by application startup code and passed by handle to every
/// call site that needs to dispatch; there is no ambient global instance.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ListenerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Fan an event out to every listener registered for its kind.
    ///
    /// Listeners run synchronously on the calling thread, in registration
    /// order. A failure is captured into the outcome and does not prevent
    /// subsequent listeners from running. The event is consumed; listeners
    /// observe it by shared reference and nothing retains it after this
    /// returns.
    pub fn dispatch(&self, event: Event) -> DispatchOutcome {
        let kind = event.kind();
        let registrations = self.registry.listeners_for(kind);

        debug!(kind = %kind, listeners = registrations.len(), "dispatching event");

        let mut deliveries = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let result = registration.listener().handle(&event);

            if let Err(error) = &result {
                warn!(
                    listener = %registration.id(),
                    kind = %kind,
                    error = %error,
                    "listener failed; continuing with remaining listeners"
                );
            }

            deliveries.push(Delivery {
                listener: registration.id().clone(),
                result,
            });
        }

        DispatchOutcome { kind, deliveries }
    }

    /// String-named producer contract: `dispatch_named("agent.added", now,
    /// payload)`.
    ///
    /// Fails with [`DispatchError::UnknownEventKind`], invoking no
    /// listeners, when the name is outside the vocabulary. The dispatcher
    /// refuses to proceed rather than silently dropping the event.
    pub fn dispatch_named(
        &self,
        name: &str,
        occurred_at: DateTime<Utc>,
        payload: Payload,
    ) -> Result<DispatchOutcome, DispatchError> {
        let event = Event::parse(name, occurred_at, payload)?;
        Ok(self.dispatch(event))
    }
}

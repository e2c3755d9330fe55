//! `supportflow-events` — the domain event dispatcher.
//!
//! A process-wide fan-out mechanism: model lifecycle code constructs an
//! [`Event`] and hands it to the [`Dispatcher`], which delivers it to every
//! [`Listener`] registered for that event kind, in registration order, under
//! fault isolation. A failing listener is recorded in the
//! [`DispatchOutcome`]; it never aborts sibling listeners and never
//! propagates to the producer.

pub mod dispatcher;
pub mod event;
pub mod listener;
pub mod registry;

pub use dispatcher::{Delivery, DispatchError, DispatchOutcome, Dispatcher};
pub use event::{Event, EventError, EventKind, Payload};
pub use listener::{Listener, ListenerError, ListenerId};
pub use registry::{ListenerRegistry, Registration, RegistryError};

//! Ordered, name-keyed table of listener registrations.
//!
//! The registry is built with `&mut self` during process startup (or test
//! setup), then shared read-only behind an `Arc` for the process lifetime.
//! Steady-state dispatch only reads it, so concurrent dispatches need no
//! locking.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::event::EventKind;
use crate::listener::{Listener, ListenerId};

/// Registry configuration error.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The same identity was registered twice for one event kind. This is a
    /// startup bug; it is rejected rather than silently ignored so wiring
    /// mistakes surface immediately.
    #[error("duplicate registration of `{id}` for {kind}")]
    DuplicateRegistration { kind: EventKind, id: ListenerId },
}

/// One entry: an identity bound to a listener capability.
#[derive(Clone)]
pub struct Registration {
    id: ListenerId,
    listener: Arc<dyn Listener>,
}

impl Registration {
    pub fn id(&self) -> &ListenerId {
        &self.id
    }

    pub fn listener(&self) -> &Arc<dyn Listener> {
        &self.listener
    }
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

/// Maps event kinds to their ordered listener registrations.
///
/// # Invariants
/// - Registrations for a kind are kept (and later invoked) in registration
///   order.
/// - A (kind, identity) pair appears at most once.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    entries: HashMap<EventKind, Vec<Registration>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener to the ordered list for `kind`.
    ///
    /// Fails with [`RegistryError::DuplicateRegistration`] when `id` is
    /// already registered for that kind; the registry is left unchanged.
    pub fn register(
        &mut self,
        kind: EventKind,
        id: impl Into<ListenerId>,
        listener: Arc<dyn Listener>,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        let entries = self.entries.entry(kind).or_default();

        if entries.iter().any(|r| r.id == id) {
            return Err(RegistryError::DuplicateRegistration { kind, id });
        }

        entries.push(Registration { id, listener });
        Ok(())
    }

    /// Register one listener for every kind in `kinds` under the same
    /// identity (e.g. an audit trail listening to the whole vocabulary).
    pub fn register_for_kinds(
        &mut self,
        kinds: impl IntoIterator<Item = EventKind>,
        id: impl Into<ListenerId>,
        listener: Arc<dyn Listener>,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        for kind in kinds {
            self.register(kind, id.clone(), listener.clone())?;
        }
        Ok(())
    }

    /// The ordered registrations for `kind`. Empty when none are registered
    /// (a kind with zero listeners is valid, not an error).
    pub fn listeners_for(&self, kind: EventKind) -> &[Registration] {
        self.entries.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove all of `id`'s registrations. Test teardown only; production
    /// dispatch paths never unregister.
    pub fn unregister(&mut self, id: &ListenerId) {
        for entries in self.entries.values_mut() {
            entries.retain(|r| &r.id != id);
        }
    }

    /// Total number of registrations across all kinds.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

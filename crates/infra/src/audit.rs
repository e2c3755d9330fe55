//! Audit trail listener.
//!
//! Keeps an in-process record of every dispatched event alongside a
//! structured log line. Registered for the whole vocabulary under a single
//! identity; never fails.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use supportflow_core::AccountId;
use supportflow_events::{Event, EventKind, Listener, ListenerError};

/// One audited dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub account: Option<AccountId>,
    pub recorded_at: DateTime<Utc>,
}

/// Appends an entry per observed event.
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry recorded so far, in dispatch order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Listener for AuditTrail {
    fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        let entry = AuditEntry {
            kind: event.kind(),
            occurred_at: event.occurred_at(),
            account: event.payload().account(),
            recorded_at: Utc::now(),
        };

        info!(
            kind = %entry.kind,
            account = ?entry.account,
            "domain event recorded"
        );

        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
        Ok(())
    }
}

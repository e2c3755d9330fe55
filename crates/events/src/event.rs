//! Domain events: a closed vocabulary plus an immutable value.
//!
//! Events are:
//! - **immutable** (treat them as facts; listeners never observe a value
//!   that differs from what was dispatched)
//! - drawn from a **closed vocabulary** (adding a kind requires a vocabulary
//!   update, never silent wildcard matching)
//! - stamped with **business time** by the producer, not by the dispatcher

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use supportflow_core::AccountId;

/// Error constructing an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The producer supplied a name outside the recognized vocabulary.
    #[error("unknown event kind: {name}")]
    UnknownEventKind { name: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Kind
// ─────────────────────────────────────────────────────────────────────────────

/// The closed vocabulary of business events.
///
/// Wire names are stable, dotted identifiers (e.g. `agent.added`); they are
/// what producers historically passed as string constants and what webhook
/// bodies carry as the event name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "agent.added")]
    AgentAdded,
    #[serde(rename = "agent.removed")]
    AgentRemoved,
    #[serde(rename = "conversation.created")]
    ConversationCreated,
    #[serde(rename = "conversation.resolved")]
    ConversationResolved,
    #[serde(rename = "conversation.reopened")]
    ConversationReopened,
    #[serde(rename = "assignee.changed")]
    AssigneeChanged,
    #[serde(rename = "message.created")]
    MessageCreated,
}

impl EventKind {
    /// Every recognized kind, in a stable order. Used by startup code that
    /// registers a listener for the whole vocabulary (e.g. the audit trail).
    pub const ALL: [EventKind; 7] = [
        EventKind::AgentAdded,
        EventKind::AgentRemoved,
        EventKind::ConversationCreated,
        EventKind::ConversationResolved,
        EventKind::ConversationReopened,
        EventKind::AssigneeChanged,
        EventKind::MessageCreated,
    ];

    /// Stable wire name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AgentAdded => "agent.added",
            EventKind::AgentRemoved => "agent.removed",
            EventKind::ConversationCreated => "conversation.created",
            EventKind::ConversationResolved => "conversation.resolved",
            EventKind::ConversationReopened => "conversation.reopened",
            EventKind::AssigneeChanged => "assignee.changed",
            EventKind::MessageCreated => "message.created",
        }
    }

    /// True for kinds whose payload carries a `user` object (agent lifecycle
    /// events). Webhook bodies for these project the user, not the raw
    /// payload.
    pub fn is_user_event(&self) -> bool {
        matches!(self, EventKind::AgentAdded | EventKind::AgentRemoved)
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EventError::UnknownEventKind {
                name: s.to_string(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload
// ─────────────────────────────────────────────────────────────────────────────

/// Named attributes attached to an event.
///
/// Keys are unique; insertion order is irrelevant (the underlying map is
/// sorted by key, so serializing a payload yields a canonical form;
/// listeners that derive dedup keys from it rely on that).
///
/// Payload completeness is the producer's responsibility, enforced by
/// convention: every account-scoped event carries an `account` entry, and
/// agent-class events carry a `user` object. The dispatcher delivers the
/// payload opaquely and validates nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(serde_json::Map<String, JsonValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a payload for an account-scoped event (seeds the `account` key).
    pub fn for_account(account: AccountId) -> Self {
        Self::new().with("account", account.to_string())
    }

    /// Add an attribute. Re-adding a key replaces the previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// The `account` entry, when present and well-formed.
    pub fn account(&self) -> Option<AccountId> {
        self.0.get("account")?.as_str()?.parse().ok()
    }

    /// The `user` object, when present.
    pub fn user(&self) -> Option<&JsonValue> {
        self.0.get("user")
    }

    /// A string field of the `user` object, when present.
    pub fn user_str(&self, field: &str) -> Option<&str> {
        self.user()?.get(field)?.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

/// An immutable record of a named business occurrence.
///
/// # Invariants
/// - Once constructed, an event never changes; fields are private and only
///   exposed by reference.
/// - `occurred_at` is set by the producer at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    occurred_at: DateTime<Utc>,
    payload: Payload,
}

impl Event {
    /// Construct an event from a vocabulary member (typed producer path).
    pub fn new(kind: EventKind, occurred_at: DateTime<Utc>, payload: Payload) -> Self {
        Self {
            kind,
            occurred_at,
            payload,
        }
    }

    /// Construct an event from a wire name (string-constant producer path).
    ///
    /// Fails with [`EventError::UnknownEventKind`] when the name is outside
    /// the vocabulary. No side effects either way.
    pub fn parse(
        name: &str,
        occurred_at: DateTime<Utc>,
        payload: Payload,
    ) -> Result<Self, EventError> {
        Ok(Self::new(name.parse()?, occurred_at, payload))
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_wire_name() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "agent.promoted".parse::<EventKind>().unwrap_err();
        assert_eq!(
            err,
            EventError::UnknownEventKind {
                name: "agent.promoted".to_string()
            }
        );
    }

    #[test]
    fn parse_builds_the_same_event_as_new() {
        let account = AccountId::new();
        let at = Utc::now();
        let payload = Payload::for_account(account);

        let parsed = Event::parse("agent.added", at, payload.clone()).unwrap();
        assert_eq!(parsed, Event::new(EventKind::AgentAdded, at, payload));
    }

    #[test]
    fn payload_keys_are_unique_and_order_independent() {
        let a = Payload::new().with("x", 1).with("y", 2);
        let b = Payload::new().with("y", 2).with("x", 1);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );

        let replaced = Payload::new().with("x", 1).with("x", 3);
        assert_eq!(replaced.get("x"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn account_accessor_parses_the_seeded_entry() {
        let account = AccountId::new();
        let payload = Payload::for_account(account);
        assert_eq!(payload.account(), Some(account));

        assert_eq!(Payload::new().account(), None);
    }
}

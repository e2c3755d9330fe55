//! The agent record and its outbound projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use supportflow_core::{AccountId, DomainError, DomainResult, UserId};
use supportflow_events::Payload;

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Role of an agent within an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Handles conversations.
    #[default]
    Agent,
    /// Handles conversations and manages the account.
    Administrator,
}

impl core::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AgentRole::Agent => write!(f, "agent"),
            AgentRole::Administrator => write!(f, "administrator"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// A support agent.
///
/// # Invariants
/// - An agent belongs to exactly one account (`account_id` is immutable
///   after creation).
/// - `pubsub_token` is the opaque per-subscriber key the realtime transport
///   addresses this agent by. It is issued here at creation time; how the
///   transport authenticates it is outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: UserId,
    pub account_id: AccountId,
    pub name: String,
    pub email: String,
    pub role: AgentRole,
    pub pubsub_token: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Create an agent with a fresh id and pubsub token.
    pub fn new(
        account_id: AccountId,
        name: impl Into<String>,
        email: impl Into<String>,
        role: AgentRole,
    ) -> DomainResult<Self> {
        let name = name.into();
        let email = email.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("agent name must be present"));
        }
        if email.trim().is_empty() || !email.contains('@') {
            return Err(DomainError::validation(format!(
                "agent email is malformed: {email:?}"
            )));
        }

        Ok(Self {
            id: UserId::new(),
            account_id,
            name,
            email,
            role,
            pubsub_token: Uuid::now_v7().simple().to_string(),
            avatar_url: None,
            created_at: Utc::now(),
        })
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Reduced view delivered to webhook endpoints.
    pub fn webhook_data(&self) -> JsonValue {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
        })
    }

    /// View pushed over the realtime channel.
    pub fn push_event_data(&self) -> JsonValue {
        json!({
            "name": self.name,
            "avatar_url": self.avatar_url,
        })
    }

    /// The payload this agent's lifecycle events carry: the owning account
    /// plus a `user` object with the fields every listener variant needs.
    pub fn event_payload(&self) -> Payload {
        Payload::for_account(self.account_id).with(
            "user",
            json!({
                "id": self.id,
                "name": self.name,
                "email": self.email,
                "pubsub_token": self.pubsub_token,
                "avatar_url": self.avatar_url,
            }),
        )
    }
}

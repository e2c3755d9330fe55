//! Notification-setting materialization.
//!
//! When an agent joins an account, future notifications for that agent are
//! only deliverable if a notification-setting record exists. The
//! [`NotificationMaterializer`] listens to agent lifecycle events and keeps
//! those records in whatever [`NotificationSettingsStore`] it was given.
//!
//! Idempotence: materialization is create-if-absent. Re-dispatching the same
//! lifecycle event never duplicates a row and never clobbers flags the agent
//! customized in the meantime.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use supportflow_core::{AccountId, UserId};
use supportflow_events::{Event, EventKind, Listener, ListenerError};

pub mod postgres;

pub use postgres::PostgresNotificationStore;

// ─────────────────────────────────────────────────────────────────────────────
// Read Model
// ─────────────────────────────────────────────────────────────────────────────

/// Notification classes an agent can receive by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailFlag {
    ConversationCreation,
    ConversationAssignment,
}

/// Per-agent, per-account notification preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSetting {
    pub account_id: AccountId,
    pub user_id: UserId,
    pub email_flags: BTreeSet<EmailFlag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSetting {
    /// A fresh setting with the platform default: notify on conversation
    /// assignment.
    pub fn with_defaults(account_id: AccountId, user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            user_id,
            email_flags: BTreeSet::from([EmailFlag::ConversationAssignment]),
            created_at: now,
            updated_at: now,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Store failure, reported to the dispatch outcome by the materializer.
#[derive(Debug, Error)]
#[error("notification store failed: {0}")]
pub struct StoreError(pub String);

/// Account-isolated persistence seam for notification settings.
pub trait NotificationSettingsStore: Send + Sync {
    fn get(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Option<NotificationSetting>, StoreError>;

    fn upsert(&self, setting: NotificationSetting) -> Result<(), StoreError>;

    fn remove(&self, account_id: AccountId, user_id: UserId) -> Result<(), StoreError>;

    fn list_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<NotificationSetting>, StoreError>;
}

impl<S> NotificationSettingsStore for Arc<S>
where
    S: NotificationSettingsStore + ?Sized,
{
    fn get(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Option<NotificationSetting>, StoreError> {
        (**self).get(account_id, user_id)
    }

    fn upsert(&self, setting: NotificationSetting) -> Result<(), StoreError> {
        (**self).upsert(setting)
    }

    fn remove(&self, account_id: AccountId, user_id: UserId) -> Result<(), StoreError> {
        (**self).remove(account_id, user_id)
    }

    fn list_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<NotificationSetting>, StoreError> {
        (**self).list_for_account(account_id)
    }
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    inner: RwLock<HashMap<(AccountId, UserId), NotificationSetting>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationSettingsStore for InMemoryNotificationStore {
    fn get(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Option<NotificationSetting>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError("lock poisoned".to_string()))?;
        Ok(map.get(&(account_id, user_id)).cloned())
    }

    fn upsert(&self, setting: NotificationSetting) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StoreError("lock poisoned".to_string()))?;
        map.insert((setting.account_id, setting.user_id), setting);
        Ok(())
    }

    fn remove(&self, account_id: AccountId, user_id: UserId) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StoreError("lock poisoned".to_string()))?;
        map.remove(&(account_id, user_id));
        Ok(())
    }

    fn list_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<NotificationSetting>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError("lock poisoned".to_string()))?;
        Ok(map
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listener
// ─────────────────────────────────────────────────────────────────────────────

/// Materializes notification settings from agent lifecycle events.
///
/// - `agent.added` → create the agent's setting with default flags, unless a
///   row already exists.
/// - `agent.removed` → remove the agent's setting.
/// - anything else → ignored.
pub struct NotificationMaterializer<S> {
    store: S,
}

impl<S> NotificationMaterializer<S>
where
    S: NotificationSettingsStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn subject(&self, event: &Event) -> Result<(AccountId, UserId), ListenerError> {
        let account = event
            .payload()
            .account()
            .ok_or(ListenerError::MissingAttribute("account"))?;
        let user = event
            .payload()
            .user_str("id")
            .and_then(|s| s.parse().ok())
            .ok_or(ListenerError::MissingAttribute("user.id"))?;
        Ok((account, user))
    }
}

impl<S> Listener for NotificationMaterializer<S>
where
    S: NotificationSettingsStore,
{
    fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        match event.kind() {
            EventKind::AgentAdded => {
                let (account, user) = self.subject(event)?;

                let existing = self
                    .store
                    .get(account, user)
                    .map_err(|e| ListenerError::Store(e.to_string()))?;
                if existing.is_some() {
                    // Create-if-absent: a retried dispatch must not reset flags.
                    return Ok(());
                }

                self.store
                    .upsert(NotificationSetting::with_defaults(account, user))
                    .map_err(|e| ListenerError::Store(e.to_string()))
            }
            EventKind::AgentRemoved => {
                let (account, user) = self.subject(event)?;
                self.store
                    .remove(account, user)
                    .map_err(|e| ListenerError::Store(e.to_string()))
            }
            _ => Ok(()),
        }
    }
}

//! Postgres-backed notification-settings store.
//!
//! Account isolation: every query includes `account_id` in the WHERE clause
//! or as part of the primary key, so cross-account access is architecturally
//! impossible.
//!
//! The store trait is synchronous (listeners run on the dispatching thread);
//! this implementation bridges onto the ambient Tokio runtime with
//! `Handle::block_on`. Expected table:
//!
//! ```sql
//! CREATE TABLE notification_settings (
//!     account_id  UUID        NOT NULL,
//!     user_id     UUID        NOT NULL,
//!     email_flags JSONB       NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (account_id, user_id)
//! );
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use supportflow_core::{AccountId, UserId};

use super::{EmailFlag, NotificationSetting, NotificationSettingsStore, StoreError};

/// Postgres-backed store for notification settings.
pub struct PostgresNotificationStore {
    pool: Arc<PgPool>,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    fn runtime() -> Result<tokio::runtime::Handle, StoreError> {
        tokio::runtime::Handle::try_current()
            .map_err(|_| StoreError("no tokio runtime available".to_string()))
    }

    fn row_to_setting(row: &sqlx::postgres::PgRow) -> Result<NotificationSetting, StoreError> {
        let account_id: uuid::Uuid = row
            .try_get("account_id")
            .map_err(|e| StoreError(e.to_string()))?;
        let user_id: uuid::Uuid = row
            .try_get("user_id")
            .map_err(|e| StoreError(e.to_string()))?;
        let flags: serde_json::Value = row
            .try_get("email_flags")
            .map_err(|e| StoreError(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| StoreError(e.to_string()))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| StoreError(e.to_string()))?;

        let email_flags: BTreeSet<EmailFlag> =
            serde_json::from_value(flags).map_err(|e| StoreError(e.to_string()))?;

        Ok(NotificationSetting {
            account_id: AccountId::from_uuid(account_id),
            user_id: UserId::from_uuid(user_id),
            email_flags,
            created_at,
            updated_at,
        })
    }
}

impl NotificationSettingsStore for PostgresNotificationStore {
    fn get(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Option<NotificationSetting>, StoreError> {
        let handle = Self::runtime()?;
        let pool = self.pool.clone();

        handle.block_on(async move {
            let row = sqlx::query(
                r#"
                SELECT account_id, user_id, email_flags, created_at, updated_at
                FROM notification_settings
                WHERE account_id = $1 AND user_id = $2
                "#,
            )
            .bind(account_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&*pool)
            .await
            .map_err(|e| StoreError(e.to_string()))?;

            row.as_ref().map(Self::row_to_setting).transpose()
        })
    }

    fn upsert(&self, setting: NotificationSetting) -> Result<(), StoreError> {
        let handle = Self::runtime()?;
        let pool = self.pool.clone();

        let flags =
            serde_json::to_value(&setting.email_flags).map_err(|e| StoreError(e.to_string()))?;

        handle.block_on(async move {
            sqlx::query(
                r#"
                INSERT INTO notification_settings (
                    account_id, user_id, email_flags, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (account_id, user_id)
                DO UPDATE SET
                    email_flags = EXCLUDED.email_flags,
                    updated_at = NOW()
                "#,
            )
            .bind(setting.account_id.as_uuid())
            .bind(setting.user_id.as_uuid())
            .bind(flags)
            .bind(setting.created_at)
            .bind(setting.updated_at)
            .execute(&*pool)
            .await
            .map_err(|e| StoreError(e.to_string()))?;

            Ok(())
        })
    }

    fn remove(&self, account_id: AccountId, user_id: UserId) -> Result<(), StoreError> {
        let handle = Self::runtime()?;
        let pool = self.pool.clone();

        handle.block_on(async move {
            sqlx::query(
                "DELETE FROM notification_settings WHERE account_id = $1 AND user_id = $2",
            )
            .bind(account_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&*pool)
            .await
            .map_err(|e| StoreError(e.to_string()))?;

            Ok(())
        })
    }

    fn list_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<NotificationSetting>, StoreError> {
        let handle = Self::runtime()?;
        let pool = self.pool.clone();

        handle.block_on(async move {
            let rows = sqlx::query(
                r#"
                SELECT account_id, user_id, email_flags, created_at, updated_at
                FROM notification_settings
                WHERE account_id = $1
                ORDER BY created_at
                "#,
            )
            .bind(account_id.as_uuid())
            .fetch_all(&*pool)
            .await
            .map_err(|e| StoreError(e.to_string()))?;

            rows.iter().map(Self::row_to_setting).collect()
        })
    }
}

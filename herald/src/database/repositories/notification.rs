//! Notification bookkeeping repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::NotificationMessage;

/// Notification repository trait: sent-message records plus the audit log.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Remember a sent message for later auto-delete cleanup.
    async fn record_message(
        &self,
        guild_id: i64,
        streamer_name: &str,
        channel_id: i64,
        message_id: i64,
    ) -> Result<()>;
    async fn messages_for(
        &self,
        guild_id: i64,
        streamer_name: &str,
    ) -> Result<Vec<NotificationMessage>>;
    /// Drop all records for (guild, streamer). Runs regardless of whether the
    /// underlying messages could be deleted.
    async fn clear_messages(&self, guild_id: i64, streamer_name: &str) -> Result<u64>;
    /// Append an audit row for a successful dispatch.
    async fn log_notification(
        &self,
        guild_id: i64,
        streamer_name: &str,
        channel_id: i64,
    ) -> Result<()>;
    /// Trim audit rows older than `retention_days`.
    async fn trim_log(&self, retention_days: i64) -> Result<u64>;
    async fn delete_guild(&self, guild_id: i64) -> Result<()>;
}

/// SQLx implementation of NotificationRepository.
pub struct SqlxNotificationRepository {
    pool: SqlitePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn record_message(
        &self,
        guild_id: i64,
        streamer_name: &str,
        channel_id: i64,
        message_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO notification_messages
                (guild_id, streamer_name, channel_id, message_id, sent_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(guild_id)
        .bind(streamer_name.to_lowercase())
        .bind(channel_id)
        .bind(message_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages_for(
        &self,
        guild_id: i64,
        streamer_name: &str,
    ) -> Result<Vec<NotificationMessage>> {
        let messages = sqlx::query_as::<_, NotificationMessage>(
            "SELECT * FROM notification_messages WHERE guild_id = ? AND streamer_name = ?",
        )
        .bind(guild_id)
        .bind(streamer_name.to_lowercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn clear_messages(&self, guild_id: i64, streamer_name: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM notification_messages WHERE guild_id = ? AND streamer_name = ?")
                .bind(guild_id)
                .bind(streamer_name.to_lowercase())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn log_notification(
        &self,
        guild_id: i64,
        streamer_name: &str,
        channel_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_log (guild_id, streamer_name, channel_id, sent_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(guild_id)
        .bind(streamer_name.to_lowercase())
        .bind(channel_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn trim_log(&self, retention_days: i64) -> Result<u64> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);

        let result = sqlx::query("DELETE FROM notification_log WHERE sent_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_guild(&self, guild_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM notification_messages WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM notification_log WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

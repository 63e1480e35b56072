//! Channel-maintenance configuration repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{CleanupConfig, MIN_CLEANUP_AGE_HOURS};
use crate::{Error, Result};

/// Cleanup configuration repository trait.
#[async_trait]
pub trait CleanupConfigRepository: Send + Sync {
    /// Create or update the retention rule for a channel. Rejects retention
    /// below [`MIN_CLEANUP_AGE_HOURS`].
    async fn upsert(
        &self,
        guild_id: i64,
        channel_id: i64,
        max_age_hours: i64,
        keep_pinned: bool,
    ) -> Result<()>;
    async fn get(&self, guild_id: i64, channel_id: i64) -> Result<Option<CleanupConfig>>;
    async fn list_all(&self) -> Result<Vec<CleanupConfig>>;
    async fn list_for_guild(&self, guild_id: i64) -> Result<Vec<CleanupConfig>>;
    async fn remove(&self, guild_id: i64, channel_id: i64) -> Result<bool>;
    async fn delete_guild(&self, guild_id: i64) -> Result<()>;
}

/// SQLx implementation of CleanupConfigRepository.
pub struct SqlxCleanupConfigRepository {
    pool: SqlitePool,
}

impl SqlxCleanupConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CleanupConfigRepository for SqlxCleanupConfigRepository {
    async fn upsert(
        &self,
        guild_id: i64,
        channel_id: i64,
        max_age_hours: i64,
        keep_pinned: bool,
    ) -> Result<()> {
        if max_age_hours < MIN_CLEANUP_AGE_HOURS {
            return Err(Error::validation(format!(
                "max_age_hours must be at least {MIN_CLEANUP_AGE_HOURS}, got {max_age_hours}"
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO cleanup_configs (guild_id, channel_id, max_age_hours, keep_pinned, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (guild_id, channel_id) DO UPDATE SET
                max_age_hours = excluded.max_age_hours,
                keep_pinned = excluded.keep_pinned,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(guild_id)
        .bind(channel_id)
        .bind(max_age_hours)
        .bind(keep_pinned)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, guild_id: i64, channel_id: i64) -> Result<Option<CleanupConfig>> {
        let config = sqlx::query_as::<_, CleanupConfig>(
            "SELECT * FROM cleanup_configs WHERE guild_id = ? AND channel_id = ?",
        )
        .bind(guild_id)
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(config)
    }

    async fn list_all(&self) -> Result<Vec<CleanupConfig>> {
        let configs = sqlx::query_as::<_, CleanupConfig>(
            "SELECT * FROM cleanup_configs ORDER BY guild_id, channel_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(configs)
    }

    async fn list_for_guild(&self, guild_id: i64) -> Result<Vec<CleanupConfig>> {
        let configs = sqlx::query_as::<_, CleanupConfig>(
            "SELECT * FROM cleanup_configs WHERE guild_id = ? ORDER BY channel_id",
        )
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(configs)
    }

    async fn remove(&self, guild_id: i64, channel_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM cleanup_configs WHERE guild_id = ? AND channel_id = ?")
                .bind(guild_id)
                .bind(channel_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_guild(&self, guild_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM cleanup_configs WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

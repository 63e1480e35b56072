//! Subscription repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::Subscription;
use crate::{Error, Result};

/// Subscription repository trait.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a subscription. Duplicate (guild, streamer) is a conflict.
    async fn add(
        &self,
        guild_id: i64,
        streamer_name: &str,
        channel_id: i64,
        custom_channel_id: Option<i64>,
    ) -> Result<Subscription>;
    /// Remove one subscription; `false` when it did not exist.
    async fn remove(&self, guild_id: i64, streamer_name: &str) -> Result<bool>;
    async fn get(&self, guild_id: i64, streamer_name: &str) -> Result<Option<Subscription>>;
    async fn list_for_guild(&self, guild_id: i64) -> Result<Vec<Subscription>>;
    /// Every subscription to one streamer, across guilds.
    async fn subscribers_of(&self, streamer_name: &str) -> Result<Vec<Subscription>>;
    /// Distinct lowercase streamer names across all guilds.
    async fn all_streamer_names(&self) -> Result<Vec<String>>;
    async fn delete_guild(&self, guild_id: i64) -> Result<u64>;
}

/// SQLx implementation of SubscriptionRepository.
pub struct SqlxSubscriptionRepository {
    pool: SqlitePool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn add(
        &self,
        guild_id: i64,
        streamer_name: &str,
        channel_id: i64,
        custom_channel_id: Option<i64>,
    ) -> Result<Subscription> {
        let streamer_name = streamer_name.to_lowercase();
        let result = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (guild_id, streamer_name, channel_id, custom_channel_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(guild_id)
        .bind(&streamer_name)
        .bind(channel_id)
        .bind(custom_channel_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(subscription) => Ok(subscription),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                Error::conflict(format!("guild {guild_id} already subscribes to {streamer_name}")),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, guild_id: i64, streamer_name: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE guild_id = ? AND streamer_name = ?")
                .bind(guild_id)
                .bind(streamer_name.to_lowercase())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, guild_id: i64, streamer_name: &str) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE guild_id = ? AND streamer_name = ?",
        )
        .bind(guild_id)
        .bind(streamer_name.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    async fn list_for_guild(&self, guild_id: i64) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE guild_id = ? ORDER BY streamer_name",
        )
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    async fn subscribers_of(&self, streamer_name: &str) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE streamer_name = ? ORDER BY guild_id",
        )
        .bind(streamer_name.to_lowercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    async fn all_streamer_names(&self) -> Result<Vec<String>> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT streamer_name FROM subscriptions ORDER BY streamer_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names.into_iter().map(|(n,)| n).collect())
    }

    async fn delete_guild(&self, guild_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

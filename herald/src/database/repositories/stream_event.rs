//! Stream-event tally repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::LeaderboardRow;

/// Stream-event repository trait. Inserts are idempotent per calendar day.
#[async_trait]
pub trait StreamEventRepository: Send + Sync {
    async fn record_event(&self, guild_id: i64, streamer_name: &str, event_date: &str)
    -> Result<()>;
    async fn record_global_event(&self, streamer_name: &str, event_date: &str) -> Result<()>;
    /// Top streamers for one guild in a `YYYY-MM` month.
    async fn guild_leaderboard(
        &self,
        guild_id: i64,
        month: &str,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>>;
    /// Top streamers across all guilds in a `YYYY-MM` month.
    async fn global_leaderboard(&self, month: &str, limit: i64) -> Result<Vec<LeaderboardRow>>;
    async fn delete_guild(&self, guild_id: i64) -> Result<()>;
}

/// SQLx implementation of StreamEventRepository.
pub struct SqlxStreamEventRepository {
    pool: SqlitePool,
}

impl SqlxStreamEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamEventRepository for SqlxStreamEventRepository {
    async fn record_event(
        &self,
        guild_id: i64,
        streamer_name: &str,
        event_date: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO stream_events (guild_id, streamer_name, event_date, recorded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(guild_id)
        .bind(streamer_name.to_lowercase())
        .bind(event_date)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_global_event(&self, streamer_name: &str, event_date: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO global_stream_events (streamer_name, event_date, recorded_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(streamer_name.to_lowercase())
        .bind(event_date)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn guild_leaderboard(
        &self,
        guild_id: i64,
        month: &str,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT streamer_name, COUNT(*) AS events
            FROM stream_events
            WHERE guild_id = ? AND substr(event_date, 1, 7) = ?
            GROUP BY streamer_name
            ORDER BY events DESC, streamer_name
            LIMIT ?
            "#,
        )
        .bind(guild_id)
        .bind(month)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn global_leaderboard(&self, month: &str, limit: i64) -> Result<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT streamer_name, COUNT(*) AS events
            FROM global_stream_events
            WHERE substr(event_date, 1, 7) = ?
            GROUP BY streamer_name
            ORDER BY events DESC, streamer_name
            LIMIT ?
            "#,
        )
        .bind(month)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_guild(&self, guild_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM stream_events WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

//! Birthday repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::Birthday;

/// Birthday repository trait. Date triples are validated by the caller.
#[async_trait]
pub trait BirthdayRepository: Send + Sync {
    async fn set(
        &self,
        guild_id: i64,
        user_id: i64,
        day: i64,
        month: i64,
        year: i64,
    ) -> Result<()>;
    async fn remove(&self, guild_id: i64, user_id: i64) -> Result<bool>;
    async fn get(&self, guild_id: i64, user_id: i64) -> Result<Option<Birthday>>;
    /// All birthdays in a guild, sorted by (month, day).
    async fn list_for_guild(&self, guild_id: i64) -> Result<Vec<Birthday>>;
    /// Birthdays falling on (month, day) across all guilds.
    async fn for_date(&self, month: i64, day: i64) -> Result<Vec<Birthday>>;
    async fn delete_guild(&self, guild_id: i64) -> Result<()>;
}

/// SQLx implementation of BirthdayRepository.
pub struct SqlxBirthdayRepository {
    pool: SqlitePool,
}

impl SqlxBirthdayRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BirthdayRepository for SqlxBirthdayRepository {
    async fn set(
        &self,
        guild_id: i64,
        user_id: i64,
        day: i64,
        month: i64,
        year: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO birthdays (guild_id, user_id, day, month, year, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (guild_id, user_id) DO UPDATE SET
                day = excluded.day,
                month = excluded.month,
                year = excluded.year,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(guild_id)
        .bind(user_id)
        .bind(day)
        .bind(month)
        .bind(year)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, guild_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM birthdays WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, guild_id: i64, user_id: i64) -> Result<Option<Birthday>> {
        let birthday = sqlx::query_as::<_, Birthday>(
            "SELECT * FROM birthdays WHERE guild_id = ? AND user_id = ?",
        )
        .bind(guild_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(birthday)
    }

    async fn list_for_guild(&self, guild_id: i64) -> Result<Vec<Birthday>> {
        let birthdays = sqlx::query_as::<_, Birthday>(
            "SELECT * FROM birthdays WHERE guild_id = ? ORDER BY month, day",
        )
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(birthdays)
    }

    async fn for_date(&self, month: i64, day: i64) -> Result<Vec<Birthday>> {
        let birthdays =
            sqlx::query_as::<_, Birthday>("SELECT * FROM birthdays WHERE month = ? AND day = ?")
                .bind(month)
                .bind(day)
                .fetch_all(&self.pool)
                .await?;
        Ok(birthdays)
    }

    async fn delete_guild(&self, guild_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM birthdays WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

//! Guild settings repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::GuildSettings;
use crate::database::{WritePool, begin_immediate};
use crate::Result;

/// Guild settings repository trait.
#[async_trait]
pub trait GuildSettingsRepository: Send + Sync {
    async fn get(&self, guild_id: i64) -> Result<Option<GuildSettings>>;
    /// Stored settings, or the defaults when the guild has no row yet.
    async fn get_or_default(&self, guild_id: i64) -> Result<GuildSettings>;
    /// Set the default notification channel and repoint every subscription
    /// without a custom channel, atomically. Returns the repointed count.
    async fn set_default_channel(&self, guild_id: i64, channel_id: i64) -> Result<u64>;
    async fn set_accent_color(&self, guild_id: i64, color: u32) -> Result<()>;
    async fn set_auto_delete(&self, guild_id: i64, enabled: bool) -> Result<()>;
    async fn set_birthday_channel(&self, guild_id: i64, channel_id: Option<i64>) -> Result<()>;
    /// Guilds that have opted into birthday announcements.
    async fn guilds_with_birthday_channel(&self) -> Result<Vec<GuildSettings>>;
    async fn delete_guild(&self, guild_id: i64) -> Result<()>;
}

/// SQLx implementation of GuildSettingsRepository.
///
/// Holds the serialized write pool for the default-channel repoint, which
/// must update two tables in one immediate transaction.
pub struct SqlxGuildSettingsRepository {
    pool: SqlitePool,
    write_pool: WritePool,
}

impl SqlxGuildSettingsRepository {
    pub fn new(pool: SqlitePool, write_pool: WritePool) -> Self {
        Self { pool, write_pool }
    }

    async fn upsert_field(&self, guild_id: i64, set_clause: &str, bind: FieldValue) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO guild_settings (guild_id, {column}, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (guild_id) DO UPDATE SET
                {column} = excluded.{column},
                updated_at = excluded.updated_at
            "#,
            column = set_clause
        );
        let query = sqlx::query(&sql).bind(guild_id);
        let query = match bind {
            FieldValue::Int(v) => query.bind(v),
            FieldValue::OptInt(v) => query.bind(v),
            FieldValue::Bool(v) => query.bind(v),
        };
        query
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

enum FieldValue {
    Int(i64),
    OptInt(Option<i64>),
    Bool(bool),
}

#[async_trait]
impl GuildSettingsRepository for SqlxGuildSettingsRepository {
    async fn get(&self, guild_id: i64) -> Result<Option<GuildSettings>> {
        let settings =
            sqlx::query_as::<_, GuildSettings>("SELECT * FROM guild_settings WHERE guild_id = ?")
                .bind(guild_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(settings)
    }

    async fn get_or_default(&self, guild_id: i64) -> Result<GuildSettings> {
        Ok(self
            .get(guild_id)
            .await?
            .unwrap_or_else(|| GuildSettings::defaults(guild_id)))
    }

    async fn set_default_channel(&self, guild_id: i64, channel_id: i64) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = begin_immediate(&self.write_pool).await?;

        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, notification_channel_id, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (guild_id) DO UPDATE SET
                notification_channel_id = excluded.notification_channel_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(guild_id)
        .bind(channel_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let repointed = sqlx::query(
            "UPDATE subscriptions SET channel_id = ? WHERE guild_id = ? AND custom_channel_id IS NULL",
        )
        .bind(channel_id)
        .bind(guild_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(repointed)
    }

    async fn set_accent_color(&self, guild_id: i64, color: u32) -> Result<()> {
        self.upsert_field(guild_id, "accent_color", FieldValue::Int(color as i64))
            .await
    }

    async fn set_auto_delete(&self, guild_id: i64, enabled: bool) -> Result<()> {
        self.upsert_field(
            guild_id,
            "auto_delete_notifications",
            FieldValue::Bool(enabled),
        )
        .await
    }

    async fn set_birthday_channel(&self, guild_id: i64, channel_id: Option<i64>) -> Result<()> {
        self.upsert_field(
            guild_id,
            "birthday_channel_id",
            FieldValue::OptInt(channel_id),
        )
        .await
    }

    async fn guilds_with_birthday_channel(&self) -> Result<Vec<GuildSettings>> {
        let settings = sqlx::query_as::<_, GuildSettings>(
            "SELECT * FROM guild_settings WHERE birthday_channel_id IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn delete_guild(&self, guild_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM guild_settings WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

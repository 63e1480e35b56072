//! Chat command and channel-mapping repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{ChatChannel, ChatCommand, MAX_COMMANDS_PER_CHANNEL, PermissionLevel};
use crate::{Error, Result};

/// Chat repository trait.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Create or update a command. Creating past the per-channel cap fails.
    async fn upsert_command(
        &self,
        channel: &str,
        name: &str,
        response: &str,
        permission: PermissionLevel,
        cooldown_seconds: i64,
    ) -> Result<ChatCommand>;
    async fn get_command(&self, channel: &str, name: &str) -> Result<Option<ChatCommand>>;
    async fn list_commands(&self, channel: &str) -> Result<Vec<ChatCommand>>;
    async fn delete_command(&self, channel: &str, name: &str) -> Result<bool>;
    async fn increment_use_count(&self, channel: &str, name: &str) -> Result<()>;

    /// Map a guild to the streaming-platform channel its relay joins.
    async fn set_chat_channel(&self, guild_id: i64, channel: &str) -> Result<()>;
    /// Unmap a guild; returns the channel it was mapped to.
    async fn remove_chat_channel(&self, guild_id: i64) -> Result<Option<String>>;
    async fn list_chat_channels(&self) -> Result<Vec<ChatChannel>>;
    /// How many guilds map to `channel`; the relay only parts at zero.
    async fn guilds_for_channel(&self, channel: &str) -> Result<i64>;
    async fn delete_guild(&self, guild_id: i64) -> Result<()>;
}

/// SQLx implementation of ChatRepository.
pub struct SqlxChatRepository {
    pool: SqlitePool,
}

impl SqlxChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for SqlxChatRepository {
    async fn upsert_command(
        &self,
        channel: &str,
        name: &str,
        response: &str,
        permission: PermissionLevel,
        cooldown_seconds: i64,
    ) -> Result<ChatCommand> {
        let channel = channel.to_lowercase();
        let name = name.to_lowercase();

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM chat_commands WHERE channel = ? AND name = ?")
                .bind(&channel)
                .bind(&name)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_none() {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM chat_commands WHERE channel = ?")
                    .bind(&channel)
                    .fetch_one(&self.pool)
                    .await?;
            if count >= MAX_COMMANDS_PER_CHANNEL {
                return Err(Error::validation(format!(
                    "channel {channel} already has {MAX_COMMANDS_PER_CHANNEL} commands"
                )));
            }
        }

        let command = sqlx::query_as::<_, ChatCommand>(
            r#"
            INSERT INTO chat_commands (channel, name, response, permission, cooldown_seconds, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (channel, name) DO UPDATE SET
                response = excluded.response,
                permission = excluded.permission,
                cooldown_seconds = excluded.cooldown_seconds
            RETURNING *
            "#,
        )
        .bind(&channel)
        .bind(&name)
        .bind(response)
        .bind(permission.as_str())
        .bind(cooldown_seconds)
        .bind(chrono::Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(command)
    }

    async fn get_command(&self, channel: &str, name: &str) -> Result<Option<ChatCommand>> {
        let command = sqlx::query_as::<_, ChatCommand>(
            "SELECT * FROM chat_commands WHERE channel = ? AND name = ?",
        )
        .bind(channel.to_lowercase())
        .bind(name.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(command)
    }

    async fn list_commands(&self, channel: &str) -> Result<Vec<ChatCommand>> {
        let commands = sqlx::query_as::<_, ChatCommand>(
            "SELECT * FROM chat_commands WHERE channel = ? ORDER BY name",
        )
        .bind(channel.to_lowercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(commands)
    }

    async fn delete_command(&self, channel: &str, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chat_commands WHERE channel = ? AND name = ?")
            .bind(channel.to_lowercase())
            .bind(name.to_lowercase())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_use_count(&self, channel: &str, name: &str) -> Result<()> {
        sqlx::query(
            "UPDATE chat_commands SET use_count = use_count + 1 WHERE channel = ? AND name = ?",
        )
        .bind(channel.to_lowercase())
        .bind(name.to_lowercase())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_chat_channel(&self, guild_id: i64, channel: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_channels (guild_id, channel, joined_at)
            VALUES (?, ?, ?)
            ON CONFLICT (guild_id) DO UPDATE SET
                channel = excluded.channel,
                joined_at = excluded.joined_at
            "#,
        )
        .bind(guild_id)
        .bind(channel.to_lowercase())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_chat_channel(&self, guild_id: i64) -> Result<Option<String>> {
        let removed: Option<(String,)> =
            sqlx::query_as("DELETE FROM chat_channels WHERE guild_id = ? RETURNING channel")
                .bind(guild_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(removed.map(|(channel,)| channel))
    }

    async fn list_chat_channels(&self) -> Result<Vec<ChatChannel>> {
        let channels =
            sqlx::query_as::<_, ChatChannel>("SELECT * FROM chat_channels ORDER BY guild_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(channels)
    }

    async fn guilds_for_channel(&self, channel: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_channels WHERE channel = ?")
                .bind(channel.to_lowercase())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn delete_guild(&self, guild_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM chat_channels WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

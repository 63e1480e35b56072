//! Guild-facing chat configuration.
//!
//! Validates and normalizes command and channel names before they reach
//! the database, and keeps a running relay in sync with mapping changes.

use std::sync::Arc;

use tmi_client::normalize_channel;
use tracing::info;

use crate::chat::commands::normalize_command_name;
use crate::chat::relay::RelayHandle;
use crate::database::models::{ChatChannel, ChatCommand, MAX_COOLDOWN_SECS, PermissionLevel};
use crate::database::repositories::ChatRepository;
use crate::{Error, Result};

/// Validated access to chat commands and channel mappings.
pub struct ChatService {
    chat: Arc<dyn ChatRepository>,
    relay: RelayHandle,
}

impl ChatService {
    pub fn new(chat: Arc<dyn ChatRepository>, relay: RelayHandle) -> Self {
        Self { chat, relay }
    }

    /// Create or update a custom command.
    pub async fn set_command(
        &self,
        channel: &str,
        name: &str,
        response: &str,
        permission: PermissionLevel,
        cooldown_seconds: i64,
    ) -> Result<ChatCommand> {
        let channel = normalize_channel(channel);
        let name = normalize_command_name(name);
        if channel.is_empty() {
            return Err(Error::validation("channel name is empty"));
        }
        if name.is_empty() {
            return Err(Error::validation("command name is empty"));
        }
        if response.trim().is_empty() {
            return Err(Error::validation("command response is empty"));
        }
        if !(0..=MAX_COOLDOWN_SECS).contains(&cooldown_seconds) {
            return Err(Error::validation(format!(
                "cooldown must be between 0 and {MAX_COOLDOWN_SECS} seconds"
            )));
        }
        self.chat
            .upsert_command(
                &channel,
                &name,
                response.trim(),
                permission,
                cooldown_seconds,
            )
            .await
    }

    pub async fn remove_command(&self, channel: &str, name: &str) -> Result<bool> {
        self.chat
            .delete_command(&normalize_channel(channel), &normalize_command_name(name))
            .await
    }

    pub async fn commands(&self, channel: &str) -> Result<Vec<ChatCommand>> {
        self.chat.list_commands(&normalize_channel(channel)).await
    }

    /// Map a guild to a chat channel and ask the relay to join it.
    pub async fn join_channel(&self, guild_id: i64, channel: &str) -> Result<String> {
        let channel = normalize_channel(channel);
        if channel.is_empty() {
            return Err(Error::validation("channel name is empty"));
        }
        // Re-pointing a guild can orphan its old channel.
        let previous = self.chat.remove_chat_channel(guild_id).await?;
        self.chat.set_chat_channel(guild_id, &channel).await?;
        if let Some(previous) = previous
            && previous != channel
            && self.chat.guilds_for_channel(&previous).await? == 0
        {
            self.relay.part(&previous);
        }
        self.relay.join(&channel);
        info!(guild_id, channel, "guild chat channel set");
        Ok(channel)
    }

    /// Unmap a guild. The relay only parts the channel when no other
    /// guild still maps to it.
    pub async fn leave_channel(&self, guild_id: i64) -> Result<Option<String>> {
        let Some(channel) = self.chat.remove_chat_channel(guild_id).await? else {
            return Ok(None);
        };
        if self.chat.guilds_for_channel(&channel).await? == 0 {
            self.relay.part(&channel);
        }
        info!(guild_id, channel, "guild chat channel removed");
        Ok(Some(channel))
    }

    pub async fn channels(&self) -> Result<Vec<ChatChannel>> {
        self.chat.list_chat_channels().await
    }

    /// Guild teardown: drop the mapping and part an orphaned channel.
    pub async fn guild_teardown(&self, guild_id: i64) -> Result<()> {
        self.leave_channel(guild_id).await?;
        self.chat.delete_guild(guild_id).await
    }
}

//! Messaging-platform client: trait, value types, and the REST implementation.
//!
//! The daemon talks to the platform exclusively through [`MessagingClient`];
//! production uses [`DiscordRestClient`], tests use hand-written mocks.

pub mod permissions;
pub mod rest;
#[cfg(test)]
pub mod testing;

pub use permissions::ChannelPermissions;
pub use rest::DiscordRestClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;

/// A message payload: plain text and/or one rich embed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            content: None,
            embed: Some(embed),
        }
    }
}

/// Rich embed, the subset of fields the daemon renders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// ISO 8601; rendered as the embed timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Reference to a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: i64,
    pub message_id: i64,
}

/// A message as listed from a channel, enough for retention decisions.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: i64,
    pub pinned: bool,
    pub timestamp: DateTime<Utc>,
}

/// Channel metadata from the platform.
#[derive(Debug, Clone)]
pub struct ChannelRecord {
    pub id: i64,
    pub name: Option<String>,
    pub guild_id: Option<i64>,
}

/// The bot's own identity, used as the startup readiness probe.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
}

/// Outcome of a single-message delete.
///
/// An already-gone message counts as success for cleanup purposes; a
/// forbidden one is a logged non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyGone,
    Forbidden,
}

/// Client for the messaging platform's REST surface.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Identity probe. Failing this at startup keeps the schedulers parked.
    async fn current_user(&self) -> Result<UserIdentity>;

    /// `None` when the channel does not exist (or the bot cannot see it).
    async fn get_channel(&self, channel_id: i64) -> Result<Option<ChannelRecord>>;

    async fn send_message(
        &self,
        channel_id: i64,
        message: &OutgoingMessage,
    ) -> Result<MessageRef>;

    async fn delete_message(&self, channel_id: i64, message_id: i64) -> Result<DeleteOutcome>;

    /// Batched delete; callers partition by [`bulk_delete_max_age`] and chunk
    /// to at most 100 ids.
    ///
    /// [`bulk_delete_max_age`]: MessagingClient::bulk_delete_max_age
    async fn bulk_delete(&self, channel_id: i64, message_ids: &[i64]) -> Result<()>;

    /// Messages strictly older than `before` (newest first), up to `limit`.
    async fn list_messages(
        &self,
        channel_id: i64,
        before: Option<i64>,
        limit: u8,
    ) -> Result<Vec<MessageRecord>>;

    /// The bot's effective permissions in a channel.
    async fn channel_permissions(&self, channel_id: i64) -> Result<ChannelPermissions>;

    /// Open (or reuse) a DM channel with a user, returning its channel id.
    async fn create_dm(&self, user_id: i64) -> Result<i64>;

    /// Platform capability: oldest message age the batched deletion path
    /// accepts. Older messages must be deleted one by one.
    fn bulk_delete_max_age(&self) -> chrono::Duration;
}

//! Subscription database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A (guild, streamer) monitoring relationship.
///
/// `streamer_name` is stored lowercase. `channel_id` records the delivery
/// channel in effect when the row was written; `custom_channel_id` is set
/// only when the subscriber explicitly picked a channel, and pins delivery
/// there regardless of later guild-default changes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub guild_id: i64,
    pub streamer_name: String,
    pub channel_id: i64,
    pub custom_channel_id: Option<i64>,
    /// ISO 8601 creation timestamp
    pub created_at: String,
}

impl Subscription {
    /// Delivery channel for this subscription given the guild's current
    /// default. A custom override wins; otherwise the current default; `None`
    /// means there is nowhere to deliver and the dispatcher skips the guild.
    pub fn resolve_channel(&self, guild_default: Option<i64>) -> Option<i64> {
        self.custom_channel_id.or(guild_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(custom: Option<i64>) -> Subscription {
        Subscription {
            id: 1,
            guild_id: 10,
            streamer_name: "alice".to_string(),
            channel_id: 100,
            custom_channel_id: custom,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn default_subscription_follows_current_default() {
        assert_eq!(sub(None).resolve_channel(Some(200)), Some(200));
        assert_eq!(sub(None).resolve_channel(None), None);
    }

    #[test]
    fn custom_channel_never_moves() {
        assert_eq!(sub(Some(300)).resolve_channel(Some(200)), Some(300));
        assert_eq!(sub(Some(300)).resolve_channel(None), Some(300));
    }
}

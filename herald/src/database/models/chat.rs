//! Chat-relay database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Hard cap on custom commands per channel.
pub const MAX_COMMANDS_PER_CHANNEL: i64 = 75;

/// Cooldown bounds in seconds.
pub const MAX_COOLDOWN_SECS: i64 = 3600;

/// A custom chat command for one streaming-platform channel.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatCommand {
    pub id: i64,
    /// Channel login the command belongs to (lowercase).
    pub channel: String,
    /// Command name without the leading `!` (lowercase).
    pub name: String,
    pub response: String,
    /// Stored as the lowercase permission name.
    pub permission: String,
    pub cooldown_seconds: i64,
    pub use_count: i64,
    /// ISO 8601 timestamp
    pub created_at: String,
}

impl ChatCommand {
    /// Parse the stored permission, defaulting to everyone on bad data.
    pub fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::parse(&self.permission).unwrap_or(PermissionLevel::Everyone)
    }
}

/// Chat permission ladder. Ordering is the ladder: each level may invoke
/// commands at its own level and below.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Everyone,
    Subscriber,
    Moderator,
    Broadcaster,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
            Self::Subscriber => "subscriber",
            Self::Moderator => "moderator",
            Self::Broadcaster => "broadcaster",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "everyone" => Some(Self::Everyone),
            "subscriber" => Some(Self::Subscriber),
            "moderator" => Some(Self::Moderator),
            "broadcaster" => Some(Self::Broadcaster),
            _ => None,
        }
    }
}

/// The streaming-platform channel the relay joins for a guild.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatChannel {
    pub guild_id: i64,
    /// Channel login (lowercase).
    pub channel: String,
    /// ISO 8601 timestamp
    pub joined_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_ladder_orders() {
        assert!(PermissionLevel::Everyone < PermissionLevel::Subscriber);
        assert!(PermissionLevel::Subscriber < PermissionLevel::Moderator);
        assert!(PermissionLevel::Moderator < PermissionLevel::Broadcaster);
    }

    #[test]
    fn permission_round_trip() {
        assert_eq!(PermissionLevel::Moderator.as_str(), "moderator");
        assert_eq!(
            PermissionLevel::parse("broadcaster"),
            Some(PermissionLevel::Broadcaster)
        );
        assert_eq!(PermissionLevel::parse("vip"), None);
    }

    #[test]
    fn bad_stored_permission_defaults_to_everyone() {
        let cmd = ChatCommand {
            id: 1,
            channel: "somechannel".to_string(),
            name: "hello".to_string(),
            response: "hi".to_string(),
            permission: "corrupted".to_string(),
            cooldown_seconds: 0,
            use_count: 0,
            created_at: String::new(),
        };
        assert_eq!(cmd.permission_level(), PermissionLevel::Everyone);
    }
}

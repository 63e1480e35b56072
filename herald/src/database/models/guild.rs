//! Guild settings database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Brand purple, the accent color guilds start with.
pub const DEFAULT_ACCENT_COLOR: u32 = 0x9146FF;

/// Per-guild configuration, lazily created on first write.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: i64,
    /// Default notification channel; subscriptions without a custom channel
    /// deliver here.
    pub notification_channel_id: Option<i64>,
    /// 24-bit RGB stored as an integer.
    pub accent_color: i64,
    pub auto_delete_notifications: bool,
    pub birthday_channel_id: Option<i64>,
    pub updated_at: Option<String>,
}

impl GuildSettings {
    pub fn defaults(guild_id: i64) -> Self {
        Self {
            guild_id,
            notification_channel_id: None,
            accent_color: DEFAULT_ACCENT_COLOR as i64,
            auto_delete_notifications: false,
            birthday_channel_id: None,
            updated_at: None,
        }
    }

    /// Accent color clamped to 24 bits.
    pub fn accent_rgb(&self) -> u32 {
        (self.accent_color as u32) & 0x00FF_FFFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_brand_color() {
        let settings = GuildSettings::defaults(1);
        assert_eq!(settings.accent_rgb(), DEFAULT_ACCENT_COLOR);
        assert!(!settings.auto_delete_notifications);
        assert!(settings.notification_channel_id.is_none());
    }

    #[test]
    fn accent_rgb_masks_to_24_bits() {
        let mut settings = GuildSettings::defaults(1);
        settings.accent_color = 0x1_FF00FF;
        assert_eq!(settings.accent_rgb(), 0xFF00FF);
    }
}

//! Request and response bodies for the admin API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::database::models::{
    GuildSettings, MenuStyle, PermissionLevel, RoleMenu, RoleMenuEntry,
};

/// `GET /api/health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Channels currently tracked as live.
    pub live_streams: usize,
    pub schedulers: Vec<SchedulerBeat>,
}

/// Last observed tick of one background loop.
#[derive(Debug, Serialize)]
pub struct SchedulerBeat {
    pub task: String,
    pub last_beat: DateTime<Utc>,
    pub seconds_ago: i64,
}

/// Guild settings as the API presents them.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub guild_id: i64,
    pub notification_channel_id: Option<i64>,
    /// `#RRGGBB`
    pub accent_color: String,
    pub auto_delete_notifications: bool,
    pub birthday_channel_id: Option<i64>,
}

impl From<GuildSettings> for SettingsResponse {
    fn from(settings: GuildSettings) -> Self {
        Self {
            guild_id: settings.guild_id,
            notification_channel_id: settings.notification_channel_id,
            accent_color: format!("#{:06X}", settings.accent_rgb()),
            auto_delete_notifications: settings.auto_delete_notifications,
            birthday_channel_id: settings.birthday_channel_id,
        }
    }
}

/// `PUT /api/guilds/{guild_id}/settings`. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub notification_channel_id: Option<i64>,
    /// `RRGGBB` with optional leading `#`, or the literal `default`.
    pub accent_color: Option<String>,
    pub auto_delete_notifications: Option<bool>,
    /// `null` clears the channel, absent leaves it alone.
    #[serde(default, deserialize_with = "double_option")]
    pub birthday_channel_id: Option<Option<i64>>,
}

#[derive(Debug, Serialize)]
pub struct UpdateSettingsResponse {
    /// Subscriptions re-pointed by a default-channel change.
    pub repointed_subscriptions: u64,
    #[serde(flatten)]
    pub settings: SettingsResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub name: String,
    /// Explicit notification channel; falls back to the guild default.
    pub channel_id: Option<i64>,
}

/// `POST .../subscriptions/import`
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    /// One streamer per line; blank lines and `#` comments are skipped.
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TestNotificationRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TestNotificationResponse {
    /// Channels the synthetic notification was delivered to.
    pub delivered: usize,
}

#[derive(Debug, Deserialize)]
pub struct SetBirthdayRequest {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatCommandRequest {
    pub name: String,
    pub response: String,
    #[serde(default)]
    pub permission: Option<PermissionLevel>,
    #[serde(default)]
    pub cooldown_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChatCommandRequest {
    pub response: String,
    #[serde(default)]
    pub permission: Option<PermissionLevel>,
    #[serde(default)]
    pub cooldown_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct JoinChannelRequest {
    pub channel: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelMappingResponse {
    pub guild_id: i64,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleMenuRequest {
    pub channel_id: i64,
    pub title: String,
    pub style: MenuStyle,
    #[serde(default)]
    pub only_add: bool,
    #[serde(default)]
    pub max_roles: Option<i64>,
    pub entries: Vec<RoleMenuEntry>,
}

/// Role menu with its entries decoded from storage.
#[derive(Debug, Serialize)]
pub struct RoleMenuResponse {
    pub id: i64,
    pub guild_id: i64,
    pub channel_id: i64,
    pub message_id: Option<i64>,
    pub title: String,
    pub style: MenuStyle,
    pub only_add: bool,
    pub max_roles: Option<i64>,
    pub entries: Vec<RoleMenuEntry>,
    pub created_at: String,
}

impl TryFrom<RoleMenu> for RoleMenuResponse {
    type Error = crate::Error;

    fn try_from(menu: RoleMenu) -> crate::Result<Self> {
        let entries = menu.parse_entries()?;
        let style = menu.menu_style();
        Ok(Self {
            id: menu.id,
            guild_id: menu.guild_id,
            channel_id: menu.channel_id,
            message_id: menu.message_id,
            title: menu.title,
            style,
            only_add: menu.only_add,
            max_roles: menu.max_roles,
            entries,
            created_at: menu.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertCleanupConfigRequest {
    pub max_age_hours: i64,
    #[serde(default = "default_keep_pinned")]
    pub keep_pinned: bool,
}

fn default_keep_pinned() -> bool {
    true
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

//! Guild configuration service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use helix_api::{HelixClient, MAX_LOOKUP_BATCH, StreamRecord, UserRecord};
use serde::Serialize;
use tracing::info;

use crate::database::models::{
    DEFAULT_ACCENT_COLOR, GuildSettings, LeaderboardRow, Subscription,
};
use crate::database::repositories::{
    BirthdayRepository, CleanupConfigRepository, GuildSettingsRepository, NotificationRepository,
    StreamEventRepository, SubscriptionRepository,
};
use crate::monitor::LiveStateTracker;
use crate::notification::NotificationDispatcher;
use crate::{Error, Result};

/// Rows returned by the leaderboard views.
const LEADERBOARD_LIMIT: i64 = 10;

/// Platform lookups the guild operations need.
#[async_trait]
pub trait StreamerLookup: Send + Sync {
    /// Resolve a login, `None` when the platform knows no such user.
    async fn find_user(&self, login: &str) -> Result<Option<UserRecord>>;
    /// Live records for the given names (≤ one lookup batch).
    async fn live_now(&self, names: &[String]) -> Result<Vec<StreamRecord>>;
}

#[async_trait]
impl StreamerLookup for HelixClient {
    async fn find_user(&self, login: &str) -> Result<Option<UserRecord>> {
        Ok(self.get_user(login).await?)
    }

    async fn live_now(&self, names: &[String]) -> Result<Vec<StreamRecord>> {
        Ok(self.get_live_streams(names).await?)
    }
}

/// Outcome of a bulk subscription import.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub already_present: Vec<String>,
    pub failed: Vec<String>,
}

/// Subscriptions, settings and derived guild views.
pub struct GuildConfigService {
    lookup: Arc<dyn StreamerLookup>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    settings: Arc<dyn GuildSettingsRepository>,
    events: Arc<dyn StreamEventRepository>,
    notifications: Arc<dyn NotificationRepository>,
    cleanup_configs: Arc<dyn CleanupConfigRepository>,
    birthdays: Arc<dyn BirthdayRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    tracker: Arc<LiveStateTracker>,
}

impl GuildConfigService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lookup: Arc<dyn StreamerLookup>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        settings: Arc<dyn GuildSettingsRepository>,
        events: Arc<dyn StreamEventRepository>,
        notifications: Arc<dyn NotificationRepository>,
        cleanup_configs: Arc<dyn CleanupConfigRepository>,
        birthdays: Arc<dyn BirthdayRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        tracker: Arc<LiveStateTracker>,
    ) -> Self {
        Self {
            lookup,
            subscriptions,
            settings,
            events,
            notifications,
            cleanup_configs,
            birthdays,
            dispatcher,
            tracker,
        }
    }

    /// Subscribe a guild to a streamer.
    ///
    /// The name is verified against the platform. Without an explicit
    /// channel the guild's default notification channel is persisted as
    /// the subscription channel; a guild with neither is rejected.
    pub async fn add_streamer(
        &self,
        guild_id: i64,
        name: &str,
        channel_id: Option<i64>,
    ) -> Result<Subscription> {
        let name = normalize_streamer_name(name);
        if name.is_empty() {
            return Err(Error::validation("streamer name is empty"));
        }
        if self.lookup.find_user(&name).await?.is_none() {
            return Err(Error::not_found("streamer", &name));
        }

        let (channel_id, custom_channel_id) = match channel_id {
            Some(id) => (id, Some(id)),
            None => {
                let settings = self.settings.get_or_default(guild_id).await?;
                let Some(default) = settings.notification_channel_id else {
                    return Err(Error::validation(
                        "no channel given and the guild has no default notification channel",
                    ));
                };
                (default, None)
            }
        };

        let subscription = self
            .subscriptions
            .add(guild_id, &name, channel_id, custom_channel_id)
            .await?;
        info!(guild_id, streamer = %name, channel_id, "streamer added");
        Ok(subscription)
    }

    /// Drop a subscription; `false` when it did not exist.
    pub async fn remove_streamer(&self, guild_id: i64, name: &str) -> Result<bool> {
        let name = normalize_streamer_name(name);
        let removed = self.subscriptions.remove(guild_id, &name).await?;
        if removed {
            info!(guild_id, streamer = %name, "streamer removed");
        }
        Ok(removed)
    }

    pub async fn list_streamers(&self, guild_id: i64) -> Result<Vec<Subscription>> {
        self.subscriptions.list_for_guild(guild_id).await
    }

    pub async fn guild_settings(&self, guild_id: i64) -> Result<GuildSettings> {
        self.settings.get_or_default(guild_id).await
    }

    /// Set the guild default channel; returns how many subscriptions
    /// without a custom channel were repointed.
    pub async fn set_default_channel(&self, guild_id: i64, channel_id: i64) -> Result<u64> {
        let repointed = self.settings.set_default_channel(guild_id, channel_id).await?;
        info!(guild_id, channel_id, repointed, "default channel set");
        Ok(repointed)
    }

    /// Set the embed accent color from `RRGGBB` hex, `#` optional.
    pub async fn set_accent_color(&self, guild_id: i64, hex: &str) -> Result<u32> {
        let color = parse_accent_color(hex)?;
        self.settings.set_accent_color(guild_id, color).await?;
        Ok(color)
    }

    pub async fn reset_accent_color(&self, guild_id: i64) -> Result<u32> {
        self.settings
            .set_accent_color(guild_id, DEFAULT_ACCENT_COLOR)
            .await?;
        Ok(DEFAULT_ACCENT_COLOR)
    }

    pub async fn set_auto_delete(&self, guild_id: i64, enabled: bool) -> Result<()> {
        self.settings.set_auto_delete(guild_id, enabled).await
    }

    pub async fn set_birthday_channel(
        &self,
        guild_id: i64,
        channel_id: Option<i64>,
    ) -> Result<()> {
        self.settings.set_birthday_channel(guild_id, channel_id).await
    }

    /// Line-oriented bulk subscribe: blank lines and `#` comments are
    /// skipped, every other line is treated as one streamer name.
    pub async fn import_streamers(&self, guild_id: i64, text: &str) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let name = normalize_streamer_name(line);
            match self.add_streamer(guild_id, &name, None).await {
                Ok(_) => report.added.push(name),
                Err(Error::Conflict(_)) => report.already_present.push(name),
                Err(Error::NotFound { .. }) => report.failed.push(name),
                Err(e) => return Err(e),
            }
        }
        info!(
            guild_id,
            added = report.added.len(),
            already_present = report.already_present.len(),
            failed = report.failed.len(),
            "streamer import finished"
        );
        Ok(report)
    }

    /// Fresh records for the guild's subscriptions currently in the
    /// live set, most-watched first.
    pub async fn currently_live(&self, guild_id: i64) -> Result<Vec<StreamRecord>> {
        let subscriptions = self.subscriptions.list_for_guild(guild_id).await?;
        let live: Vec<String> = subscriptions
            .into_iter()
            .map(|s| s.streamer_name)
            .filter(|name| self.tracker.is_live(name))
            .collect();
        if live.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for chunk in live.chunks(MAX_LOOKUP_BATCH) {
            records.extend(self.lookup.live_now(chunk).await?);
        }
        records.sort_by(|a, b| b.viewer_count.cmp(&a.viewer_count));
        Ok(records)
    }

    pub async fn monthly_leaderboard(&self, guild_id: i64) -> Result<Vec<LeaderboardRow>> {
        self.events
            .guild_leaderboard(guild_id, &current_month(), LEADERBOARD_LIMIT)
            .await
    }

    pub async fn global_monthly_leaderboard(&self) -> Result<Vec<LeaderboardRow>> {
        self.events
            .global_leaderboard(&current_month(), LEADERBOARD_LIMIT)
            .await
    }

    /// Render and send a synthetic notification through the normal
    /// dispatch path, bypassing the live set.
    pub async fn send_test_notification(&self, guild_id: i64, name: &str) -> Result<usize> {
        let name = normalize_streamer_name(name);
        let Some(subscription) = self.subscriptions.get(guild_id, &name).await? else {
            return Err(Error::not_found("subscription", &name));
        };
        let record = test_record(&name);
        let delivered = self
            .dispatcher
            .dispatch(&record, std::slice::from_ref(&subscription))
            .await;
        Ok(delivered)
    }

    /// Bulk delete of every row this service owns for a guild. Chat and
    /// role-menu teardown live with their services.
    pub async fn guild_teardown(&self, guild_id: i64) -> Result<()> {
        let subscriptions = self.subscriptions.delete_guild(guild_id).await?;
        self.events.delete_guild(guild_id).await?;
        self.notifications.delete_guild(guild_id).await?;
        self.cleanup_configs.delete_guild(guild_id).await?;
        self.birthdays.delete_guild(guild_id).await?;
        self.settings.delete_guild(guild_id).await?;
        info!(guild_id, subscriptions, "guild data removed");
        Ok(())
    }
}

fn normalize_streamer_name(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

fn parse_accent_color(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::validation("accent color must be RRGGBB hex"));
    }
    u32::from_str_radix(digits, 16)
        .map_err(|_| Error::validation("accent color must be RRGGBB hex"))
}

fn test_record(name: &str) -> StreamRecord {
    StreamRecord {
        id: format!("test-{}", Utc::now().timestamp()),
        user_id: String::new(),
        user_login: name.to_string(),
        user_name: name.to_string(),
        game_name: String::new(),
        title: "Test notification".to_string(),
        viewer_count: 0,
        started_at: Some(Utc::now()),
        thumbnail_url: String::new(),
        profile_image_url: String::new(),
    }
}

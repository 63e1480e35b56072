//! Fan-out of one live event to every subscribing guild.

use std::sync::Arc;

use helix_api::StreamRecord;
use tracing::{error, info, warn};

use crate::database::models::Subscription;
use crate::database::repositories::{GuildSettingsRepository, NotificationRepository};
use crate::discord::{MessagingClient, OutgoingMessage};

use super::embeds::live_embed;

/// Renders and sends live notifications. Terminal sink for per-recipient
/// failures: every delivery is attempted, failures are logged and swallowed,
/// nothing propagates to the polling cycle.
pub struct NotificationDispatcher {
    client: Arc<dyn MessagingClient>,
    settings: Arc<dyn GuildSettingsRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationDispatcher {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        settings: Arc<dyn GuildSettingsRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            client,
            settings,
            notifications,
        }
    }

    /// One notification per subscription; returns the delivered count.
    pub async fn dispatch(&self, stream: &StreamRecord, subscriptions: &[Subscription]) -> usize {
        let mut delivered = 0;
        for subscription in subscriptions {
            if self.dispatch_one(stream, subscription).await {
                delivered += 1;
            }
        }
        delivered
    }

    async fn dispatch_one(&self, stream: &StreamRecord, subscription: &Subscription) -> bool {
        let guild_id = subscription.guild_id;
        let streamer = stream.user_login.as_str();

        let settings = match self.settings.get_or_default(guild_id).await {
            Ok(settings) => settings,
            Err(e) => {
                error!(
                    guild_id,
                    streamer,
                    error = %e,
                    "failed to load guild settings, skipping delivery"
                );
                return false;
            }
        };
        let Some(channel_id) = subscription.resolve_channel(settings.notification_channel_id)
        else {
            warn!(
                guild_id,
                streamer, "no notification channel configured, skipping delivery"
            );
            return false;
        };

        let message = OutgoingMessage::embed(live_embed(stream, settings.accent_rgb()));
        let sent = match self.client.send_message(channel_id, &message).await {
            Ok(sent) => sent,
            Err(e) => {
                error!(
                    guild_id,
                    channel_id,
                    streamer,
                    error = %e,
                    "notification delivery failed"
                );
                return false;
            }
        };

        if settings.auto_delete_notifications
            && let Err(e) = self
                .notifications
                .record_message(guild_id, streamer, channel_id, sent.message_id)
                .await
        {
            error!(
                guild_id,
                streamer,
                message_id = sent.message_id,
                error = %e,
                "failed to record sent notification for cleanup"
            );
        }
        if let Err(e) = self
            .notifications
            .log_notification(guild_id, streamer, channel_id)
            .await
        {
            warn!(guild_id, streamer, error = %e, "failed to append notification log");
        }

        info!(guild_id, channel_id, streamer, "live notification delivered");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::{
        SqlxGuildSettingsRepository, SqlxNotificationRepository, SqlxSubscriptionRepository,
        SubscriptionRepository,
    };
    use crate::database::run_migrations;
    use crate::discord::testing::RecordingClient;
    use chrono::Utc;
    use sqlx::SqlitePool;

    async fn setup() -> (
        SqlitePool,
        Arc<RecordingClient>,
        NotificationDispatcher,
        SqlxSubscriptionRepository,
    ) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let client = Arc::new(RecordingClient::new());
        let settings = Arc::new(SqlxGuildSettingsRepository::new(pool.clone(), pool.clone()));
        let notifications = Arc::new(SqlxNotificationRepository::new(pool.clone()));
        let dispatcher =
            NotificationDispatcher::new(client.clone(), settings.clone(), notifications);
        let subs = SqlxSubscriptionRepository::new(pool.clone());
        (pool, client, dispatcher, subs)
    }

    fn live(login: &str) -> StreamRecord {
        StreamRecord {
            id: "1".to_string(),
            user_id: "77".to_string(),
            user_login: login.to_string(),
            user_name: login.to_string(),
            game_name: "Chess".to_string(),
            title: "opening prep".to_string(),
            viewer_count: 12,
            started_at: Some(Utc::now()),
            thumbnail_url: String::new(),
            profile_image_url: String::new(),
        }
    }

    #[tokio::test]
    async fn delivers_to_each_guilds_resolved_channel() {
        let (pool, client, dispatcher, subs) = setup().await;
        let settings = SqlxGuildSettingsRepository::new(pool.clone(), pool.clone());

        settings.set_default_channel(1, 100).await.unwrap();
        settings.set_accent_color(2, 0xFF0000).await.unwrap();
        subs.add(1, "bob", 100, None).await.unwrap();
        subs.add(2, "bob", 200, Some(200)).await.unwrap();
        let all = subs.subscribers_of("bob").await.unwrap();

        let delivered = dispatcher.dispatch(&live("bob"), &all).await;

        assert_eq!(delivered, 2);
        assert_eq!(client.sent_to(100).len(), 1);
        assert_eq!(client.sent_to(200).len(), 1);
        // each guild's own accent color
        let embed_b = client.sent_to(200)[0].message.embed.clone().unwrap();
        assert_eq!(embed_b.color, Some(0xFF0000));
    }

    #[tokio::test]
    async fn failure_in_one_guild_never_blocks_the_next() {
        let (pool, client, dispatcher, subs) = setup().await;
        let settings = SqlxGuildSettingsRepository::new(pool.clone(), pool.clone());

        settings.set_default_channel(1, 100).await.unwrap();
        settings.set_default_channel(2, 200).await.unwrap();
        subs.add(1, "bob", 100, None).await.unwrap();
        subs.add(2, "bob", 200, None).await.unwrap();
        client.fail_sends_to.lock().insert(100);

        let all = subs.subscribers_of("bob").await.unwrap();
        let delivered = dispatcher.dispatch(&live("bob"), &all).await;

        assert_eq!(delivered, 1);
        assert!(client.sent_to(100).is_empty());
        assert_eq!(client.sent_to(200).len(), 1);
    }

    #[tokio::test]
    async fn guild_without_any_channel_is_skipped() {
        let (_pool, client, dispatcher, subs) = setup().await;

        subs.add(1, "bob", 100, None).await.unwrap();
        let all = subs.subscribers_of("bob").await.unwrap();

        let delivered = dispatcher.dispatch(&live("bob"), &all).await;

        assert_eq!(delivered, 0);
        assert_eq!(client.sent_count(), 0);
    }

    #[tokio::test]
    async fn records_sent_message_only_when_auto_delete_enabled() {
        let (pool, _client, dispatcher, subs) = setup().await;
        let settings = SqlxGuildSettingsRepository::new(pool.clone(), pool.clone());
        let notifications = SqlxNotificationRepository::new(pool.clone());

        settings.set_default_channel(1, 100).await.unwrap();
        settings.set_auto_delete(1, true).await.unwrap();
        settings.set_default_channel(2, 200).await.unwrap();
        subs.add(1, "bob", 100, None).await.unwrap();
        subs.add(2, "bob", 200, None).await.unwrap();

        let all = subs.subscribers_of("bob").await.unwrap();
        dispatcher.dispatch(&live("bob"), &all).await;

        assert_eq!(notifications.messages_for(1, "bob").await.unwrap().len(), 1);
        assert!(notifications.messages_for(2, "bob").await.unwrap().is_empty());
    }
}

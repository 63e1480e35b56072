//! Deletion of live notifications once the stream has ended.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::Result;
use crate::database::repositories::{
    GuildSettingsRepository, NotificationRepository, SubscriptionRepository,
};
use crate::discord::{DeleteOutcome, MessagingClient};

/// Removes previously-sent notifications for a streamer that went offline.
///
/// Message deletion is best-effort against the platform; the bookkeeping
/// rows are cleared unconditionally so out-of-band deletions cannot leak
/// rows forever.
pub struct OfflineCleanup {
    client: Arc<dyn MessagingClient>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    settings: Arc<dyn GuildSettingsRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl OfflineCleanup {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        settings: Arc<dyn GuildSettingsRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            client,
            subscriptions,
            settings,
            notifications,
        }
    }

    /// Clean up after `streamer_name` for every subscribed guild with
    /// auto-delete enabled. Per-guild failures are logged and do not stop the
    /// remaining guilds.
    pub async fn run(&self, streamer_name: &str) -> Result<()> {
        let subscribers = self.subscriptions.subscribers_of(streamer_name).await?;
        for subscription in subscribers {
            let guild_id = subscription.guild_id;
            match self.settings.get_or_default(guild_id).await {
                Ok(settings) if settings.auto_delete_notifications => {
                    self.cleanup_guild(guild_id, streamer_name).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        guild_id,
                        streamer_name,
                        error = %e,
                        "failed to load guild settings during offline cleanup"
                    );
                }
            }
        }
        Ok(())
    }

    /// Delete recorded messages for one (guild, streamer) pair and clear the
    /// rows. Not-found messages count as deleted; forbidden ones are logged.
    pub async fn cleanup_guild(&self, guild_id: i64, streamer_name: &str) {
        let records = match self
            .notifications
            .messages_for(guild_id, streamer_name)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!(
                    guild_id,
                    streamer_name,
                    error = %e,
                    "failed to load notification records for cleanup"
                );
                return;
            }
        };
        if records.is_empty() {
            return;
        }

        let mut removed = 0usize;
        for record in &records {
            match self
                .client
                .delete_message(record.channel_id, record.message_id)
                .await
            {
                Ok(DeleteOutcome::Deleted) | Ok(DeleteOutcome::AlreadyGone) => removed += 1,
                Ok(DeleteOutcome::Forbidden) => {
                    warn!(
                        guild_id,
                        channel_id = record.channel_id,
                        message_id = record.message_id,
                        "missing permission to delete notification message"
                    );
                }
                Err(e) => {
                    warn!(
                        guild_id,
                        channel_id = record.channel_id,
                        message_id = record.message_id,
                        error = %e,
                        "failed to delete notification message"
                    );
                }
            }
        }

        // Rows are cleared even when some deletions failed; a user may have
        // removed the message already and the next stream would otherwise
        // re-target it forever.
        if let Err(e) = self
            .notifications
            .clear_messages(guild_id, streamer_name)
            .await
        {
            error!(
                guild_id,
                streamer_name,
                error = %e,
                "failed to clear notification records"
            );
            return;
        }

        info!(
            guild_id,
            streamer_name,
            total = records.len(),
            removed,
            "offline cleanup finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::{
        SqlxGuildSettingsRepository, SqlxNotificationRepository, SqlxSubscriptionRepository,
    };
    use crate::database::run_migrations;
    use crate::discord::testing::RecordingClient;
    use sqlx::SqlitePool;

    struct Fixture {
        pool: SqlitePool,
        client: Arc<RecordingClient>,
        cleanup: OfflineCleanup,
    }

    async fn setup() -> Fixture {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let client = Arc::new(RecordingClient::new());
        let cleanup = OfflineCleanup::new(
            client.clone(),
            Arc::new(SqlxSubscriptionRepository::new(pool.clone())),
            Arc::new(SqlxGuildSettingsRepository::new(pool.clone(), pool.clone())),
            Arc::new(SqlxNotificationRepository::new(pool.clone())),
        );
        Fixture {
            pool,
            client,
            cleanup,
        }
    }

    #[tokio::test]
    async fn clears_records_even_when_messages_are_already_gone() {
        let f = setup().await;
        let settings = SqlxGuildSettingsRepository::new(f.pool.clone(), f.pool.clone());
        let subs = SqlxSubscriptionRepository::new(f.pool.clone());
        let notifications = SqlxNotificationRepository::new(f.pool.clone());

        settings.set_default_channel(1, 100).await.unwrap();
        settings.set_auto_delete(1, true).await.unwrap();
        subs.add(1, "alice", 100, None).await.unwrap();
        notifications.record_message(1, "alice", 100, 555).await.unwrap();
        notifications.record_message(1, "alice", 100, 556).await.unwrap();
        f.client
            .delete_outcomes
            .lock()
            .insert((100, 556), DeleteOutcome::AlreadyGone);

        f.cleanup.run("alice").await.unwrap();

        assert_eq!(f.client.deleted.lock().len(), 2);
        assert!(notifications.messages_for(1, "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn forbidden_deletions_still_clear_bookkeeping() {
        let f = setup().await;
        let settings = SqlxGuildSettingsRepository::new(f.pool.clone(), f.pool.clone());
        let subs = SqlxSubscriptionRepository::new(f.pool.clone());
        let notifications = SqlxNotificationRepository::new(f.pool.clone());

        settings.set_default_channel(1, 100).await.unwrap();
        settings.set_auto_delete(1, true).await.unwrap();
        subs.add(1, "alice", 100, None).await.unwrap();
        notifications.record_message(1, "alice", 100, 555).await.unwrap();
        f.client
            .delete_outcomes
            .lock()
            .insert((100, 555), DeleteOutcome::Forbidden);

        f.cleanup.run("alice").await.unwrap();

        assert!(notifications.messages_for(1, "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn guilds_without_auto_delete_keep_their_messages() {
        let f = setup().await;
        let settings = SqlxGuildSettingsRepository::new(f.pool.clone(), f.pool.clone());
        let subs = SqlxSubscriptionRepository::new(f.pool.clone());
        let notifications = SqlxNotificationRepository::new(f.pool.clone());

        settings.set_default_channel(1, 100).await.unwrap();
        subs.add(1, "alice", 100, None).await.unwrap();
        // row exists although auto-delete is off, e.g. the setting was
        // toggled after dispatch
        notifications.record_message(1, "alice", 100, 555).await.unwrap();

        f.cleanup.run("alice").await.unwrap();

        assert!(f.client.deleted.lock().is_empty());
        assert_eq!(notifications.messages_for(1, "alice").await.unwrap().len(), 1);
    }
}

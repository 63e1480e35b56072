//! Integration tests for the herald notification pipeline.
//!
//! These use a real SQLite database (in-memory) with the actual migrations
//! and drive the poller, dispatcher, and cleanup the way the daemon wires
//! them at startup.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use helix_api::StreamRecord;
use parking_lot::Mutex;

use herald::Result;
use herald::cleanup::OfflineCleanup;
use herald::database::repositories::{
    GuildSettingsRepository, SqlxGuildSettingsRepository, SqlxNotificationRepository,
    SqlxStreamEventRepository, SqlxSubscriptionRepository, StreamEventRepository,
    SubscriptionRepository,
};
use herald::database::{DbPool, init_pool, run_migrations};
use herald::discord::{
    ChannelPermissions, ChannelRecord, DeleteOutcome, MessageRecord, MessageRef, MessagingClient,
    OutgoingMessage, UserIdentity,
};
use herald::monitor::{LiveStateTracker, LiveStreamSource, StreamPoller};
use herald::notification::{NotificationDispatcher, OperatorAlerter};

/// Helper to create a test database pool with migrations applied.
async fn setup_test_db() -> DbPool {
    let pool = init_pool("sqlite::memory:")
        .await
        .expect("Failed to create test pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

#[derive(Debug, Clone)]
struct Delivery {
    channel_id: i64,
    message: OutgoingMessage,
}

/// Minimal in-memory messaging client for the pipeline tests.
struct CapturingClient {
    sent: Mutex<Vec<Delivery>>,
    deleted: Mutex<Vec<(i64, i64)>>,
    next_message_id: AtomicI64,
}

impl CapturingClient {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(7000),
        }
    }

    /// Channel ids of every delivery, in send order.
    fn channels_hit(&self) -> Vec<i64> {
        self.sent.lock().iter().map(|d| d.channel_id).collect()
    }

    fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MessagingClient for CapturingClient {
    async fn current_user(&self) -> Result<UserIdentity> {
        Ok(UserIdentity {
            id: 1,
            username: "herald-int".to_string(),
        })
    }

    async fn get_channel(&self, channel_id: i64) -> Result<Option<ChannelRecord>> {
        Ok(Some(ChannelRecord {
            id: channel_id,
            name: Some(format!("channel-{channel_id}")),
            guild_id: Some(1),
        }))
    }

    async fn send_message(&self, channel_id: i64, message: &OutgoingMessage) -> Result<MessageRef> {
        self.sent.lock().push(Delivery {
            channel_id,
            message: message.clone(),
        });
        Ok(MessageRef {
            channel_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn delete_message(&self, channel_id: i64, message_id: i64) -> Result<DeleteOutcome> {
        self.deleted.lock().push((channel_id, message_id));
        Ok(DeleteOutcome::Deleted)
    }

    async fn bulk_delete(&self, _channel_id: i64, _message_ids: &[i64]) -> Result<()> {
        Ok(())
    }

    async fn list_messages(
        &self,
        _channel_id: i64,
        _before: Option<i64>,
        _limit: u8,
    ) -> Result<Vec<MessageRecord>> {
        Ok(Vec::new())
    }

    async fn channel_permissions(&self, _channel_id: i64) -> Result<ChannelPermissions> {
        Ok(ChannelPermissions {
            view_channel: true,
            send_messages: true,
            manage_messages: true,
            read_message_history: true,
        })
    }

    async fn create_dm(&self, user_id: i64) -> Result<i64> {
        Ok(900_000 + user_id)
    }

    fn bulk_delete_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(14) - chrono::Duration::minutes(10)
    }
}

/// Scripted live-status source: each cycle reports the current live set,
/// filtered to the requested names like the real platform does.
struct ScriptedPlatform {
    live: Mutex<Vec<StreamRecord>>,
}

impl ScriptedPlatform {
    fn new() -> Self {
        Self {
            live: Mutex::new(Vec::new()),
        }
    }

    fn set_live(&self, records: Vec<StreamRecord>) {
        *self.live.lock() = records;
    }
}

#[async_trait]
impl LiveStreamSource for ScriptedPlatform {
    async fn live_streams(&self, names: &[String]) -> Result<Vec<StreamRecord>> {
        Ok(self
            .live
            .lock()
            .iter()
            .filter(|r| names.contains(&r.user_login))
            .cloned()
            .collect())
    }
}

fn live_record(login: &str) -> StreamRecord {
    StreamRecord {
        id: "1".to_string(),
        user_id: "42".to_string(),
        user_login: login.to_string(),
        user_name: login.to_string(),
        game_name: "Rhythm Games".to_string(),
        title: "friday session".to_string(),
        viewer_count: 31,
        started_at: Some(Utc::now()),
        thumbnail_url: String::new(),
        profile_image_url: String::new(),
    }
}

struct Pipeline {
    pool: DbPool,
    client: Arc<CapturingClient>,
    platform: Arc<ScriptedPlatform>,
    poller: StreamPoller,
}

/// Wire the full detection pipeline over one in-memory database, the same
/// graph `main` builds at startup.
async fn setup_pipeline() -> Pipeline {
    let pool = setup_test_db().await;
    let client = Arc::new(CapturingClient::new());
    let platform = Arc::new(ScriptedPlatform::new());

    let subscriptions = Arc::new(SqlxSubscriptionRepository::new(pool.clone()));
    let settings = Arc::new(SqlxGuildSettingsRepository::new(pool.clone(), pool.clone()));
    let notifications = Arc::new(SqlxNotificationRepository::new(pool.clone()));
    let events = Arc::new(SqlxStreamEventRepository::new(pool.clone()));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        client.clone(),
        settings.clone(),
        notifications.clone(),
    ));
    let cleanup = Arc::new(OfflineCleanup::new(
        client.clone(),
        subscriptions.clone(),
        settings,
        notifications,
    ));
    let alerter = Arc::new(OperatorAlerter::new(client.clone(), None));
    let poller = StreamPoller::new(
        platform.clone(),
        subscriptions,
        events,
        dispatcher,
        cleanup,
        alerter,
        Arc::new(LiveStateTracker::new()),
    );

    Pipeline {
        pool,
        client,
        platform,
        poller,
    }
}

mod channel_resolution_tests {
    use super::*;

    #[tokio::test]
    async fn default_channel_change_applies_to_the_next_stream() {
        let p = setup_pipeline().await;
        let settings = SqlxGuildSettingsRepository::new(p.pool.clone(), p.pool.clone());
        let subs = SqlxSubscriptionRepository::new(p.pool.clone());

        settings.set_default_channel(1, 100).await.expect("set default");
        subs.add(1, "alice", 100, None).await.expect("subscribe");

        p.platform.set_live(vec![live_record("alice")]);
        let first = p.poller.run_cycle().await.expect("first cycle");
        assert_eq!(first.notified, 1);
        assert_eq!(p.client.channels_hit(), vec![100]);

        p.platform.set_live(Vec::new());
        let offline = p.poller.run_cycle().await.expect("offline cycle");
        assert_eq!(offline.went_offline, 1);

        // The guild repoints its default; the stored channel_id snapshot on
        // the subscription row must not pin the old location.
        settings.set_default_channel(1, 101).await.expect("move default");
        p.platform.set_live(vec![live_record("alice")]);
        let third = p.poller.run_cycle().await.expect("third cycle");
        assert_eq!(third.notified, 1);
        assert_eq!(p.client.channels_hit(), vec![100, 101]);
    }

    #[tokio::test]
    async fn custom_channel_pins_delivery_across_default_changes() {
        let p = setup_pipeline().await;
        let settings = SqlxGuildSettingsRepository::new(p.pool.clone(), p.pool.clone());
        let subs = SqlxSubscriptionRepository::new(p.pool.clone());

        settings.set_default_channel(1, 100).await.expect("set default");
        subs.add(1, "bob", 200, Some(200)).await.expect("subscribe");

        p.platform.set_live(vec![live_record("bob")]);
        p.poller.run_cycle().await.expect("first cycle");

        p.platform.set_live(Vec::new());
        p.poller.run_cycle().await.expect("offline cycle");

        settings.set_default_channel(1, 101).await.expect("move default");
        p.platform.set_live(vec![live_record("bob")]);
        p.poller.run_cycle().await.expect("third cycle");

        assert_eq!(p.client.channels_hit(), vec![200, 200]);
    }

    #[tokio::test]
    async fn each_guild_renders_its_own_accent_color() {
        let p = setup_pipeline().await;
        let settings = SqlxGuildSettingsRepository::new(p.pool.clone(), p.pool.clone());
        let subs = SqlxSubscriptionRepository::new(p.pool.clone());

        settings.set_default_channel(1, 100).await.expect("guild 1 default");
        settings.set_default_channel(2, 200).await.expect("guild 2 default");
        settings.set_accent_color(2, 0x00FF00).await.expect("guild 2 accent");
        subs.add(1, "carol", 100, None).await.expect("guild 1 sub");
        subs.add(2, "carol", 200, None).await.expect("guild 2 sub");

        p.platform.set_live(vec![live_record("carol")]);
        let summary = p.poller.run_cycle().await.expect("cycle");
        assert_eq!(summary.notified, 2);

        let sent = p.client.deliveries();
        let to_one = sent.iter().find(|d| d.channel_id == 100).expect("guild 1 delivery");
        let to_two = sent.iter().find(|d| d.channel_id == 200).expect("guild 2 delivery");
        let color_one = to_one.message.embed.as_ref().expect("embed").color;
        let color_two = to_two.message.embed.as_ref().expect("embed").color;
        assert_eq!(
            color_one,
            Some(herald::database::models::DEFAULT_ACCENT_COLOR)
        );
        assert_eq!(color_two, Some(0x00FF00));
    }
}

mod leaderboard_tests {
    use super::*;

    #[tokio::test]
    async fn notify_cycle_tallies_guild_and_global_events() {
        let p = setup_pipeline().await;
        let settings = SqlxGuildSettingsRepository::new(p.pool.clone(), p.pool.clone());
        let subs = SqlxSubscriptionRepository::new(p.pool.clone());

        settings.set_default_channel(1, 100).await.expect("set default");
        subs.add(1, "alice", 100, None).await.expect("subscribe");

        p.platform.set_live(vec![live_record("alice")]);
        p.poller.run_cycle().await.expect("cycle");

        let events = SqlxStreamEventRepository::new(p.pool.clone());
        let month = Utc::now().format("%Y-%m").to_string();

        let guild = events
            .guild_leaderboard(1, &month, 10)
            .await
            .expect("guild rows");
        assert_eq!(guild.len(), 1);
        assert_eq!(guild[0].streamer_name, "alice");
        assert_eq!(guild[0].events, 1);

        let global = events.global_leaderboard(&month, 10).await.expect("global rows");
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].events, 1);
    }

    #[tokio::test]
    async fn months_are_tallied_separately() {
        let pool = setup_test_db().await;
        let events = SqlxStreamEventRepository::new(pool.clone());

        events.record_event(1, "alice", "2026-07-30").await.expect("july event");
        events.record_event(1, "alice", "2026-07-31").await.expect("july event");
        events.record_event(1, "alice", "2026-08-01").await.expect("august event");

        let july = events.guild_leaderboard(1, "2026-07", 10).await.expect("july rows");
        assert_eq!(july.len(), 1);
        assert_eq!(july[0].events, 2);

        let august = events.guild_leaderboard(1, "2026-08", 10).await.expect("august rows");
        assert_eq!(august.len(), 1);
        assert_eq!(august[0].events, 1);
    }

    #[tokio::test]
    async fn repeat_sightings_on_one_day_count_once() {
        let pool = setup_test_db().await;
        let events = SqlxStreamEventRepository::new(pool.clone());

        events.record_event(1, "alice", "2026-08-02").await.expect("first");
        // mixed case collapses onto the stored lowercase name
        events.record_event(1, "Alice", "2026-08-02").await.expect("repeat");

        let rows = events.guild_leaderboard(1, "2026-08", 10).await.expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].events, 1);
    }

    #[tokio::test]
    async fn ranking_orders_by_count_then_name_and_honors_limit() {
        let pool = setup_test_db().await;
        let events = SqlxStreamEventRepository::new(pool.clone());

        events.record_event(1, "carol", "2026-08-01").await.expect("event");
        events.record_event(1, "carol", "2026-08-02").await.expect("event");
        events.record_event(1, "bob", "2026-08-01").await.expect("event");
        events.record_event(1, "alice", "2026-08-03").await.expect("event");

        let rows = events.guild_leaderboard(1, "2026-08", 10).await.expect("rows");
        let names: Vec<&str> = rows.iter().map(|r| r.streamer_name.as_str()).collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);

        let capped = events.guild_leaderboard(1, "2026-08", 2).await.expect("capped rows");
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].streamer_name, "carol");
    }

    #[tokio::test]
    async fn guild_teardown_clears_only_that_guilds_tallies() {
        let pool = setup_test_db().await;
        let events = SqlxStreamEventRepository::new(pool.clone());

        events.record_event(1, "alice", "2026-08-01").await.expect("guild 1 event");
        events.record_event(2, "alice", "2026-08-01").await.expect("guild 2 event");
        events.record_global_event("alice", "2026-08-01").await.expect("global event");

        events.delete_guild(1).await.expect("teardown");

        assert!(events.guild_leaderboard(1, "2026-08", 10).await.expect("guild 1").is_empty());
        assert_eq!(events.guild_leaderboard(2, "2026-08", 10).await.expect("guild 2").len(), 1);
        assert_eq!(events.global_leaderboard("2026-08", 10).await.expect("global").len(), 1);
    }
}

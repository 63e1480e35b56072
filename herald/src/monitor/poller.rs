//! Fixed-interval polling scheduler: drives live detection end to end.
//!
//! Each cycle loads the subscribed names, queries live status in batches,
//! diffs the result against the live set, and hands transitions to the
//! dispatcher (offline→live) and the offline cleanup (live→offline). A
//! cycle failure is logged and alerted, never allowed to kill the loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helix_api::{HelixClient, MAX_LOOKUP_BATCH, StreamRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::cleanup::OfflineCleanup;
use crate::database::models::Subscription;
use crate::database::repositories::{StreamEventRepository, SubscriptionRepository};
use crate::heartbeat::{Heartbeats, TASK_POLL};
use crate::notification::{AlertKind, NotificationDispatcher, OperatorAlerter};

use super::live_state::LiveStateTracker;

const DEFAULT_INTERVAL_SECS: u64 = 90;
/// Streams first observed more than this long after their reported start are
/// assumed to predate this process (or a notification already sent) and are
/// marked live without notifying.
const DEFAULT_RECENCY_WINDOW_MINS: i64 = 5;

/// Batched live-status lookup the poller drives. Production wraps the
/// platform client; tests script their own.
#[async_trait]
pub trait LiveStreamSource: Send + Sync {
    /// Live records for up to [`MAX_LOOKUP_BATCH`] names. Implementations
    /// degrade to an empty list on ordinary upstream failures and return an
    /// error only when authentication is unrecoverable for this cycle.
    async fn live_streams(&self, names: &[String]) -> Result<Vec<StreamRecord>>;
}

#[async_trait]
impl LiveStreamSource for HelixClient {
    async fn live_streams(&self, names: &[String]) -> Result<Vec<StreamRecord>> {
        Ok(self.get_live_streams(names).await?)
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub recency_window: chrono::Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            recency_window: chrono::Duration::minutes(DEFAULT_RECENCY_WINDOW_MINS),
        }
    }
}

/// Counters from one finished cycle, for logging and the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub monitored: usize,
    pub live: usize,
    pub notified: usize,
    pub suppressed: usize,
    pub went_offline: usize,
}

pub struct StreamPoller {
    source: Arc<dyn LiveStreamSource>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    events: Arc<dyn StreamEventRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    cleanup: Arc<OfflineCleanup>,
    alerter: Arc<OperatorAlerter>,
    tracker: Arc<LiveStateTracker>,
    heartbeats: Arc<Heartbeats>,
    config: PollerConfig,
}

impl StreamPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn LiveStreamSource>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        events: Arc<dyn StreamEventRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        cleanup: Arc<OfflineCleanup>,
        alerter: Arc<OperatorAlerter>,
        tracker: Arc<LiveStateTracker>,
    ) -> Self {
        Self::with_config(
            source,
            subscriptions,
            events,
            dispatcher,
            cleanup,
            alerter,
            tracker,
            PollerConfig::default(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_config(
        source: Arc<dyn LiveStreamSource>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        events: Arc<dyn StreamEventRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        cleanup: Arc<OfflineCleanup>,
        alerter: Arc<OperatorAlerter>,
        tracker: Arc<LiveStateTracker>,
        config: PollerConfig,
    ) -> Self {
        Self {
            source,
            subscriptions,
            events,
            dispatcher,
            cleanup,
            alerter,
            tracker,
            heartbeats: Arc::new(Heartbeats::new()),
            config,
        }
    }

    /// Report ticks into a shared heartbeat registry.
    pub fn with_heartbeats(mut self, heartbeats: Arc<Heartbeats>) -> Self {
        self.heartbeats = heartbeats;
        self
    }

    pub fn tracker(&self) -> &Arc<LiveStateTracker> {
        &self.tracker
    }

    /// Run cycles until the token is cancelled. The in-flight cycle always
    /// finishes; cycle failures alert the operator and the next tick runs
    /// normally.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.interval.as_secs(),
            "stream poller started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {}
            }

            self.heartbeats.beat(TASK_POLL);
            match self.run_cycle().await {
                Ok(summary) => {
                    debug!(
                        monitored = summary.monitored,
                        live = summary.live,
                        notified = summary.notified,
                        suppressed = summary.suppressed,
                        went_offline = summary.went_offline,
                        "poll cycle finished"
                    );
                }
                Err(e) => {
                    error!(error = %e, "poll cycle failed");
                    self.alerter
                        .alert(
                            AlertKind::PollCycle,
                            None,
                            format!("Stream poll cycle failed: {e}"),
                        )
                        .await;
                }
            }
        }

        info!("stream poller stopped");
    }

    /// One detection cycle over all subscriptions.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let names = self.subscriptions.all_streamer_names().await?;
        let mut summary = CycleSummary {
            monitored: names.len(),
            ..Default::default()
        };

        let mut live = Vec::new();
        for chunk in names.chunks(MAX_LOOKUP_BATCH) {
            live.extend(self.source.live_streams(chunk).await?);
        }
        summary.live = live.len();

        let now = Utc::now();
        let diff = classify_batch(
            &self.tracker.snapshot(),
            &live,
            now,
            self.config.recency_window,
        );

        for record in &diff.suppress {
            self.tracker.mark_live(&record.user_login);
            debug!(
                streamer = %record.user_login,
                started_at = ?record.started_at,
                "stream was already running, marked live without notifying"
            );
        }
        summary.suppressed = diff.suppress.len();

        for record in &diff.notify {
            let streamer = record.user_login.as_str();
            let subscribers = match self.subscriptions.subscribers_of(streamer).await {
                Ok(subscribers) => subscribers,
                Err(e) => {
                    // Left unmarked so the next cycle retries the dispatch.
                    error!(streamer, error = %e, "failed to load subscribers, deferring notification");
                    continue;
                }
            };
            self.tracker.mark_live(streamer);
            info!(streamer, title = %record.title, "streamer went live");
            summary.notified += self.dispatcher.dispatch(record, &subscribers).await;
            self.record_events(streamer, &subscribers, now).await;
        }

        for name in &diff.offline {
            self.tracker.mark_offline(name);
            info!(streamer = %name, "streamer went offline");
            if let Err(e) = self.cleanup.run(name).await {
                error!(streamer = %name, error = %e, "offline cleanup failed");
            }
            summary.went_offline += 1;
        }

        Ok(summary)
    }

    /// Leaderboard tallies: one per subscribed guild plus one global, at most
    /// once per streamer per calendar day (enforced by the store).
    async fn record_events(
        &self,
        streamer: &str,
        subscribers: &[Subscription],
        now: DateTime<Utc>,
    ) {
        let date = now.format("%Y-%m-%d").to_string();
        if let Err(e) = self.events.record_global_event(streamer, &date).await {
            warn!(streamer, error = %e, "failed to record global stream event");
        }
        for subscription in subscribers {
            if let Err(e) = self
                .events
                .record_event(subscription.guild_id, streamer, &date)
                .await
            {
                warn!(
                    guild_id = subscription.guild_id,
                    streamer,
                    error = %e,
                    "failed to record guild stream event"
                );
            }
        }
    }
}

struct BatchDiff {
    notify: Vec<StreamRecord>,
    suppress: Vec<StreamRecord>,
    offline: Vec<String>,
}

/// Diff one poll's live batch against the previous live set.
///
/// A record absent from the set is notification-worthy unless its reported
/// start predates the recency window; records without a start time count as
/// fresh. Names in the set but missing from the batch went offline.
fn classify_batch(
    previously_live: &HashSet<String>,
    live: &[StreamRecord],
    now: DateTime<Utc>,
    recency_window: chrono::Duration,
) -> BatchDiff {
    let live_logins: HashSet<String> = live
        .iter()
        .map(|record| record.user_login.to_lowercase())
        .collect();

    let mut notify = Vec::new();
    let mut suppress = Vec::new();
    for record in live {
        if previously_live.contains(&record.user_login.to_lowercase()) {
            continue;
        }
        let stale = record
            .started_at
            .is_some_and(|started| now.signed_duration_since(started) > recency_window);
        if stale {
            suppress.push(record.clone());
        } else {
            notify.push(record.clone());
        }
    }

    let mut offline: Vec<String> = previously_live
        .iter()
        .filter(|name| !live_logins.contains(*name))
        .cloned()
        .collect();
    offline.sort();

    BatchDiff {
        notify,
        suppress,
        offline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::{
        GuildSettingsRepository, SqlxGuildSettingsRepository, SqlxNotificationRepository,
        SqlxStreamEventRepository, SqlxSubscriptionRepository,
    };
    use crate::database::run_migrations;
    use crate::discord::testing::RecordingClient;
    use parking_lot::Mutex;
    use sqlx::SqlitePool;
    use std::collections::VecDeque;

    fn record(login: &str, started_mins_ago: Option<i64>) -> StreamRecord {
        StreamRecord {
            id: "1".to_string(),
            user_id: "7".to_string(),
            user_login: login.to_string(),
            user_name: login.to_string(),
            game_name: "Chess".to_string(),
            title: "match".to_string(),
            viewer_count: 5,
            started_at: started_mins_ago.map(|m| Utc::now() - chrono::Duration::minutes(m)),
            thumbnail_url: String::new(),
            profile_image_url: String::new(),
        }
    }

    fn window() -> chrono::Duration {
        chrono::Duration::minutes(5)
    }

    #[test]
    fn fresh_stream_is_notification_worthy() {
        let diff = classify_batch(
            &HashSet::new(),
            &[record("alice", Some(2))],
            Utc::now(),
            window(),
        );
        assert_eq!(diff.notify.len(), 1);
        assert!(diff.suppress.is_empty());
        assert!(diff.offline.is_empty());
    }

    #[test]
    fn long_running_stream_is_suppressed_on_first_sight() {
        let diff = classify_batch(
            &HashSet::new(),
            &[record("alice", Some(180))],
            Utc::now(),
            window(),
        );
        assert!(diff.notify.is_empty());
        assert_eq!(diff.suppress.len(), 1);
    }

    #[test]
    fn missing_start_time_counts_as_fresh() {
        let diff = classify_batch(&HashSet::new(), &[record("alice", None)], Utc::now(), window());
        assert_eq!(diff.notify.len(), 1);
    }

    #[test]
    fn known_live_stream_produces_no_transition() {
        let previously: HashSet<String> = ["alice".to_string()].into();
        let diff = classify_batch(&previously, &[record("alice", Some(2))], Utc::now(), window());
        assert!(diff.notify.is_empty());
        assert!(diff.suppress.is_empty());
        assert!(diff.offline.is_empty());
    }

    #[test]
    fn omission_from_the_batch_is_an_offline_transition() {
        let previously: HashSet<String> = ["alice".to_string(), "bob".to_string()].into();
        let diff = classify_batch(&previously, &[record("bob", Some(2))], Utc::now(), window());
        assert_eq!(diff.offline, vec!["alice"]);
    }

    #[test]
    fn mixed_case_logins_match_the_tracked_name() {
        let previously: HashSet<String> = ["alice".to_string()].into();
        let diff = classify_batch(&previously, &[record("Alice", Some(2))], Utc::now(), window());
        assert!(diff.notify.is_empty());
        assert!(diff.offline.is_empty());
    }

    struct ScriptedSource {
        batches: Mutex<VecDeque<Result<Vec<StreamRecord>>>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Result<Vec<StreamRecord>>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
            }
        }
    }

    #[async_trait]
    impl LiveStreamSource for ScriptedSource {
        async fn live_streams(&self, _names: &[String]) -> Result<Vec<StreamRecord>> {
            self.batches.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    async fn build_poller(
        pool: &SqlitePool,
        client: Arc<RecordingClient>,
        source: Arc<dyn LiveStreamSource>,
    ) -> StreamPoller {
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
        let alerter = Arc::new(OperatorAlerter::new(client, None));
        StreamPoller::new(
            source,
            subscriptions,
            events,
            dispatcher,
            cleanup,
            alerter,
            Arc::new(LiveStateTracker::new()),
        )
    }

    #[tokio::test]
    async fn full_edge_cycle_notifies_once_then_cleans_up() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let client = Arc::new(RecordingClient::new());
        let settings = SqlxGuildSettingsRepository::new(pool.clone(), pool.clone());
        let subs = SqlxSubscriptionRepository::new(pool.clone());
        settings.set_default_channel(1, 100).await.unwrap();
        settings.set_auto_delete(1, true).await.unwrap();
        use crate::database::repositories::SubscriptionRepository as _;
        subs.add(1, "alice", 100, None).await.unwrap();

        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![record("alice", Some(2))]),
            Ok(vec![record("alice", Some(3))]),
            Ok(Vec::new()),
        ]));
        let poller = build_poller(&pool, client.clone(), source).await;

        let first = poller.run_cycle().await.unwrap();
        assert_eq!(first.notified, 1);
        assert!(poller.tracker().is_live("alice"));

        let second = poller.run_cycle().await.unwrap();
        assert_eq!(second.notified, 0);
        assert_eq!(client.sent_count(), 1);

        let third = poller.run_cycle().await.unwrap();
        assert_eq!(third.went_offline, 1);
        assert!(!poller.tracker().is_live("alice"));
        // auto-delete removed the recorded message
        assert_eq!(client.deleted.lock().len(), 1);
    }

    #[tokio::test]
    async fn restart_with_long_running_stream_stays_quiet() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let client = Arc::new(RecordingClient::new());
        let settings = SqlxGuildSettingsRepository::new(pool.clone(), pool.clone());
        let subs = SqlxSubscriptionRepository::new(pool.clone());
        settings.set_default_channel(1, 100).await.unwrap();
        use crate::database::repositories::SubscriptionRepository as _;
        subs.add(1, "bob", 100, None).await.unwrap();

        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![record(
            "bob",
            Some(180),
        )])]));
        let poller = build_poller(&pool, client.clone(), source).await;

        let summary = poller.run_cycle().await.unwrap();

        assert_eq!(summary.suppressed, 1);
        assert_eq!(summary.notified, 0);
        assert_eq!(client.sent_count(), 0);
        assert!(poller.tracker().is_live("bob"));
    }

    #[tokio::test]
    async fn cycle_error_leaves_the_live_set_untouched() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let client = Arc::new(RecordingClient::new());
        let settings = SqlxGuildSettingsRepository::new(pool.clone(), pool.clone());
        let subs = SqlxSubscriptionRepository::new(pool.clone());
        settings.set_default_channel(1, 100).await.unwrap();
        use crate::database::repositories::SubscriptionRepository as _;
        subs.add(1, "alice", 100, None).await.unwrap();

        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![record("alice", Some(1))]),
            Err(crate::Error::messaging("auth exchange failed".to_string())),
        ]));
        let poller = build_poller(&pool, client.clone(), source).await;

        poller.run_cycle().await.unwrap();
        assert!(poller.tracker().is_live("alice"));

        assert!(poller.run_cycle().await.is_err());
        // alice is not spuriously retired by the failed cycle
        assert!(poller.tracker().is_live("alice"));
        assert!(client.deleted.lock().is_empty());
    }
}

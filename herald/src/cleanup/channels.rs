//! Hourly channel maintenance: prune messages past a configured age.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::database::models::CleanupConfig;
use crate::database::repositories::{CleanupConfigRepository, NotificationRepository};
use crate::discord::{DeleteOutcome, MessagingClient};
use crate::heartbeat::{Heartbeats, TASK_MAINTENANCE};
use crate::notification::{AlertKind, OperatorAlerter};

const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 3600;
const LIST_PAGE_SIZE: u8 = 100;
/// History pages scanned per channel per run; anything deeper waits for the
/// next hourly pass.
const MAX_PAGES_PER_CHANNEL: usize = 25;
/// Audit rows in notification_log are kept this long.
const NOTIFICATION_LOG_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceSummary {
    pub channels: usize,
    pub deleted: usize,
    pub failures: usize,
}

/// Deletes old messages from channels with a retention rule. Messages still
/// inside the platform's bulk-delete window go through the batched path,
/// older ones one by one. Permission shortfalls are detected up front and
/// alerted instead of producing a failing delete storm.
pub struct ChannelMaintenance {
    client: Arc<dyn MessagingClient>,
    configs: Arc<dyn CleanupConfigRepository>,
    notifications: Arc<dyn NotificationRepository>,
    alerter: Arc<OperatorAlerter>,
    heartbeats: Arc<Heartbeats>,
    interval: Duration,
}

impl ChannelMaintenance {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        configs: Arc<dyn CleanupConfigRepository>,
        notifications: Arc<dyn NotificationRepository>,
        alerter: Arc<OperatorAlerter>,
    ) -> Self {
        Self {
            client,
            configs,
            notifications,
            alerter,
            heartbeats: Arc::new(Heartbeats::new()),
            interval: Duration::from_secs(DEFAULT_MAINTENANCE_INTERVAL_SECS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Report ticks into a shared heartbeat registry.
    pub fn with_heartbeats(mut self, heartbeats: Arc<Heartbeats>) -> Self {
        self.heartbeats = heartbeats;
        self
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.interval.as_secs(),
            "channel maintenance started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {}
            }

            self.heartbeats.beat(TASK_MAINTENANCE);
            match self.run_once().await {
                Ok(summary) => {
                    debug!(
                        channels = summary.channels,
                        deleted = summary.deleted,
                        failures = summary.failures,
                        "channel maintenance pass finished"
                    );
                }
                Err(e) => {
                    error!(error = %e, "channel maintenance pass failed");
                    self.alerter
                        .alert(
                            AlertKind::Maintenance,
                            None,
                            format!("Channel maintenance failed: {e}"),
                        )
                        .await;
                }
            }
        }

        info!("channel maintenance stopped");
    }

    /// One pass over every retention rule. Per-channel failures are isolated.
    pub async fn run_once(&self) -> Result<MaintenanceSummary> {
        let configs = self.configs.list_all().await?;
        let mut summary = MaintenanceSummary {
            channels: configs.len(),
            ..Default::default()
        };

        for config in &configs {
            match self.clean_channel(config).await {
                Ok(deleted) => summary.deleted += deleted,
                Err(e) => {
                    error!(
                        guild_id = config.guild_id,
                        channel_id = config.channel_id,
                        error = %e,
                        "failed to clean channel"
                    );
                    summary.failures += 1;
                }
            }
        }

        match self
            .notifications
            .trim_log(NOTIFICATION_LOG_RETENTION_DAYS)
            .await
        {
            Ok(0) => {}
            Ok(trimmed) => debug!(trimmed, "trimmed old notification log rows"),
            Err(e) => warn!(error = %e, "failed to trim notification log"),
        }

        Ok(summary)
    }

    async fn clean_channel(&self, config: &CleanupConfig) -> Result<usize> {
        let perms = self.client.channel_permissions(config.channel_id).await?;
        if !perms.can_purge() {
            let missing = perms.missing_for_purge().join(", ");
            warn!(
                guild_id = config.guild_id,
                channel_id = config.channel_id,
                missing,
                "skipping channel cleanup, permissions missing"
            );
            self.alerter
                .alert(
                    AlertKind::Permissions,
                    Some(config.guild_id),
                    format!(
                        "Cannot clean channel {}: missing {missing}",
                        config.channel_id
                    ),
                )
                .await;
            return Ok(0);
        }

        let now = Utc::now();
        let cutoff = now - chrono::Duration::hours(config.max_age_hours);
        let bulk_floor = now - self.client.bulk_delete_max_age();

        let mut bulk_ids = Vec::new();
        let mut single_ids = Vec::new();
        let mut before = None;
        for _ in 0..MAX_PAGES_PER_CHANNEL {
            let page = self
                .client
                .list_messages(config.channel_id, before, LIST_PAGE_SIZE)
                .await?;
            if page.is_empty() {
                break;
            }
            before = page.last().map(|m| m.id);
            for message in &page {
                if message.timestamp >= cutoff {
                    continue;
                }
                if config.keep_pinned && message.pinned {
                    continue;
                }
                if message.timestamp > bulk_floor {
                    bulk_ids.push(message.id);
                } else {
                    single_ids.push(message.id);
                }
            }
            if page.len() < LIST_PAGE_SIZE as usize {
                break;
            }
        }

        let mut deleted = 0usize;
        for chunk in bulk_ids.chunks(100) {
            match self.client.bulk_delete(config.channel_id, chunk).await {
                Ok(()) => deleted += chunk.len(),
                Err(e) => warn!(
                    channel_id = config.channel_id,
                    count = chunk.len(),
                    error = %e,
                    "bulk delete failed"
                ),
            }
        }
        for id in &single_ids {
            match self.client.delete_message(config.channel_id, *id).await {
                Ok(DeleteOutcome::Deleted) | Ok(DeleteOutcome::AlreadyGone) => deleted += 1,
                Ok(DeleteOutcome::Forbidden) => warn!(
                    channel_id = config.channel_id,
                    message_id = id,
                    "delete forbidden despite permission probe"
                ),
                Err(e) => warn!(
                    channel_id = config.channel_id,
                    message_id = id,
                    error = %e,
                    "failed to delete old message"
                ),
            }
        }

        if deleted > 0 {
            info!(
                guild_id = config.guild_id,
                channel_id = config.channel_id,
                deleted,
                "removed messages past retention age"
            );
        }
        Ok(deleted)
    }
}

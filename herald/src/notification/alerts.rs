//! Rate-limited operator alerts.
//!
//! Critical failures are mirrored to the operator over DM. Alerts are keyed
//! by (kind, guild) and suppressed within a cooldown window so a recurring
//! condition produces one message per window instead of one per occurrence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use strum::Display;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::discord::{MessagingClient, OutgoingMessage};
use crate::Result;

const DEFAULT_COOLDOWN_SECS: i64 = 3600;

/// Alert category; part of the suppression key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AlertKind {
    /// The polling cycle failed top to bottom.
    PollCycle,
    /// Channel maintenance could not run.
    Maintenance,
    /// The bot lacks permissions it needs in a channel.
    Permissions,
}

pub struct OperatorAlerter {
    client: Arc<dyn MessagingClient>,
    operator_id: Option<i64>,
    cooldown: Duration,
    last_sent: DashMap<(AlertKind, Option<i64>), DateTime<Utc>>,
    dm_channel: OnceCell<i64>,
}

impl OperatorAlerter {
    pub fn new(client: Arc<dyn MessagingClient>, operator_id: Option<i64>) -> Self {
        Self {
            client,
            operator_id,
            cooldown: Duration::seconds(DEFAULT_COOLDOWN_SECS),
            last_sent: DashMap::new(),
            dm_channel: OnceCell::new(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Send an alert unless the same (kind, guild) fired within the cooldown.
    /// Terminal sink: delivery failures are logged, never propagated.
    pub async fn alert(&self, kind: AlertKind, guild_id: Option<i64>, message: impl AsRef<str>) {
        let message = message.as_ref();
        let Some(operator_id) = self.operator_id else {
            debug!(%kind, message, "operator alerts disabled, dropping alert");
            return;
        };

        let key = (kind, guild_id);
        let now = Utc::now();
        if let Some(last) = self.last_sent.get(&key)
            && now.signed_duration_since(*last) < self.cooldown
        {
            debug!(%kind, ?guild_id, "alert suppressed within cooldown");
            return;
        }

        let text = match guild_id {
            Some(gid) => format!("[{kind}] guild {gid}: {message}"),
            None => format!("[{kind}] {message}"),
        };
        match self.send_dm(operator_id, &text).await {
            Ok(()) => {
                self.last_sent.insert(key, now);
                info!(%kind, ?guild_id, "operator alert sent");
            }
            Err(e) => {
                error!(%kind, ?guild_id, error = %e, "failed to deliver operator alert");
            }
        }
    }

    async fn send_dm(&self, operator_id: i64, text: &str) -> Result<()> {
        let channel_id = *self
            .dm_channel
            .get_or_try_init(|| self.client.create_dm(operator_id))
            .await?;
        self.client
            .send_message(channel_id, &OutgoingMessage::text(text))
            .await?;
        Ok(())
    }
}

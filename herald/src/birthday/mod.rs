//! Daily birthday announcements.
//!
//! An hourly tick that only acts inside the 06:00 UTC hour, guarded by the
//! date of the last completed run so restarts inside that hour neither skip
//! nor duplicate the day's announcements. Leap-day birthdays fire only on an
//! actual February 29th.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::database::models::Birthday;
use crate::database::repositories::{BirthdayRepository, GuildSettingsRepository};
use crate::discord::{MessagingClient, OutgoingMessage};
use crate::heartbeat::{Heartbeats, TASK_BIRTHDAYS};

const ANNOUNCE_HOUR_UTC: u32 = 6;
const TICK_INTERVAL_SECS: u64 = 3600;

pub struct BirthdayService {
    client: Arc<dyn MessagingClient>,
    birthdays: Arc<dyn BirthdayRepository>,
    settings: Arc<dyn GuildSettingsRepository>,
    heartbeats: Arc<Heartbeats>,
    last_run: Mutex<Option<NaiveDate>>,
}

impl BirthdayService {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        birthdays: Arc<dyn BirthdayRepository>,
        settings: Arc<dyn GuildSettingsRepository>,
    ) -> Self {
        Self {
            client,
            birthdays,
            settings,
            heartbeats: Arc::new(Heartbeats::new()),
            last_run: Mutex::new(None),
        }
    }

    /// Report ticks into a shared heartbeat registry.
    pub fn with_heartbeats(mut self, heartbeats: Arc<Heartbeats>) -> Self {
        self.heartbeats = heartbeats;
        self
    }

    /// Hourly loop. The first tick fires immediately, which doubles as the
    /// startup catch-up when the process comes up during the announce hour.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(TICK_INTERVAL_SECS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(hour_utc = ANNOUNCE_HOUR_UTC, "birthday service started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {}
            }
            self.heartbeats.beat(TASK_BIRTHDAYS);
            self.maybe_announce(Utc::now()).await;
        }

        info!("birthday service stopped");
    }

    /// Announce when `now` falls in the announce hour and today's run has
    /// not happened yet. Returns whether a run was performed.
    pub async fn maybe_announce(&self, now: DateTime<Utc>) -> bool {
        if now.hour() != ANNOUNCE_HOUR_UTC {
            return false;
        }
        let today = now.date_naive();
        {
            let mut last = self.last_run.lock();
            if *last == Some(today) {
                return false;
            }
            // Claimed before sending: a failed run is not retried until
            // the next day.
            *last = Some(today);
        }
        self.announce_for(today).await;
        true
    }

    async fn announce_for(&self, today: NaiveDate) {
        let rows = match self
            .birthdays
            .for_date(today.month() as i64, today.day() as i64)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "failed to load today's birthdays");
                return;
            }
        };
        if rows.is_empty() {
            debug!(date = %today, "no birthdays today");
            return;
        }

        let guilds = match self.settings.guilds_with_birthday_channel().await {
            Ok(guilds) => guilds,
            Err(e) => {
                error!(error = %e, "failed to load birthday channels");
                return;
            }
        };
        let channels: HashMap<i64, i64> = guilds
            .into_iter()
            .filter_map(|g| g.birthday_channel_id.map(|c| (g.guild_id, c)))
            .collect();

        let mut announced = 0usize;
        for birthday in &rows {
            let Some(channel_id) = channels.get(&birthday.guild_id) else {
                continue;
            };
            let text = birthday_message(birthday, today);
            match self
                .client
                .send_message(*channel_id, &OutgoingMessage::text(text))
                .await
            {
                Ok(_) => announced += 1,
                Err(e) => {
                    error!(
                        guild_id = birthday.guild_id,
                        user_id = birthday.user_id,
                        error = %e,
                        "failed to send birthday announcement"
                    );
                }
            }
        }
        info!(date = %today, announced, "birthday announcements finished");
    }
}

fn birthday_message(birthday: &Birthday, today: NaiveDate) -> String {
    format!(
        "🎂 Happy birthday, <@{}>! Turning {} today 🎉",
        birthday.user_id,
        birthday.age_on(today)
    )
}

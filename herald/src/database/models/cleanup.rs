//! Scheduled channel-maintenance configuration model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Floor for configurable message retention.
pub const MIN_CLEANUP_AGE_HOURS: i64 = 12;

/// Retention rule for one channel: messages older than `max_age_hours` are
/// removed by the hourly maintenance task.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub id: i64,
    pub guild_id: i64,
    pub channel_id: i64,
    pub max_age_hours: i64,
    pub keep_pinned: bool,
    /// ISO 8601 timestamp
    pub updated_at: String,
}

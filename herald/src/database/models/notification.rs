//! Notification bookkeeping models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A sent notification message remembered for later deletion.
///
/// Rows exist only for guilds with auto-delete enabled; OfflineCleanup
/// removes them (and, best-effort, the messages) when the stream ends.
/// The separate `notification_log` audit table is append-only and never
/// read back as rows, only trimmed by age.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub id: i64,
    pub guild_id: i64,
    pub streamer_name: String,
    pub channel_id: i64,
    pub message_id: i64,
    /// ISO 8601 timestamp
    pub sent_at: String,
}

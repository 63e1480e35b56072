//! Stream-event tally models for the monthly leaderboards.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Aggregated leaderboard row. The underlying tally tables hold at most one
/// event per streamer and calendar day (per guild, and globally).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub streamer_name: String,
    pub events: i64,
}

//! Health and liveness reporting.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::models::{HealthResponse, SchedulerBeat};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

/// Uptime, live-set size and the last tick of each background loop.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    let schedulers = state
        .heartbeats
        .snapshot()
        .into_iter()
        .map(|(task, last_beat)| SchedulerBeat {
            task: task.to_string(),
            last_beat,
            seconds_ago: (now - last_beat).num_seconds(),
        })
        .collect();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        live_streams: state.tracker.len(),
        schedulers,
    })
}

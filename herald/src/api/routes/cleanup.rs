//! Channel-maintenance configuration routes, nested under a guild.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::UpsertCleanupConfigRequest;
use crate::api::server::AppState;
use crate::database::models::CleanupConfig;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{channel_id}", put(upsert).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<Json<Vec<CleanupConfig>>> {
    Ok(Json(state.cleanup_configs.list_for_guild(guild_id).await?))
}

async fn upsert(
    State(state): State<AppState>,
    Path((guild_id, channel_id)): Path<(i64, i64)>,
    Json(request): Json<UpsertCleanupConfigRequest>,
) -> ApiResult<Json<CleanupConfig>> {
    state
        .cleanup_configs
        .upsert(
            guild_id,
            channel_id,
            request.max_age_hours,
            request.keep_pinned,
        )
        .await?;
    let config = state
        .cleanup_configs
        .get(guild_id, channel_id)
        .await?
        .ok_or_else(|| ApiError::internal("cleanup config missing after upsert"))?;
    Ok(Json(config))
}

async fn remove(
    State(state): State<AppState>,
    Path((guild_id, channel_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    if state.cleanup_configs.remove(guild_id, channel_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "guild {guild_id} has no cleanup config for channel {channel_id}"
        )))
    }
}

//! Custom chat-command routes, keyed by streaming-platform channel.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CreateChatCommandRequest, UpdateChatCommandRequest};
use crate::api::server::AppState;
use crate::database::models::{ChatChannel, ChatCommand, PermissionLevel};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels", get(list_channels))
        .route(
            "/{channel}/commands",
            get(list_commands).post(create_command),
        )
        .route(
            "/{channel}/commands/{name}",
            axum::routing::put(update_command).delete(delete_command),
        )
}

/// Every guild-to-channel relay mapping.
async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<Vec<ChatChannel>>> {
    Ok(Json(state.chat.channels().await?))
}

async fn list_commands(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> ApiResult<Json<Vec<ChatCommand>>> {
    Ok(Json(state.chat.commands(&channel).await?))
}

async fn create_command(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(request): Json<CreateChatCommandRequest>,
) -> ApiResult<(StatusCode, Json<ChatCommand>)> {
    let command = state
        .chat
        .set_command(
            &channel,
            &request.name,
            &request.response,
            request.permission.unwrap_or(PermissionLevel::Everyone),
            request.cooldown_seconds.unwrap_or(0),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(command)))
}

async fn update_command(
    State(state): State<AppState>,
    Path((channel, name)): Path<(String, String)>,
    Json(request): Json<UpdateChatCommandRequest>,
) -> ApiResult<Json<ChatCommand>> {
    let command = state
        .chat
        .set_command(
            &channel,
            &name,
            &request.response,
            request.permission.unwrap_or(PermissionLevel::Everyone),
            request.cooldown_seconds.unwrap_or(0),
        )
        .await?;
    Ok(Json(command))
}

async fn delete_command(
    State(state): State<AppState>,
    Path((channel, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    if state.chat.remove_command(&channel, &name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "channel {channel} has no command named {name}"
        )))
    }
}

//! Guild-scoped routes: settings, subscriptions, live view, leaderboards,
//! chat-channel mapping and teardown.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    ChannelMappingResponse, CreateSubscriptionRequest, ImportRequest, JoinChannelRequest,
    SettingsResponse, TestNotificationRequest, TestNotificationResponse, UpdateSettingsRequest,
    UpdateSettingsResponse,
};
use crate::api::server::AppState;
use crate::database::models::{LeaderboardRow, Subscription};
use crate::guilds::ImportReport;
use helix_api::StreamRecord;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{guild_id}/settings",
            get(get_settings).put(update_settings),
        )
        .route(
            "/{guild_id}/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/{guild_id}/subscriptions/import", post(import_subscriptions))
        .route("/{guild_id}/subscriptions/{name}", delete(delete_subscription))
        .route("/{guild_id}/live", get(currently_live))
        .route("/{guild_id}/leaderboard", get(guild_leaderboard))
        .route("/{guild_id}/test-notification", post(test_notification))
        .route(
            "/{guild_id}/chat-channel",
            put(join_chat_channel).delete(leave_chat_channel),
        )
        .route("/{guild_id}", delete(teardown_guild))
}

async fn get_settings(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<Json<SettingsResponse>> {
    let settings = state.guilds.guild_settings(guild_id).await?;
    Ok(Json(settings.into()))
}

/// Applies only the fields present in the request body.
async fn update_settings(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<UpdateSettingsResponse>> {
    let mut repointed = 0;
    if let Some(channel_id) = request.notification_channel_id {
        repointed = state.guilds.set_default_channel(guild_id, channel_id).await?;
    }
    if let Some(color) = &request.accent_color {
        if color.eq_ignore_ascii_case("default") {
            state.guilds.reset_accent_color(guild_id).await?;
        } else {
            state.guilds.set_accent_color(guild_id, color).await?;
        }
    }
    if let Some(enabled) = request.auto_delete_notifications {
        state.guilds.set_auto_delete(guild_id, enabled).await?;
    }
    if let Some(channel_id) = request.birthday_channel_id {
        state.guilds.set_birthday_channel(guild_id, channel_id).await?;
    }

    let settings = state.guilds.guild_settings(guild_id).await?;
    Ok(Json(UpdateSettingsResponse {
        repointed_subscriptions: repointed,
        settings: settings.into(),
    }))
}

async fn list_subscriptions(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<Json<Vec<Subscription>>> {
    Ok(Json(state.guilds.list_streamers(guild_id).await?))
}

async fn create_subscription(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    let subscription = state
        .guilds
        .add_streamer(guild_id, &request.name, request.channel_id)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn delete_subscription(
    State(state): State<AppState>,
    Path((guild_id, name)): Path<(i64, String)>,
) -> ApiResult<StatusCode> {
    if state.guilds.remove_streamer(guild_id, &name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "guild {guild_id} has no subscription for {name}"
        )))
    }
}

async fn import_subscriptions(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportReport>> {
    let report = state.guilds.import_streamers(guild_id, &request.text).await?;
    Ok(Json(report))
}

async fn currently_live(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<Json<Vec<StreamRecord>>> {
    Ok(Json(state.guilds.currently_live(guild_id).await?))
}

async fn guild_leaderboard(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<Json<Vec<LeaderboardRow>>> {
    Ok(Json(state.guilds.monthly_leaderboard(guild_id).await?))
}

/// Mounted at `/api/leaderboard`, outside the guild scope.
pub async fn global_leaderboard(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<LeaderboardRow>>> {
    Ok(Json(state.guilds.global_monthly_leaderboard().await?))
}

async fn test_notification(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
    Json(request): Json<TestNotificationRequest>,
) -> ApiResult<Json<TestNotificationResponse>> {
    let delivered = state
        .guilds
        .send_test_notification(guild_id, &request.name)
        .await?;
    Ok(Json(TestNotificationResponse { delivered }))
}

async fn join_chat_channel(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
    Json(request): Json<JoinChannelRequest>,
) -> ApiResult<Json<ChannelMappingResponse>> {
    let channel = state.chat.join_channel(guild_id, &request.channel).await?;
    Ok(Json(ChannelMappingResponse { guild_id, channel }))
}

async fn leave_chat_channel(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<StatusCode> {
    match state.chat.leave_channel(guild_id).await? {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::not_found(format!(
            "guild {guild_id} has no chat channel mapping"
        ))),
    }
}

/// Drops every row the guild owns, across all features.
async fn teardown_guild(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.chat.guild_teardown(guild_id).await?;
    state.roles.guild_teardown(guild_id).await?;
    state.guilds.guild_teardown(guild_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

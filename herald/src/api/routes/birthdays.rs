//! Birthday registry routes, nested under a guild.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::SetBirthdayRequest;
use crate::api::server::AppState;
use crate::database::models::{Birthday, validate_birthdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{user_id}", put(set).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<Json<Vec<Birthday>>> {
    Ok(Json(state.birthdays.list_for_guild(guild_id).await?))
}

async fn set(
    State(state): State<AppState>,
    Path((guild_id, user_id)): Path<(i64, i64)>,
    Json(request): Json<SetBirthdayRequest>,
) -> ApiResult<StatusCode> {
    let today = Utc::now().date_naive();
    if validate_birthdate(request.day, request.month, request.year, today).is_none() {
        return Err(ApiError::validation(format!(
            "{:04}-{:02}-{:02} is not a plausible birthdate",
            request.year, request.month, request.day
        )));
    }
    state
        .birthdays
        .set(
            guild_id,
            user_id,
            i64::from(request.day),
            i64::from(request.month),
            i64::from(request.year),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove(
    State(state): State<AppState>,
    Path((guild_id, user_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    if state.birthdays.remove(guild_id, user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "no birthday stored for user {user_id} in guild {guild_id}"
        )))
    }
}

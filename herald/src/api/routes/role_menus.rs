//! Role-menu routes, nested under a guild.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CreateRoleMenuRequest, RoleMenuResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{menu_id}", get(get_menu).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ApiResult<Json<Vec<RoleMenuResponse>>> {
    let menus = state.roles.menus_for_guild(guild_id).await?;
    let menus = menus
        .into_iter()
        .map(RoleMenuResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(menus))
}

async fn create(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
    Json(request): Json<CreateRoleMenuRequest>,
) -> ApiResult<(StatusCode, Json<RoleMenuResponse>)> {
    let menu = state
        .roles
        .create_menu(
            guild_id,
            request.channel_id,
            &request.title,
            request.style,
            request.only_add,
            request.max_roles,
            &request.entries,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(menu.try_into()?)))
}

async fn get_menu(
    State(state): State<AppState>,
    Path((guild_id, menu_id)): Path<(i64, i64)>,
) -> ApiResult<Json<RoleMenuResponse>> {
    let menu = state.roles.menu(menu_id).await?;
    if menu.guild_id != guild_id {
        return Err(ApiError::not_found(format!(
            "guild {guild_id} has no role menu {menu_id}"
        )));
    }
    Ok(Json(menu.try_into()?))
}

async fn remove(
    State(state): State<AppState>,
    Path((guild_id, menu_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let menu = state.roles.menu(menu_id).await?;
    if menu.guild_id != guild_id {
        return Err(ApiError::not_found(format!(
            "guild {guild_id} has no role menu {menu_id}"
        )));
    }
    state.roles.delete_menu(menu_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

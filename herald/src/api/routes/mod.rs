//! Route modules, one per resource area.

pub mod birthdays;
pub mod chat;
pub mod cleanup;
pub mod guilds;
pub mod health;
pub mod role_menus;

use axum::Router;
use axum::routing::get;

use crate::api::server::AppState;

/// Assemble the full route tree and attach the shared state.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/health", health::router())
        .nest("/api/guilds", guilds::router())
        .nest("/api/guilds/{guild_id}/birthdays", birthdays::router())
        .nest("/api/guilds/{guild_id}/role-menus", role_menus::router())
        .nest(
            "/api/guilds/{guild_id}/cleanup-configs",
            cleanup::router(),
        )
        .nest("/api/chat", chat::router())
        .route("/api/leaderboard", get(guilds::global_leaderboard))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use helix_api::{StreamRecord, UserRecord};
    use sqlx::SqlitePool;
    use tower::ServiceExt;

    use crate::chat::{ChatService, relay_channel};
    use crate::database::repositories::{
        SqlxBirthdayRepository, SqlxChatRepository, SqlxCleanupConfigRepository,
        SqlxGuildSettingsRepository, SqlxNotificationRepository, SqlxRoleMenuRepository,
        SqlxStreamEventRepository, SqlxSubscriptionRepository,
    };
    use crate::database::run_migrations;
    use crate::discord::testing::RecordingClient;
    use crate::guilds::{GuildConfigService, StreamerLookup};
    use crate::heartbeat::Heartbeats;
    use crate::monitor::LiveStateTracker;
    use crate::notification::NotificationDispatcher;
    use crate::roles::RoleMenuService;
    use crate::Result;

    struct KnownStreamers(HashSet<String>);

    #[async_trait]
    impl StreamerLookup for KnownStreamers {
        async fn find_user(&self, login: &str) -> Result<Option<UserRecord>> {
            Ok(self.0.contains(login).then(|| UserRecord {
                id: "1".to_string(),
                login: login.to_string(),
                display_name: login.to_string(),
                profile_image_url: String::new(),
            }))
        }

        async fn live_now(&self, _names: &[String]) -> Result<Vec<StreamRecord>> {
            Ok(Vec::new())
        }
    }

    async fn test_router(known: &[&str]) -> Router {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let subscriptions = Arc::new(SqlxSubscriptionRepository::new(pool.clone()));
        let settings = Arc::new(SqlxGuildSettingsRepository::new(pool.clone(), pool.clone()));
        let events = Arc::new(SqlxStreamEventRepository::new(pool.clone()));
        let notifications = Arc::new(SqlxNotificationRepository::new(pool.clone()));
        let cleanup_configs = Arc::new(SqlxCleanupConfigRepository::new(pool.clone()));
        let birthdays = Arc::new(SqlxBirthdayRepository::new(pool.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(RecordingClient::new()),
            settings.clone(),
            notifications.clone(),
        ));
        let tracker = Arc::new(LiveStateTracker::new());
        let lookup = Arc::new(KnownStreamers(
            known.iter().map(|n| n.to_string()).collect(),
        ));

        let guilds = Arc::new(GuildConfigService::new(
            lookup,
            subscriptions,
            settings,
            events,
            notifications,
            cleanup_configs.clone(),
            birthdays.clone(),
            dispatcher,
            tracker.clone(),
        ));
        let (relay, _rx) = relay_channel();
        let chat_service = Arc::new(ChatService::new(
            Arc::new(SqlxChatRepository::new(pool.clone())),
            relay,
        ));
        let roles = Arc::new(RoleMenuService::new(Arc::new(SqlxRoleMenuRepository::new(
            pool.clone(),
        ))));

        create_router(crate::api::server::AppState::new(
            guilds,
            chat_service,
            roles,
            birthdays,
            cleanup_configs,
            tracker,
            Arc::new(Heartbeats::new()),
        ))
    }

    fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_version_and_empty_live_set() {
        let router = test_router(&[]).await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["live_streams"], 0);
    }

    #[tokio::test]
    async fn settings_update_round_trips_through_the_api() {
        let router = test_router(&[]).await;
        let response = router
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/api/guilds/9/settings",
                r#"{"notification_channel_id": 500, "accent_color": "00FF00"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["repointed_subscriptions"], 0);
        assert_eq!(body["accent_color"], "#00FF00");

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/guilds/9/settings")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["notification_channel_id"], 500);
        assert_eq!(body["accent_color"], "#00FF00");
    }

    #[tokio::test]
    async fn duplicate_subscription_maps_to_conflict() {
        let router = test_router(&["pixel"]).await;
        let request = || {
            json_request(
                Method::POST,
                "/api/guilds/9/subscriptions",
                r#"{"name": "pixel", "channel_id": 42}"#,
            )
        };

        let created = router.clone().oneshot(request()).await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let body = body_json(created).await;
        assert_eq!(body["streamer_name"], "pixel");

        let duplicate = router.oneshot(request()).await.unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        let body = body_json(duplicate).await;
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn unknown_streamer_maps_to_not_found() {
        let router = test_router(&[]).await;
        let response = router
            .oneshot(json_request(
                Method::POST,
                "/api/guilds/9/subscriptions",
                r#"{"name": "ghost", "channel_id": 42}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn implausible_birthdate_maps_to_validation_error() {
        let router = test_router(&[]).await;
        let response = router
            .oneshot(json_request(
                Method::PUT,
                "/api/guilds/9/birthdays/77",
                r#"{"day": 30, "month": 2, "year": 1990}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn birthday_round_trip_and_delete() {
        let router = test_router(&[]).await;
        let set = router
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/api/guilds/9/birthdays/77",
                r#"{"day": 29, "month": 2, "year": 1992}"#,
            ))
            .await
            .unwrap();
        assert_eq!(set.status(), StatusCode::NO_CONTENT);

        let listed = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/guilds/9/birthdays")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(listed).await;
        assert_eq!(body[0]["user_id"], 77);
        assert_eq!(body[0]["month"], 2);

        let removed = router
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/guilds/9/birthdays/77")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn chat_command_crud_over_http() {
        let router = test_router(&[]).await;
        let created = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/chat/pixel/commands",
                r#"{"name": "!Discord", "response": "join us", "cooldown_seconds": 5}"#,
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let body = body_json(created).await;
        assert_eq!(body["name"], "discord");
        assert_eq!(body["cooldown_seconds"], 5);

        let cleared = router
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/chat/pixel/commands/discord")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(cleared.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn role_menu_create_rejects_too_many_picks() {
        let router = test_router(&[]).await;
        let response = router
            .oneshot(json_request(
                Method::POST,
                "/api/guilds/9/role-menus",
                r#"{
                    "channel_id": 3,
                    "title": "Colors",
                    "style": "dropdown",
                    "max_roles": 5,
                    "entries": [{"role_id": 1, "label": "red"}]
                }"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn cleanup_config_upsert_enforces_floor() {
        let router = test_router(&[]).await;
        let rejected = router
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/api/guilds/9/cleanup-configs/31",
                r#"{"max_age_hours": 2}"#,
            ))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let accepted = router
            .oneshot(json_request(
                Method::PUT,
                "/api/guilds/9/cleanup-configs/31",
                r#"{"max_age_hours": 48}"#,
            ))
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
        let body = body_json(accepted).await;
        assert_eq!(body["max_age_hours"], 48);
        assert_eq!(body["keep_pinned"], true);
    }

    #[tokio::test]
    async fn teardown_clears_chat_mapping_and_subscriptions() {
        let router = test_router(&["pixel"]).await;
        let subscribe = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/guilds/9/subscriptions",
                r#"{"name": "pixel", "channel_id": 42}"#,
            ))
            .await
            .unwrap();
        assert_eq!(subscribe.status(), StatusCode::CREATED);

        let join = router
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/api/guilds/9/chat-channel",
                r#"{"channel": "pixel"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(join.status(), StatusCode::OK);

        let teardown = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/guilds/9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(teardown.status(), StatusCode::NO_CONTENT);

        let subs = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/guilds/9/subscriptions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(subs).await;
        assert_eq!(body.as_array().unwrap().len(), 0);

        let channels = router
            .oneshot(
                Request::builder()
                    .uri("/api/chat/channels")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(channels).await;
        assert_eq!(body.as_array().unwrap().len(), 0);
    }
}

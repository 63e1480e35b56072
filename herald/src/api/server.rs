//! Admin API server: configuration, shared handler state and the axum
//! serve loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::middleware::{self, BearerAuth};
use crate::api::routes;
use crate::chat::ChatService;
use crate::database::repositories::{BirthdayRepository, CleanupConfigRepository};
use crate::guilds::GuildConfigService;
use crate::heartbeat::Heartbeats;
use crate::monitor::LiveStateTracker;
use crate::roles::RoleMenuService;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Static bearer token; `None` leaves the API unauthenticated.
    pub auth_token: Option<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8600,
            enable_cors: true,
            auth_token: None,
        }
    }
}

impl ApiServerConfig {
    /// Read `API_BIND_ADDRESS`, `API_PORT` and `API_TOKEN`, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Ok(address) = std::env::var("API_BIND_ADDRESS")
            && !address.trim().is_empty()
        {
            config.bind_address = address;
        }
        if let Ok(port) = std::env::var("API_PORT")
            && let Ok(parsed) = port.parse()
        {
            config.port = parsed;
        }
        if let Ok(token) = std::env::var("API_TOKEN")
            && !token.trim().is_empty()
        {
            config.auth_token = Some(token);
        }
        config
    }
}

/// Everything the route handlers share.
#[derive(Clone)]
pub struct AppState {
    /// Process start, for uptime reporting.
    pub start_time: Instant,
    pub guilds: Arc<GuildConfigService>,
    pub chat: Arc<ChatService>,
    pub roles: Arc<RoleMenuService>,
    pub birthdays: Arc<dyn BirthdayRepository>,
    pub cleanup_configs: Arc<dyn CleanupConfigRepository>,
    pub tracker: Arc<LiveStateTracker>,
    pub heartbeats: Arc<Heartbeats>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        guilds: Arc<GuildConfigService>,
        chat: Arc<ChatService>,
        roles: Arc<RoleMenuService>,
        birthdays: Arc<dyn BirthdayRepository>,
        cleanup_configs: Arc<dyn CleanupConfigRepository>,
        tracker: Arc<LiveStateTracker>,
        heartbeats: Arc<Heartbeats>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            guilds,
            chat,
            roles,
            birthdays,
            cleanup_configs,
            tracker,
            heartbeats,
        }
    }
}

pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if let Some(token) = &self.config.auth_token {
            router = router.layer(axum::middleware::from_fn_with_state(
                BearerAuth::new(token.clone()),
                middleware::require_bearer,
            ));
        }

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("invalid API bind address: {e}")))?;

        let listener = TcpListener::bind(addr).await?;
        info!("admin API listening on http://{addr}");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("admin API shutting down");
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_open_and_permissive() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8600);
        assert!(config.enable_cors);
        assert!(config.auth_token.is_none());
    }
}

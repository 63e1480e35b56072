use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use helix_api::HelixClient;
use herald::api::{ApiServer, ApiServerConfig, AppState};
use herald::birthday::BirthdayService;
use herald::chat::{ChatRelay, ChatService, CommandEngine, relay_channel};
use herald::cleanup::{ChannelMaintenance, OfflineCleanup};
use herald::config::AppConfig;
use herald::database::repositories::{
    BirthdayRepository, ChatRepository, CleanupConfigRepository, GuildSettingsRepository,
    NotificationRepository, RoleMenuRepository, SqlxBirthdayRepository, SqlxChatRepository,
    SqlxCleanupConfigRepository, SqlxGuildSettingsRepository, SqlxNotificationRepository,
    SqlxRoleMenuRepository, SqlxStreamEventRepository, SqlxSubscriptionRepository,
    StreamEventRepository, SubscriptionRepository,
};
use herald::discord::{DiscordRestClient, MessagingClient, UserIdentity};
use herald::guilds::GuildConfigService;
use herald::heartbeat::Heartbeats;
use herald::monitor::{LiveStateTracker, PollerConfig, StreamPoller};
use herald::notification::{NotificationDispatcher, OperatorAlerter};
use herald::roles::RoleMenuService;
use herald::{database, logging, panic_hook, utils};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let (logging, _log_guard) = logging::init_logging(&config.log_dir)?;
    panic_hook::install(&config.log_dir);
    utils::install_rustls_provider();

    info!(version = env!("CARGO_PKG_VERSION"), "herald starting");

    let pool = database::init_pool(&config.database_url).await?;
    let write_pool = database::init_write_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let subscriptions: Arc<dyn SubscriptionRepository> =
        Arc::new(SqlxSubscriptionRepository::new(pool.clone()));
    let settings: Arc<dyn GuildSettingsRepository> =
        Arc::new(SqlxGuildSettingsRepository::new(pool.clone(), write_pool));
    let events: Arc<dyn StreamEventRepository> =
        Arc::new(SqlxStreamEventRepository::new(pool.clone()));
    let notifications: Arc<dyn NotificationRepository> =
        Arc::new(SqlxNotificationRepository::new(pool.clone()));
    let cleanup_configs: Arc<dyn CleanupConfigRepository> =
        Arc::new(SqlxCleanupConfigRepository::new(pool.clone()));
    let birthdays: Arc<dyn BirthdayRepository> =
        Arc::new(SqlxBirthdayRepository::new(pool.clone()));
    let chat_repo: Arc<dyn ChatRepository> = Arc::new(SqlxChatRepository::new(pool.clone()));
    let menus: Arc<dyn RoleMenuRepository> = Arc::new(SqlxRoleMenuRepository::new(pool.clone()));

    let discord: Arc<dyn MessagingClient> =
        Arc::new(DiscordRestClient::new(config.discord_token.clone()));
    let helix = Arc::new(HelixClient::new(
        config.twitch_client_id.clone(),
        config.twitch_client_secret.clone(),
    ));

    if config.operator_user_id.is_none() {
        warn!("OPERATOR_USER_ID not set, operator alerts are disabled");
    }
    let alerter = Arc::new(OperatorAlerter::new(
        discord.clone(),
        config.operator_user_id,
    ));

    let tracker = Arc::new(LiveStateTracker::new());
    let heartbeats = Arc::new(Heartbeats::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        discord.clone(),
        settings.clone(),
        notifications.clone(),
    ));

    let cancel = CancellationToken::new();
    spawn_signal_watcher(cancel.clone());
    logging.start_retention_cleanup(cancel.clone());

    let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

    // Chat relay comes up with the process when credentials are present;
    // the handle keeps working either way so services need no special case.
    let (relay_handle, relay_rx) = relay_channel();
    match config.chat.clone() {
        Some(credentials) => {
            let engine = Arc::new(CommandEngine::new(chat_repo.clone(), helix.clone()));
            let relay = ChatRelay::new(credentials, chat_repo.clone(), engine, relay_rx);
            let shutdown = cancel.clone();
            tasks.push(("chat-relay", tokio::spawn(relay.run(shutdown))));
        }
        None => {
            info!("CHAT_BOT_LOGIN not set, chat relay is disabled");
            drop(relay_rx);
        }
    }

    let guilds = Arc::new(GuildConfigService::new(
        helix.clone(),
        subscriptions.clone(),
        settings.clone(),
        events.clone(),
        notifications.clone(),
        cleanup_configs.clone(),
        birthdays.clone(),
        dispatcher.clone(),
        tracker.clone(),
    ));
    let chat_service = Arc::new(ChatService::new(chat_repo.clone(), relay_handle));
    let roles = Arc::new(RoleMenuService::new(menus));

    let api = ApiServer::new(
        ApiServerConfig::from_env_or_default(),
        AppState::new(
            guilds,
            chat_service,
            roles,
            birthdays.clone(),
            cleanup_configs.clone(),
            tracker.clone(),
            heartbeats.clone(),
        ),
    );
    {
        let shutdown = cancel.clone();
        tasks.push((
            "admin-api",
            tokio::spawn(async move {
                if let Err(e) = api.run(shutdown).await {
                    error!(error = %e, "admin API server failed");
                }
            }),
        ));
    }

    // Schedulers stay parked until the messaging platform answers the
    // identity probe.
    match wait_for_identity(discord.as_ref(), &cancel).await {
        Some(identity) => {
            info!(
                bot = %identity.username,
                "messaging platform connection validated, starting schedulers"
            );

            let poller = StreamPoller::with_config(
                helix.clone(),
                subscriptions.clone(),
                events.clone(),
                dispatcher.clone(),
                Arc::new(OfflineCleanup::new(
                    discord.clone(),
                    subscriptions.clone(),
                    settings.clone(),
                    notifications.clone(),
                )),
                alerter.clone(),
                tracker.clone(),
                PollerConfig {
                    interval: config.check_interval,
                    ..PollerConfig::default()
                },
            )
            .with_heartbeats(heartbeats.clone());
            let shutdown = cancel.clone();
            tasks.push((
                "poll",
                tokio::spawn(async move { poller.run(shutdown).await }),
            ));

            let maintenance = ChannelMaintenance::new(
                discord.clone(),
                cleanup_configs.clone(),
                notifications.clone(),
                alerter.clone(),
            )
            .with_heartbeats(heartbeats.clone());
            let shutdown = cancel.clone();
            tasks.push((
                "channel-maintenance",
                tokio::spawn(async move { maintenance.run(shutdown).await }),
            ));

            let birthday_service =
                BirthdayService::new(discord.clone(), birthdays.clone(), settings.clone())
                    .with_heartbeats(heartbeats.clone());
            let shutdown = cancel.clone();
            tasks.push((
                "birthdays",
                tokio::spawn(async move { birthday_service.run(shutdown).await }),
            ));
        }
        None => info!("shutdown requested before the identity probe succeeded"),
    }

    cancel.cancelled().await;
    info!("waiting for background tasks to finish");
    for (name, task) in tasks {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "background task panicked");
        }
    }
    info!("herald stopped");
    Ok(())
}

/// Retry the identity probe with capped backoff until it succeeds or
/// shutdown is requested.
async fn wait_for_identity(
    client: &dyn MessagingClient,
    cancel: &CancellationToken,
) -> Option<UserIdentity> {
    let mut delay = Duration::from_secs(5);
    loop {
        match client.current_user().await {
            Ok(identity) => return Some(identity),
            Err(e) => {
                warn!(error = %e, retry_in_secs = delay.as_secs(), "identity probe failed")
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(Duration::from_secs(60));
    }
}

fn spawn_signal_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received Ctrl+C, shutting down"),
            _ = terminate => info!("received SIGTERM, shutting down"),
        }
        cancel.cancel();
    });
}

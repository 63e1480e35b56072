//! Chat-relay connection supervisor.
//!
//! Owns the connection to the chat service: joins every mapped channel,
//! feeds incoming lines through the command engine and reconnects with
//! jittered exponential backoff when the connection drops.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::RngExt;
use tmi_client::{TmiConnection, TmiError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::CommandEngine;
use crate::config::ChatConfig;
use crate::database::repositories::ChatRepository;
use crate::{Error, Result};

/// First reconnect delay.
const INITIAL_BACKOFF_SECS: u64 = 2;
/// Reconnect delay ceiling.
const MAX_BACKOFF_SECS: u64 = 300;
/// A session that lived at least this long resets the backoff.
const BACKOFF_RESET_AFTER: Duration = Duration::from_secs(60);

/// Instructions other parts of the application send a running relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    Join(String),
    Part(String),
}

/// Cloneable handle for queueing relay instructions.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayHandle {
    /// Ask the relay to join a channel. A no-op when the relay is not
    /// running; it joins from the database on its next connect.
    pub fn join(&self, channel: &str) {
        if self
            .tx
            .send(RelayCommand::Join(channel.to_string()))
            .is_err()
        {
            debug!(channel, "relay not running, dropping join");
        }
    }

    /// Ask the relay to part a channel.
    pub fn part(&self, channel: &str) {
        if self
            .tx
            .send(RelayCommand::Part(channel.to_string()))
            .is_err()
        {
            debug!(channel, "relay not running, dropping part");
        }
    }
}

/// Build the handle/receiver pair wiring services to the relay.
pub fn relay_channel() -> (RelayHandle, mpsc::UnboundedReceiver<RelayCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelayHandle { tx }, rx)
}

/// Backoff delay with up to 25% random jitter added.
fn jittered(secs: u64) -> Duration {
    let jitter = rand::rng().random_range(0..=secs / 4);
    Duration::from_secs(secs + jitter)
}

/// Supervises one chat connection for the whole process.
pub struct ChatRelay {
    credentials: ChatConfig,
    chat: Arc<dyn ChatRepository>,
    engine: Arc<CommandEngine>,
    commands: mpsc::UnboundedReceiver<RelayCommand>,
}

impl ChatRelay {
    pub fn new(
        credentials: ChatConfig,
        chat: Arc<dyn ChatRepository>,
        engine: Arc<CommandEngine>,
        commands: mpsc::UnboundedReceiver<RelayCommand>,
    ) -> Self {
        Self {
            credentials,
            chat,
            engine,
            commands,
        }
    }

    /// Connection loop. Returns once `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut backoff = INITIAL_BACKOFF_SECS;
        loop {
            let started = Instant::now();
            match self.session(&shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    if shutdown.is_cancelled() {
                        break;
                    }
                    if started.elapsed() >= BACKOFF_RESET_AFTER {
                        backoff = INITIAL_BACKOFF_SECS;
                    }
                    let delay = jittered(backoff);
                    warn!(
                        error = %e,
                        delay_secs = delay.as_secs(),
                        "chat connection lost, reconnecting"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                }
            }
        }
        info!("chat relay stopped");
    }

    /// One connection lifetime. `Ok` is a clean shutdown; any `Err` asks
    /// the caller to reconnect.
    async fn session(&mut self, shutdown: &CancellationToken) -> Result<()> {
        let mut conn =
            TmiConnection::connect(&self.credentials.login, &self.credentials.token).await?;

        // Several guilds can map to the same channel; join each once.
        let mut joined = HashSet::new();
        for mapping in self.chat.list_chat_channels().await? {
            if joined.insert(mapping.channel.clone()) {
                conn.join(&mapping.channel).await?;
            }
        }
        info!(channels = joined.len(), "chat relay connected");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    let _ = conn.close().await;
                    return Ok(());
                }
                command = self.commands.recv() => match command {
                    Some(RelayCommand::Join(channel)) => {
                        info!(channel, "joining chat channel");
                        conn.join(&channel).await?;
                    }
                    Some(RelayCommand::Part(channel)) => {
                        info!(channel, "parting chat channel");
                        conn.part(&channel).await?;
                    }
                    None => {
                        let _ = conn.close().await;
                        return Ok(());
                    }
                },
                message = conn.next_chat_message() => match message {
                    Ok(Some(message)) => {
                        if let Some(reply) = self.engine.respond(&message).await
                            && let Err(e) = conn.send_message(&message.channel, &reply).await
                        {
                            warn!(channel = %message.channel, error = %e, "reply delivery failed");
                        }
                    }
                    Ok(None) => {
                        return Err(Error::Chat(TmiError::connection("server closed the stream")));
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }
    }
}

//! Command engine for the chat relay.
//!
//! Turns incoming chat lines into replies: a handful of built-ins
//! (`!uptime`, `!game`, `!title`, `!viewers`, `!commands`, `!so`) plus
//! the per-channel custom commands stored in the database.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use helix_api::{ChannelInfo, HelixClient, LastStreamInfo};
use tmi_client::ChatMessage;
use tracing::{debug, warn};

use crate::Result;
use crate::database::models::PermissionLevel;
use crate::database::repositories::ChatRepository;
use crate::notification::embeds::format_viewer_count;

/// Per-channel cooldown for the `!uptime` built-in.
pub const UPTIME_COOLDOWN: Duration = Duration::from_secs(30);
/// Per-channel cooldown for the `!viewers` built-in.
pub const VIEWERS_COOLDOWN: Duration = Duration::from_secs(60);

/// Stream metadata lookups the built-in commands need.
#[async_trait]
pub trait ChannelInfoSource: Send + Sync {
    /// Formatted uptime of a live channel, `None` when offline.
    async fn uptime(&self, login: &str) -> Result<Option<String>>;
    /// Current game and title, `None` when the channel does not exist.
    async fn channel_info(&self, login: &str) -> Result<Option<ChannelInfo>>;
    /// Live viewer count, `None` when offline.
    async fn viewer_count(&self, login: &str) -> Result<Option<u64>>;
    /// Last-stream summary for shoutouts.
    async fn last_stream(&self, login: &str) -> Result<Option<LastStreamInfo>>;
}

#[async_trait]
impl ChannelInfoSource for HelixClient {
    async fn uptime(&self, login: &str) -> Result<Option<String>> {
        Ok(self.get_stream_uptime(login).await?)
    }

    async fn channel_info(&self, login: &str) -> Result<Option<ChannelInfo>> {
        let Some(user) = self.get_user(login).await? else {
            return Ok(None);
        };
        Ok(self.get_channel_info(&user.id).await?)
    }

    async fn viewer_count(&self, login: &str) -> Result<Option<u64>> {
        Ok(self.get_viewer_count(login).await?)
    }

    async fn last_stream(&self, login: &str) -> Result<Option<LastStreamInfo>> {
        Ok(self.get_last_stream_info(login).await?)
    }
}

/// Lowercase a command name and strip the leading `!` if present.
pub fn normalize_command_name(raw: &str) -> String {
    raw.trim().trim_start_matches('!').to_lowercase()
}

/// Fill `$user`, `$channel` and `$count` in a custom-command response.
fn substitute_placeholders(template: &str, message: &ChatMessage, use_count: i64) -> String {
    template
        .replace("$user", &message.display_name)
        .replace("$channel", &message.channel)
        .replace("$count", &use_count.to_string())
}

/// Ladder position of the sender, derived from badge flags.
fn sender_level(message: &ChatMessage) -> PermissionLevel {
    if message.is_broadcaster {
        PermissionLevel::Broadcaster
    } else if message.is_moderator {
        PermissionLevel::Moderator
    } else if message.is_subscriber {
        PermissionLevel::Subscriber
    } else {
        PermissionLevel::Everyone
    }
}

/// Shoutout line for `!so`, enriched with whatever last-stream data the
/// platform returned.
fn shoutout_text(info: &LastStreamInfo) -> String {
    let mut text = format!(
        "Check out {} over at https://twitch.tv/{} !",
        info.display_name, info.login
    );
    match (&info.game_name, info.last_streamed_at) {
        (Some(game), Some(at)) => {
            text.push_str(&format!(
                " They last streamed {} on {}.",
                game,
                at.format("%b %d")
            ));
        }
        (Some(game), None) => {
            text.push_str(&format!(" They were last seen playing {game}."));
        }
        (None, Some(at)) => {
            text.push_str(&format!(" They last streamed on {}.", at.format("%b %d")));
        }
        (None, None) => {}
    }
    text
}

/// Resolves chat lines to command replies.
///
/// Lookup failures are logged and produce no reply; the relay never
/// surfaces errors into chat.
pub struct CommandEngine {
    chat: Arc<dyn ChatRepository>,
    lookup: Arc<dyn ChannelInfoSource>,
    /// Last firing per (channel, command).
    cooldowns: DashMap<(String, String), Instant>,
}

impl CommandEngine {
    pub fn new(chat: Arc<dyn ChatRepository>, lookup: Arc<dyn ChannelInfoSource>) -> Self {
        Self {
            chat,
            lookup,
            cooldowns: DashMap::new(),
        }
    }

    /// Reply for a chat line, if it invokes a command the sender may run
    /// and that is off cooldown.
    pub async fn respond(&self, message: &ChatMessage) -> Option<String> {
        let rest = message.text.trim().strip_prefix('!')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next()?.to_lowercase();
        if name.is_empty() {
            return None;
        }
        let arg = parts.next().unwrap_or("").trim();

        match name.as_str() {
            "uptime" => self.builtin_uptime(message).await,
            "game" => self.builtin_game(message).await,
            "title" => self.builtin_title(message).await,
            "viewers" => self.builtin_viewers(message).await,
            "commands" => self.builtin_commands(message).await,
            "so" => self.builtin_shoutout(message, arg).await,
            _ => self.custom(message, &name).await,
        }
    }

    /// True when (channel, name) fired within `cooldown`; records the
    /// firing otherwise.
    fn on_cooldown(&self, channel: &str, name: &str, cooldown: Duration) -> bool {
        if cooldown.is_zero() {
            return false;
        }
        let now = Instant::now();
        match self.cooldowns.entry((channel.to_string(), name.to_string())) {
            dashmap::Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < cooldown {
                    true
                } else {
                    entry.insert(now);
                    false
                }
            }
            dashmap::Entry::Vacant(entry) => {
                entry.insert(now);
                false
            }
        }
    }

    async fn builtin_uptime(&self, message: &ChatMessage) -> Option<String> {
        if self.on_cooldown(&message.channel, "uptime", UPTIME_COOLDOWN) {
            return None;
        }
        match self.lookup.uptime(&message.channel).await {
            Ok(Some(uptime)) => Some(format!("{} has been live for {uptime}.", message.channel)),
            Ok(None) => Some(format!("{} is offline.", message.channel)),
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "uptime lookup failed");
                None
            }
        }
    }

    async fn builtin_game(&self, message: &ChatMessage) -> Option<String> {
        match self.lookup.channel_info(&message.channel).await {
            Ok(Some(info)) if !info.game_name.is_empty() => {
                Some(format!("Current game: {}.", info.game_name))
            }
            Ok(Some(_)) => Some("No game set.".to_string()),
            Ok(None) => Some(format!("No channel named {}.", message.channel)),
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "game lookup failed");
                None
            }
        }
    }

    async fn builtin_title(&self, message: &ChatMessage) -> Option<String> {
        match self.lookup.channel_info(&message.channel).await {
            Ok(Some(info)) if !info.title.is_empty() => {
                Some(format!("Current title: {}", info.title))
            }
            Ok(Some(_)) => Some("No title set.".to_string()),
            Ok(None) => Some(format!("No channel named {}.", message.channel)),
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "title lookup failed");
                None
            }
        }
    }

    async fn builtin_viewers(&self, message: &ChatMessage) -> Option<String> {
        if self.on_cooldown(&message.channel, "viewers", VIEWERS_COOLDOWN) {
            return None;
        }
        match self.lookup.viewer_count(&message.channel).await {
            Ok(Some(count)) => Some(format!(
                "{} viewers watching {}.",
                format_viewer_count(count),
                message.channel
            )),
            Ok(None) => Some(format!("{} is offline.", message.channel)),
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "viewer lookup failed");
                None
            }
        }
    }

    async fn builtin_commands(&self, message: &ChatMessage) -> Option<String> {
        match self.chat.list_commands(&message.channel).await {
            Ok(commands) if commands.is_empty() => Some("No custom commands yet.".to_string()),
            Ok(commands) => {
                let names: Vec<String> = commands.iter().map(|c| format!("!{}", c.name)).collect();
                Some(format!("Available commands: {}", names.join(", ")))
            }
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "command list failed");
                None
            }
        }
    }

    async fn builtin_shoutout(&self, message: &ChatMessage, arg: &str) -> Option<String> {
        if sender_level(message) < PermissionLevel::Moderator {
            return None;
        }
        let target = arg
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_start_matches('@')
            .to_lowercase();
        if target.is_empty() {
            return Some("Usage: !so <channel>".to_string());
        }
        match self.lookup.last_stream(&target).await {
            Ok(Some(info)) => Some(shoutout_text(&info)),
            Ok(None) => Some(format!("No channel named {target}.")),
            Err(e) => {
                warn!(target, error = %e, "shoutout lookup failed");
                None
            }
        }
    }

    async fn custom(&self, message: &ChatMessage, name: &str) -> Option<String> {
        let command = match self.chat.get_command(&message.channel, name).await {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                warn!(channel = %message.channel, command = name, error = %e, "command lookup failed");
                return None;
            }
        };
        if sender_level(message) < command.permission_level() {
            debug!(
                channel = %message.channel,
                command = name,
                user = %message.login,
                "sender below command permission"
            );
            return None;
        }
        let cooldown = Duration::from_secs(command.cooldown_seconds.max(0) as u64);
        if self.on_cooldown(&message.channel, name, cooldown) {
            return None;
        }
        if let Err(e) = self.chat.increment_use_count(&message.channel, name).await {
            warn!(channel = %message.channel, command = name, error = %e, "use count update failed");
        }
        Some(substitute_placeholders(
            &command.response,
            message,
            command.use_count + 1,
        ))
    }
}

//! Environment-driven application configuration.
//!
//! Everything the daemon needs is read once at startup into [`AppConfig`];
//! missing or malformed required variables fail startup with an error naming
//! the variable.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default polling interval in seconds.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 90;

const DEFAULT_DATABASE_URL: &str = "sqlite:herald.db?mode=rwc";
const DEFAULT_LOG_DIR: &str = "logs";

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bot token for the messaging platform REST API.
    pub discord_token: String,
    /// Streaming platform app credentials.
    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    /// Wall-clock interval between polling cycles.
    pub check_interval: Duration,
    pub database_url: String,
    /// Operator account for rate-limited alert DMs. Absent disables alerts.
    pub operator_user_id: Option<i64>,
    pub log_dir: String,
    /// Chat-relay credentials. Absent disables the relay.
    pub chat: Option<ChatConfig>,
}

/// Credentials for the chat-relay connection.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub login: String,
    pub token: String,
}

impl AppConfig {
    /// Read and validate configuration from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            discord_token: require("DISCORD_TOKEN")?,
            twitch_client_id: require("TWITCH_CLIENT_ID")?,
            twitch_client_secret: require("TWITCH_CLIENT_SECRET")?,
            check_interval: parse_check_interval(optional("CHECK_INTERVAL_SECONDS"))?,
            database_url: optional("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            operator_user_id: parse_operator_id(optional("OPERATOR_USER_ID"))?,
            log_dir: optional("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
            chat: parse_chat(optional("CHAT_BOT_LOGIN"), optional("CHAT_BOT_TOKEN"))?,
        })
    }
}

fn require(name: &'static str) -> Result<String> {
    optional(name).ok_or_else(|| Error::config(format!("{name} is not set")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_check_interval(raw: Option<String>) -> Result<Duration> {
    let secs = match raw {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| Error::config(format!("CHECK_INTERVAL_SECONDS is not a number: {raw}")))?,
        None => DEFAULT_CHECK_INTERVAL_SECS,
    };
    if secs == 0 {
        return Err(Error::config("CHECK_INTERVAL_SECONDS must be positive"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_operator_id(raw: Option<String>) -> Result<Option<i64>> {
    raw.map(|raw| {
        raw.parse::<i64>()
            .map_err(|_| Error::config(format!("OPERATOR_USER_ID is not a user id: {raw}")))
    })
    .transpose()
}

fn parse_chat(login: Option<String>, token: Option<String>) -> Result<Option<ChatConfig>> {
    match (login, token) {
        (Some(login), Some(token)) => Ok(Some(ChatConfig { login, token })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(Error::config("CHAT_BOT_LOGIN set without CHAT_BOT_TOKEN")),
        (None, Some(_)) => Err(Error::config("CHAT_BOT_TOKEN set without CHAT_BOT_LOGIN")),
    }
}

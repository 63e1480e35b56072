//! REST implementation of [`MessagingClient`] with rate-limit aware retries.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::discord::permissions::{self, ChannelPermissions, Overwrite};
use crate::discord::{
    ChannelRecord, DeleteOutcome, MessageRecord, MessageRef, MessagingClient, OutgoingMessage,
    UserIdentity,
};
use crate::utils::http_client::build_http_client;
use crate::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;
/// Epoch the platform's snowflake ids count from (ms).
const SNOWFLAKE_EPOCH_MS: i64 = 1_420_070_400_000;
/// The batched delete endpoint rejects messages older than two weeks; keep a
/// margin so messages near the boundary do not flake mid-request.
const BULK_DELETE_WINDOW_DAYS: i64 = 14;
const BULK_DELETE_MARGIN_MINUTES: i64 = 10;

pub struct DiscordRestClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
    bot_id: OnceCell<i64>,
}

impl DiscordRestClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: build_http_client(REQUEST_TIMEOUT),
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            bot_id: OnceCell::new(),
        }
    }

    /// Point the client at a different API root (local mock servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// One request with rate-limit retries. A 429 is retried after the delay
    /// the server asks for, up to [`MAX_RATE_LIMIT_RETRIES`] times; every
    /// other response is returned to the caller as-is.
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.api_base, path);
        let mut attempt: u32 = 0;
        loop {
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header(header::AUTHORIZATION, format!("Bot {}", self.token));
            if let Some(body) = body {
                req = req.json(body);
            }
            let response = req
                .send()
                .await
                .map_err(|e| Error::messaging(format!("request to {path} failed: {e}")))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RATE_LIMIT_RETRIES
            {
                attempt += 1;
                let delay = parse_retry_after(&response).unwrap_or(DEFAULT_RETRY_DELAY_SECS);
                warn!(
                    path,
                    attempt,
                    delay_secs = delay,
                    "rate limited, retrying after delay"
                );
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                continue;
            }
            return Ok(response);
        }
    }

    async fn fetch_current_user(&self) -> Result<UserIdentity> {
        let response = self.request(Method::GET, "/users/@me", None).await?;
        if !response.status().is_success() {
            return Err(error_for(response, "identity lookup").await);
        }
        let user: UserDto = decode(response, "identity lookup").await?;
        Ok(UserIdentity {
            id: parse_snowflake(&user.id)?,
            username: user.username,
        })
    }

    async fn cached_bot_id(&self) -> Result<i64> {
        let id = self
            .bot_id
            .get_or_try_init(|| async { Ok::<_, Error>(self.fetch_current_user().await?.id) })
            .await?;
        Ok(*id)
    }

    async fn fetch_channel(&self, channel_id: i64) -> Result<Option<ChannelDto>> {
        let response = self
            .request(Method::GET, &format!("/channels/{channel_id}"), None)
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => Ok(Some(decode(response, "channel lookup").await?)),
            _ => Err(error_for(response, "channel lookup").await),
        }
    }
}

#[async_trait]
impl MessagingClient for DiscordRestClient {
    async fn current_user(&self) -> Result<UserIdentity> {
        self.fetch_current_user().await
    }

    async fn get_channel(&self, channel_id: i64) -> Result<Option<ChannelRecord>> {
        let Some(channel) = self.fetch_channel(channel_id).await? else {
            return Ok(None);
        };
        Ok(Some(ChannelRecord {
            id: parse_snowflake(&channel.id)?,
            name: channel.name,
            guild_id: channel.guild_id.as_deref().map(parse_snowflake).transpose()?,
        }))
    }

    async fn send_message(&self, channel_id: i64, message: &OutgoingMessage) -> Result<MessageRef> {
        let payload = build_message_payload(message);
        let response = self
            .request(
                Method::POST,
                &format!("/channels/{channel_id}/messages"),
                Some(&payload),
            )
            .await?;
        if !response.status().is_success() {
            return Err(error_for(response, "message send").await);
        }
        let sent: MessageDto = decode(response, "message send").await?;
        Ok(MessageRef {
            channel_id,
            message_id: parse_snowflake(&sent.id)?,
        })
    }

    async fn delete_message(&self, channel_id: i64, message_id: i64) -> Result<DeleteOutcome> {
        let response = self
            .request(
                Method::DELETE,
                &format!("/channels/{channel_id}/messages/{message_id}"),
                None,
            )
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::AlreadyGone),
            StatusCode::FORBIDDEN => Ok(DeleteOutcome::Forbidden),
            status if status.is_success() => Ok(DeleteOutcome::Deleted),
            _ => Err(error_for(response, "message delete").await),
        }
    }

    async fn bulk_delete(&self, channel_id: i64, message_ids: &[i64]) -> Result<()> {
        match message_ids.len() {
            0 => return Ok(()),
            1 => {
                // The batched endpoint rejects single-id requests.
                return match self.delete_message(channel_id, message_ids[0]).await? {
                    DeleteOutcome::Deleted | DeleteOutcome::AlreadyGone => Ok(()),
                    DeleteOutcome::Forbidden => {
                        Err(Error::messaging("message delete forbidden".to_string()))
                    }
                };
            }
            n if n > 100 => {
                return Err(Error::validation(
                    "bulk delete accepts at most 100 messages per request",
                ));
            }
            _ => {}
        }
        let ids: Vec<String> = message_ids.iter().map(|id| id.to_string()).collect();
        let payload = json!({ "messages": ids });
        let response = self
            .request(
                Method::POST,
                &format!("/channels/{channel_id}/messages/bulk-delete"),
                Some(&payload),
            )
            .await?;
        if !response.status().is_success() {
            return Err(error_for(response, "bulk delete").await);
        }
        Ok(())
    }

    async fn list_messages(
        &self,
        channel_id: i64,
        before: Option<i64>,
        limit: u8,
    ) -> Result<Vec<MessageRecord>> {
        let limit = limit.clamp(1, 100);
        let mut path = format!("/channels/{channel_id}/messages?limit={limit}");
        if let Some(before) = before {
            path.push_str(&format!("&before={before}"));
        }
        let response = self.request(Method::GET, &path, None).await?;
        if !response.status().is_success() {
            return Err(error_for(response, "message list").await);
        }
        let messages: Vec<MessageDto> = decode(response, "message list").await?;
        messages.into_iter().map(MessageRecord::try_from).collect()
    }

    async fn channel_permissions(&self, channel_id: i64) -> Result<ChannelPermissions> {
        let channel = self
            .fetch_channel(channel_id)
            .await?
            .ok_or_else(|| Error::not_found("channel", channel_id.to_string()))?;
        let Some(guild_id) = channel.guild_id.as_deref().map(parse_snowflake).transpose()? else {
            // DM channels have no overwrites and no moderation surface.
            return Ok(ChannelPermissions {
                view_channel: true,
                send_messages: true,
                manage_messages: false,
                read_message_history: true,
            });
        };

        let bot_id = self.cached_bot_id().await?;
        let member_resp = self
            .request(
                Method::GET,
                &format!("/guilds/{guild_id}/members/{bot_id}"),
                None,
            )
            .await?;
        if !member_resp.status().is_success() {
            return Err(error_for(member_resp, "member lookup").await);
        }
        let member: MemberDto = decode(member_resp, "member lookup").await?;

        let roles_resp = self
            .request(Method::GET, &format!("/guilds/{guild_id}/roles"), None)
            .await?;
        if !roles_resp.status().is_success() {
            return Err(error_for(roles_resp, "roles lookup").await);
        }
        let roles: Vec<RoleDto> = decode(roles_resp, "roles lookup").await?;

        let member_role_ids: HashSet<i64> = member
            .roles
            .iter()
            .map(|r| parse_snowflake(r))
            .collect::<Result<_>>()?;
        let mut role_perms = Vec::new();
        for role in &roles {
            let role_id = parse_snowflake(&role.id)?;
            if role_id == guild_id || member_role_ids.contains(&role_id) {
                role_perms.push(parse_permission_bits(&role.permissions)?);
            }
        }
        let overwrites = channel
            .permission_overwrites
            .iter()
            .map(Overwrite::try_from)
            .collect::<Result<Vec<_>>>()?;

        let bits = permissions::effective_permissions(
            &role_perms,
            &member_role_ids,
            guild_id,
            bot_id,
            &overwrites,
        );
        debug!(channel_id, guild_id, bits, "computed channel permissions");
        Ok(ChannelPermissions::from_bits(bits))
    }

    async fn create_dm(&self, user_id: i64) -> Result<i64> {
        let payload = json!({ "recipient_id": user_id.to_string() });
        let response = self
            .request(Method::POST, "/users/@me/channels", Some(&payload))
            .await?;
        if !response.status().is_success() {
            return Err(error_for(response, "DM open").await);
        }
        let channel: ChannelDto = decode(response, "DM open").await?;
        parse_snowflake(&channel.id)
    }

    fn bulk_delete_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(BULK_DELETE_WINDOW_DAYS)
            - chrono::Duration::minutes(BULK_DELETE_MARGIN_MINUTES)
    }
}

fn build_message_payload(message: &OutgoingMessage) -> Value {
    let mut payload = serde_json::Map::new();
    if let Some(content) = &message.content {
        payload.insert("content".to_string(), Value::String(content.clone()));
    }
    if let Some(embed) = &message.embed {
        payload.insert("embeds".to_string(), json!([embed]));
    }
    Value::Object(payload)
}

fn parse_retry_after(response: &reqwest::Response) -> Option<f64> {
    if let Some(value) = response.headers().get(header::RETRY_AFTER)
        && let Ok(text) = value.to_str()
        && let Ok(seconds) = text.trim().parse::<f64>()
    {
        return Some(seconds);
    }
    if let Some(value) = response.headers().get("x-ratelimit-reset-after")
        && let Ok(text) = value.to_str()
        && let Ok(seconds) = text.trim().parse::<f64>()
    {
        return Some(seconds);
    }
    None
}

async fn error_for(response: reqwest::Response, context: &str) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::messaging(format!("{context} failed with status {status}: {body}"))
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| Error::messaging(format!("{context} returned malformed body: {e}")))
}

fn parse_snowflake(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| Error::messaging(format!("invalid snowflake id: {raw}")))
}

fn parse_permission_bits(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|_| Error::messaging(format!("invalid permission bitset: {raw}")))
}

/// Creation instant embedded in a snowflake id.
pub fn snowflake_time(id: i64) -> Option<DateTime<Utc>> {
    let ms = (id >> 22) + SNOWFLAKE_EPOCH_MS;
    Utc.timestamp_millis_opt(ms).single()
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct ChannelDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    permission_overwrites: Vec<OverwriteDto>,
}

#[derive(Debug, Deserialize)]
struct OverwriteDto {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

impl TryFrom<&OverwriteDto> for Overwrite {
    type Error = Error;

    fn try_from(dto: &OverwriteDto) -> Result<Self> {
        Ok(Overwrite {
            target_id: parse_snowflake(&dto.id)?,
            kind: dto.kind,
            allow: parse_permission_bits(&dto.allow)?,
            deny: parse_permission_bits(&dto.deny)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MemberDto {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RoleDto {
    id: String,
    permissions: String,
}

#[derive(Debug, Deserialize)]
struct MessageDto {
    id: String,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    timestamp: Option<String>,
}

impl TryFrom<MessageDto> for MessageRecord {
    type Error = Error;

    fn try_from(dto: MessageDto) -> Result<Self> {
        let id = parse_snowflake(&dto.id)?;
        let timestamp = dto
            .timestamp
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| snowflake_time(id))
            .ok_or_else(|| Error::messaging(format!("message {id} carries no usable timestamp")))?;
        Ok(MessageRecord {
            id,
            pinned: dto.pinned,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::Embed;

    #[test]
    fn payload_with_content_only_omits_embeds() {
        let payload = build_message_payload(&OutgoingMessage::text("hello"));
        assert_eq!(payload["content"], "hello");
        assert!(payload.get("embeds").is_none());
    }

    #[test]
    fn payload_with_embed_wraps_in_array() {
        let payload = build_message_payload(&OutgoingMessage::embed(Embed {
            title: Some("title".to_string()),
            ..Default::default()
        }));
        assert!(payload.get("content").is_none());
        assert_eq!(payload["embeds"][0]["title"], "title");
    }

    #[test]
    fn snowflake_time_decodes_documented_example() {
        let ts = snowflake_time(175_928_847_299_117_063).unwrap();
        assert_eq!(ts.to_rfc3339(), "2016-04-30T11:18:25.796+00:00");
    }

    #[test]
    fn malformed_snowflake_is_rejected() {
        assert!(parse_snowflake("not-a-number").is_err());
        assert!(parse_snowflake("42").is_ok());
    }

    #[test]
    fn message_record_falls_back_to_snowflake_timestamp() {
        let record = MessageRecord::try_from(MessageDto {
            id: "175928847299117063".to_string(),
            pinned: true,
            timestamp: None,
        })
        .unwrap();
        assert!(record.pinned);
        assert_eq!(record.timestamp.to_rfc3339(), "2016-04-30T11:18:25.796+00:00");
    }

    #[test]
    fn bulk_delete_window_stays_below_two_weeks() {
        let client = DiscordRestClient::new("token");
        let max_age = client.bulk_delete_max_age();
        assert!(max_age < chrono::Duration::days(BULK_DELETE_WINDOW_DAYS));
        assert!(max_age > chrono::Duration::days(BULK_DELETE_WINDOW_DAYS - 1));
    }
}

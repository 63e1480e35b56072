//! The Helix HTTP client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use crate::auth::AppTokenManager;
use crate::error::{HelixError, Result};
use crate::models::{ChannelInfo, DataEnvelope, LastStreamInfo, StreamRecord, UserRecord, VideoRecord};

/// Default API base.
pub const DEFAULT_API_BASE: &str = "https://api.twitch.tv/helix/";

/// Upper bound on names/ids per batched lookup call. Callers chunk beyond it.
pub const MAX_LOOKUP_BATCH: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Typed client over the platform's read API.
///
/// Owns the HTTP client and the token manager; every request attaches the
/// client id header and a bearer token. An unauthorized response invalidates
/// the cached token and the request is retried exactly once with a fresh one.
pub struct HelixClient {
    http: reqwest::Client,
    auth: AppTokenManager,
    api_base: Url,
}

impl HelixClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_http(http, AppTokenManager::new(client_id, client_secret))
    }

    /// Build with an externally configured HTTP client and token manager.
    pub fn with_http(http: reqwest::Client, auth: AppTokenManager) -> Self {
        Self {
            http,
            auth,
            // The default is a known-good constant.
            api_base: Url::parse(DEFAULT_API_BASE).unwrap(),
        }
    }

    /// Override the API base (test servers). The base must end with `/` for
    /// path joining to behave.
    pub fn with_api_base(mut self, base: Url) -> Self {
        self.api_base = base;
        self
    }

    /// Live status for up to [`MAX_LOOKUP_BATCH`] login names in one call.
    ///
    /// Degrades rather than fails: any request-level problem after the
    /// bounded auth retry logs an error and yields an empty list so the
    /// caller's other batches still run. Only a failed token exchange is
    /// surfaced, since nothing else this cycle can succeed without a token.
    ///
    /// Results are enriched with profile image URLs via a second batched
    /// user lookup; if that lookup fails the images stay empty.
    pub async fn get_live_streams(&self, names: &[String]) -> Result<Vec<StreamRecord>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        if names.len() > MAX_LOOKUP_BATCH {
            return Err(HelixError::BatchTooLarge(names.len()));
        }

        let query: Vec<(&str, &str)> = names
            .iter()
            .map(|name| ("user_login", name.as_str()))
            .collect();

        let mut records: Vec<StreamRecord> =
            match self.fetch_data("streams", "streams", &query).await {
                Ok(data) => data,
                Err(err @ HelixError::AuthFailed { .. }) => return Err(err),
                Err(err) => {
                    error!(error = %err, batch = names.len(), "Live-stream lookup failed");
                    return Ok(Vec::new());
                }
            };

        if !records.is_empty() {
            self.enrich_profile_images(&mut records).await;
        }
        Ok(records)
    }

    /// Single-login lookup. `None` means the platform has no such user, which
    /// is how callers check whether a streamer exists.
    pub async fn get_user(&self, login: &str) -> Result<Option<UserRecord>> {
        let login = login.to_lowercase();
        let users: Vec<UserRecord> = self
            .fetch_data("users", "users", &[("login", login.as_str())])
            .await?;
        Ok(users.into_iter().next())
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let users: Vec<UserRecord> = self.fetch_data("users", "users", &[("id", id)]).await?;
        Ok(users.into_iter().next())
    }

    /// Batched id lookup used by the profile-image enrichment.
    pub async fn get_users_by_id(&self, ids: &[String]) -> Result<Vec<UserRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > MAX_LOOKUP_BATCH {
            return Err(HelixError::BatchTooLarge(ids.len()));
        }
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("id", id.as_str())).collect();
        self.fetch_data("users", "users", &query).await
    }

    pub async fn get_channel_info(&self, broadcaster_id: &str) -> Result<Option<ChannelInfo>> {
        let channels: Vec<ChannelInfo> = self
            .fetch_data("channels", "channels", &[("broadcaster_id", broadcaster_id)])
            .await?;
        Ok(channels.into_iter().next())
    }

    /// Most recent archive videos for a user, newest first.
    pub async fn get_videos(&self, user_id: &str, first: u8) -> Result<Vec<VideoRecord>> {
        let first = first.to_string();
        self.fetch_data(
            "videos",
            "videos",
            &[
                ("user_id", user_id),
                ("first", first.as_str()),
                ("type", "archive"),
            ],
        )
        .await
    }

    /// Compose user + channel + latest archive into a last-broadcast summary.
    /// `None` when the login does not exist.
    pub async fn get_last_stream_info(&self, login: &str) -> Result<Option<LastStreamInfo>> {
        let Some(user) = self.get_user(login).await? else {
            return Ok(None);
        };

        let channel = self.get_channel_info(&user.id).await?;
        let last_streamed_at = match self.get_videos(&user.id, 1).await {
            Ok(videos) => videos.first().and_then(|v| v.created_at),
            Err(err) => {
                warn!(login = %user.login, error = %err, "Video lookup failed; omitting last-broadcast time");
                None
            }
        };

        Ok(Some(LastStreamInfo {
            login: user.login,
            display_name: user.display_name,
            game_name: channel
                .as_ref()
                .map(|c| c.game_name.clone())
                .filter(|g| !g.is_empty()),
            title: channel.map(|c| c.title).filter(|t| !t.is_empty()),
            last_streamed_at,
            profile_image_url: user.profile_image_url,
        }))
    }

    /// Human-readable uptime for a live stream, `None` when offline or when
    /// the platform did not report a start time.
    pub async fn get_stream_uptime(&self, login: &str) -> Result<Option<String>> {
        let stream = self.live_stream(login).await?;
        Ok(stream
            .and_then(|s| s.started_at)
            .map(|started| format_uptime(started, Utc::now())))
    }

    pub async fn get_viewer_count(&self, login: &str) -> Result<Option<u64>> {
        Ok(self.live_stream(login).await?.map(|s| s.viewer_count))
    }

    async fn live_stream(&self, login: &str) -> Result<Option<StreamRecord>> {
        let names = vec![login.to_lowercase()];
        Ok(self.get_live_streams(&names).await?.into_iter().next())
    }

    async fn enrich_profile_images(&self, records: &mut [StreamRecord]) {
        let ids: Vec<String> = records.iter().map(|r| r.user_id.clone()).collect();
        let users = match self.get_users_by_id(&ids).await {
            Ok(users) => users,
            Err(err) => {
                warn!(error = %err, "Profile image lookup failed; leaving images empty");
                return;
            }
        };

        for record in records.iter_mut() {
            if let Some(user) = users.iter().find(|u| u.id == record.user_id) {
                record.profile_image_url = user.profile_image_url.clone();
            }
        }
    }

    async fn fetch_data<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let response = self.authed_get(endpoint, path, query).await?;
        let envelope: DataEnvelope<T> = response
            .json()
            .await
            .map_err(|e| HelixError::decode(endpoint, e))?;
        Ok(envelope.data)
    }

    /// GET with auth headers and the bounded unauthorized retry: the first
    /// 401 invalidates the cached token and retries once; a second 401 is
    /// returned as a status error.
    async fn authed_get(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let url = self
            .api_base
            .join(path)
            .map_err(|e| HelixError::decode(endpoint, e))?;

        let mut retried = false;
        loop {
            let bearer = self.auth.bearer(&self.http).await?;
            let response = self
                .http
                .get(url.clone())
                .header("Client-Id", self.auth.client_id())
                .bearer_auth(&bearer)
                .query(query)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                if retried {
                    return Err(HelixError::Status {
                        endpoint,
                        status: status.as_u16(),
                    });
                }
                debug!(endpoint, "Unauthorized; refreshing app token and retrying once");
                self.auth.invalidate();
                retried = true;
                continue;
            }
            if !status.is_success() {
                return Err(HelixError::Status {
                    endpoint,
                    status: status.as_u16(),
                });
            }
            return Ok(response);
        }
    }
}

/// Format elapsed time since `started` as `"2h 35m"`, or `"35m"` under an
/// hour. Negative elapsed (clock skew) clamps to zero.
pub fn format_uptime(started: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = now.signed_duration_since(started).num_minutes().max(0);
    let hours = minutes / 60;
    let minutes = minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    /// reqwest is built without a bundled TLS provider; install one for the
    /// test process just as the host application does at startup.
    fn install_crypto_provider() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }

    #[rstest]
    #[case((12, 0), (12, 35), "35m")]
    #[case((10, 0), (12, 35), "2h 35m")]
    #[case((12, 0), (12, 0), "0m")]
    #[case((13, 0), (12, 0), "0m")] // clock skew clamps to zero
    fn uptime_formatting(
        #[case] started: (u32, u32),
        #[case] now: (u32, u32),
        #[case] expected: &str,
    ) {
        assert_eq!(format_uptime(at(started.0, started.1), at(now.0, now.1)), expected);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        install_crypto_provider();
        let client = HelixClient::new("id", "secret");
        let names: Vec<String> = (0..=MAX_LOOKUP_BATCH).map(|i| format!("user{i}")).collect();
        let err = client.get_live_streams(&names).await.unwrap_err();
        assert!(matches!(err, HelixError::BatchTooLarge(n) if n == MAX_LOOKUP_BATCH + 1));
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        install_crypto_provider();
        let client = HelixClient::new("id", "secret");
        let streams = client.get_live_streams(&[]).await.unwrap();
        assert!(streams.is_empty());
    }
}

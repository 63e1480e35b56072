//! App-token lifecycle.
//!
//! The platform issues short-lived app tokens via the OAuth2
//! client-credentials grant. The manager caches the current token and
//! re-exchanges when the cached one is missing or within the refresh margin
//! of expiry, so call sites never deal with auth state.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{HelixError, Result};

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Tokens inside this window of expiry count as stale.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Cached client-credentials token manager.
pub struct AppTokenManager {
    client_id: String,
    client_secret: String,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl AppTokenManager {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// Override the token endpoint (test servers).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Return a bearer token, exchanging a fresh one if the cache is empty
    /// or the cached token is within the refresh margin of expiry.
    pub async fn bearer(&self, http: &reqwest::Client) -> Result<String> {
        {
            let cached = self.cached.lock();
            if let Some(token) = cached.as_ref()
                && token.is_fresh(Utc::now())
            {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange(http).await?;
        let bearer = fresh.access_token.clone();
        *self.cached.lock() = Some(fresh);
        Ok(bearer)
    }

    /// Drop the cached token so the next call re-exchanges. Used when the API
    /// rejects a request as unauthorized despite a seemingly fresh token.
    pub fn invalidate(&self) {
        if self.cached.lock().take().is_some() {
            debug!("Cleared cached app token");
        }
    }

    async fn exchange(&self, http: &reqwest::Client) -> Result<CachedToken> {
        let response = http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "App token exchange rejected");
            return Err(HelixError::AuthFailed {
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| HelixError::decode("token", e))?;

        debug!(expires_in = body.expires_in, "Exchanged new app token");
        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        })
    }
}

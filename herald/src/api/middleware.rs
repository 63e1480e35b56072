//! Static bearer-token gate for the admin API.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::api::error::ApiError;

#[derive(Clone)]
pub struct BearerAuth {
    token: Arc<String>,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(token.into()),
        }
    }

    fn accepts(&self, header: Option<&str>) -> bool {
        header
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|presented| presented == self.token.as_str())
    }
}

pub async fn require_bearer(
    State(auth): State<BearerAuth>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if auth.accepts(header) {
        Ok(next.run(request).await)
    } else {
        warn!(path = %request.uri().path(), "rejected API request without a valid bearer token");
        Err(ApiError::unauthorized("missing or invalid bearer token"))
    }
}

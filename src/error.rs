use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    /// A provider failed on the critical path. The detail is logged, not returned.
    Upstream(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Upstream(detail) => {
                tracing::error!(detail = %detail, "upstream provider failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "playlist generation failed".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Failure of a single outbound call to a third-party API.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("access token rejected")]
    Unauthorized,
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
    #[error("unexpected response: {0}")]
    Parse(String),
    #[error("missing field in response: {0}")]
    Missing(&'static str),
}

impl ProviderError {
    pub fn parse(e: impl std::fmt::Display) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unauthorized => {
                AppError::Unauthorized("session expired, log in again".into())
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// Maps non-success statuses onto [`ProviderError`], keeping the body for the logs.
pub async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ProviderError::Unauthorized);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = res
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        tracing::warn!(?retry_after, "provider rate limit hit");
        return Err(ProviderError::RateLimited { retry_after });
    }
    let body = res.text().await.unwrap_or_default();
    Err(ProviderError::Status { status, body })
}

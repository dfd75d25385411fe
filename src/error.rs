use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Which external collaborator a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Translator,
    Tmdb,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Translator => write!(f, "query translator"),
            Upstream::Tmdb => write!(f, "movie database"),
        }
    }
}

/// Service-wide error taxonomy. `ConfigMissing` is startup-fatal; everything
/// else is caught at the handler boundary and converted into a structured
/// error response.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("missing required configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{upstream} is unavailable: {reason}")]
    UpstreamUnavailable { upstream: Upstream, reason: String },

    #[error("{upstream} rejected the configured credentials")]
    UpstreamAuthError { upstream: Upstream },

    #[error("{upstream} returned an unusable response: {reason}")]
    UpstreamInvalidResponse { upstream: Upstream, reason: String },

    #[error("{upstream} rate limited the request")]
    UpstreamRateLimited { upstream: Upstream },
}

impl ServiceError {
    /// Machine-readable error code carried in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::ConfigMissing(_) => "config_missing",
            ServiceError::InvalidRequest(_) => "invalid_request",
            ServiceError::UpstreamUnavailable { .. } => "upstream_unavailable",
            ServiceError::UpstreamAuthError { .. } => "upstream_auth_error",
            ServiceError::UpstreamInvalidResponse { .. } => "upstream_invalid_response",
            ServiceError::UpstreamRateLimited { .. } => "upstream_rate_limited",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::UpstreamAuthError { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::UpstreamRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::UpstreamUnavailable { .. }
            | ServiceError::UpstreamInvalidResponse { .. } => StatusCode::BAD_GATEWAY,
            // ConfigMissing aborts startup; mapped here only for completeness.
            ServiceError::ConfigMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

//! Machine-readable error responses (RFC 7807 problem details).
//!
//! Every error surface in the service renders as `application/problem+json`
//! with a relative category URI in the `type` member. Authentication
//! failures deliberately omit `WWW-Authenticate`: browser clients must
//! never be shown the native Basic-auth prompt.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Wire shape of a problem response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub status: u16,
    pub title: String,
    pub detail: String,
}

/// Errors surfaced to API clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request itself is malformed.
    BadRequest(String),
    /// Authentication failed or was not attempted.
    Unauthorized(String),
    /// Authenticated, but not allowed.
    Forbidden(String),
    /// An upstream dependency misbehaved.
    Upstream(String),
    /// Something broke on our side. The cause stays in the logs.
    Internal,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        ApiError::Unauthorized(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        ApiError::Forbidden(detail.into())
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        ApiError::Upstream(detail.into())
    }

    /// Log the cause server-side and return an opaque 500. The client
    /// sees a fixed message, never the underlying error.
    pub fn internal(context: &str, cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "{}", context);
        ApiError::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad-request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Upstream(_) => "upstream",
            ApiError::Internal => "internal",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "Bad Request",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::Upstream(_) => "Bad Gateway",
            ApiError::Internal => "Internal Server Error",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ApiError::BadRequest(detail)
            | ApiError::Unauthorized(detail)
            | ApiError::Forbidden(detail)
            | ApiError::Upstream(detail) => detail,
            ApiError::Internal => "Internal Server Error",
        }
    }

    fn body(&self) -> ProblemDetails {
        ProblemDetails {
            // Relative category URI, resolved against the request URI.
            problem_type: format!("/problems/{}", self.slug()),
            status: self.status().as_u16(),
            title: self.title().to_string(),
            detail: self.detail().to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title(), self.detail())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)],
            Json(self.body()),
        )
            .into_response()
    }
}

use std::fmt;
use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by the call guard.
///
/// Provider-specific signals are translated into these variants at the
/// boundary (see `classify`), so retry decisions only ever look at the kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Transient service error: {0}")]
    Transient(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request rejected by provider: {0}")]
    Rejected(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Stable classification of a `GuardError`, used for retry sets and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    RateLimited,
    Transient,
    MalformedResponse,
    Rejected,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Transient => "transient",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GuardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::Validation(_) => ErrorKind::Validation,
            GuardError::Authentication(_) => ErrorKind::Authentication,
            GuardError::RateLimited { .. } => ErrorKind::RateLimited,
            GuardError::Transient(_) => ErrorKind::Transient,
            GuardError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            GuardError::Rejected(_) => ErrorKind::Rejected,
            GuardError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Provider hint for how long to back off, if one was sent.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GuardError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GuardError::Validation(_) => StatusCode::BAD_REQUEST,
            GuardError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GuardError::Authentication(_)
            | GuardError::MalformedResponse(_)
            | GuardError::Rejected(_) => StatusCode::BAD_GATEWAY,
            GuardError::Transient(_) | GuardError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorKind,
    message: String,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after();
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(wait) = retry_after {
            let secs = wait.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Fail fast when a caller-supplied precondition does not hold.
///
/// The returned error displays `message` verbatim.
pub fn validate(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        return Ok(());
    }
    let message = message.into();
    tracing::debug!(%message, "validation failed");
    Err(GuardError::Validation(message))
}

/// Result type alias for guarded operations
pub type Result<T> = std::result::Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_false_carries_message_verbatim() {
        let err = validate(false, "msg").unwrap_err();
        assert_eq!(err, GuardError::Validation("msg".into()));
        assert_eq!(err.to_string(), "msg");
    }

    #[test]
    fn validate_true_is_noop() {
        assert!(validate(true, "msg").is_ok());
    }

    #[test]
    fn kinds_and_labels() {
        let err = GuardError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.kind().as_str(), "rate_limited");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(GuardError::Transient("x".into()).retry_after(), None);
        assert_eq!(GuardError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn http_mapping() {
        let limited = GuardError::RateLimited {
            message: "busy".into(),
            retry_after: Some(Duration::from_secs(12)),
        }
        .into_response();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.headers()[header::RETRY_AFTER], "12");

        let bad = GuardError::Validation("no keywords".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let auth = GuardError::Authentication("bad key".into()).into_response();
        assert_eq!(auth.status(), StatusCode::BAD_GATEWAY);

        let transient = GuardError::Transient("503".into()).into_response();
        assert_eq!(transient.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

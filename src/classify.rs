use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;

use crate::error::GuardError;

// Longest slice of an unparseable error body carried into the message.
const RAW_BODY_LIMIT: usize = 200;
const MAX_RETRY_AFTER_SECS: f64 = 86_400.0;

/// Provider error envelope: `{"type":"error","error":{"type":..,"message":..}}`
#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Deserialize)]
struct ProviderErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Map a non-success provider response to a `GuardError`.
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> GuardError {
    let detail = serde_json::from_str::<ProviderErrorBody>(body).ok().map(|b| b.error);
    let message = match &detail {
        Some(d) => format!("{} ({}): {}", status.as_u16(), d.kind, d.message),
        None => format!("{}: {}", status.as_u16(), truncate(body.trim())),
    };
    let overloaded = detail.as_ref().is_some_and(|d| d.kind == "overloaded_error");

    match status.as_u16() {
        401 | 403 => GuardError::Authentication(message),
        429 => GuardError::RateLimited {
            message,
            retry_after,
        },
        // 529 is the provider's "overloaded" status
        408 | 500..=599 => GuardError::Transient(message),
        _ if overloaded => GuardError::Transient(message),
        _ => GuardError::Rejected(message),
    }
}

/// Seconds from a `Retry-After` header. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs: f64 = value.parse().ok()?;
    (0.0..=MAX_RETRY_AFTER_SECS)
        .contains(&secs)
        .then(|| Duration::from_secs_f64(secs))
}

impl From<reqwest::Error> for GuardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return GuardError::MalformedResponse(err.to_string());
        }
        if let Some(status) = err.status() {
            return classify_status(status, None, "");
        }
        // timeouts, refused connections, resets mid-request
        GuardError::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        GuardError::MalformedResponse(err.to_string())
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(RAW_BODY_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

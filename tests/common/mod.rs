#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use content_guard::{ClientSettings, LlmClient, RateLimiter, RetryPolicy};

/// One scripted reply from the fake provider.
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<&'static str>,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        let body = json!({
            "id": "msg_test",
            "type": "message",
            "role": "assistant",
            "model": "test-model",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn"
        });
        Self::status(200, &body.to_string())
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            retry_after: None,
        }
    }

    pub fn provider_error(status: u16, kind: &str, message: &str) -> Self {
        let body = json!({"type": "error", "error": {"type": kind, "message": message}});
        Self::status(status, &body.to_string())
    }

    pub fn with_retry_after(mut self, secs: &'static str) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

/// Messages API stand-in that plays back scripted replies in order.
#[derive(Default)]
pub struct FakeProvider {
    replies: Mutex<VecDeque<Reply>>,
    hits: AtomicUsize,
    last_request: Mutex<Option<Value>>,
    last_api_key: Mutex<Option<String>>,
}

impl FakeProvider {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Value> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn last_api_key(&self) -> Option<String> {
        self.last_api_key.lock().unwrap().clone()
    }
}

async fn messages(
    State(fake): State<Arc<FakeProvider>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    *fake.last_api_key.lock().unwrap() = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    *fake.last_request.lock().unwrap() = Some(body);

    let reply = fake
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Reply::status(500, "script exhausted"));

    let mut response = (StatusCode::from_u16(reply.status).unwrap(), reply.body).into_response();
    if let Some(secs) = reply.retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static(secs));
    }
    response
}

/// Serve the fake provider on an ephemeral port; returns its messages URL.
pub async fn spawn_provider(replies: Vec<Reply>) -> (String, Arc<FakeProvider>) {
    let fake = Arc::new(FakeProvider::default());
    fake.replies.lock().unwrap().extend(replies);

    let app = Router::new()
        .route("/v1/messages", post(messages))
        .with_state(Arc::clone(&fake));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/v1/messages"), fake)
}

pub fn settings(api_url: &str) -> ClientSettings {
    ClientSettings {
        api_url: api_url.to_string(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        max_tokens: 256,
        timeout: Duration::from_secs(5),
    }
}

pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(10))
}

pub fn client(api_url: &str, policy: RetryPolicy) -> LlmClient {
    let limiter = Arc::new(RateLimiter::new(600).unwrap());
    LlmClient::new(settings(api_url), limiter, policy).unwrap()
}

pub fn blog_reply(title: &str) -> Reply {
    let payload = json!({
        "title": title,
        "content": "Keep the blade sharp. Curl your fingers.",
        "meta_description": "Knife basics for home cooks",
        "secondary_keywords": ["knife skills"]
    });
    Reply::text(&format!("```json\n{payload}\n```"))
}

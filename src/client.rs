use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::classify::{classify_status, parse_retry_after};
use crate::error::{GuardError, Result, validate};
use crate::metrics::{FAILURES, PROVIDER_ATTEMPTS};
use crate::models::{MessagesRequest, MessagesResponse};
use crate::rate_limit::RateLimiter;
use crate::retry::{RetryPolicy, retry_until};

pub const API_VERSION: &str = "2023-06-01";

/// Connection settings for the hosted model API.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Messages API client. Every attempt takes a rate-limit permit and every
/// failure is classified before the retry policy sees it.
pub struct LlmClient {
    http: reqwest::Client,
    settings: ClientSettings,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl LlmClient {
    pub fn new(
        settings: ClientSettings,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        validate(
            !settings.api_key.trim().is_empty(),
            "API key is required. Set ANTHROPIC_API_KEY",
        )?;
        validate(settings.max_tokens > 0, "max tokens must be greater than zero")?;

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GuardError::Validation(format!("failed to build HTTP client: {e}")))?;

        // sender dropped straight away: never cancelled unless with_shutdown is used
        let (_, shutdown) = watch::channel(false);

        info!(
            model = %settings.model,
            url = %settings.api_url,
            calls_per_minute = limiter.calls_per_minute(),
            max_attempts = policy.max_attempts,
            "provider client ready"
        );

        Ok(Self {
            http,
            settings,
            limiter,
            policy,
            shutdown,
        })
    }

    /// Abort limiter and backoff waits once `shutdown` flips to `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Send one prompt and return the reply text.
    pub async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.complete_with(system, prompt, max_tokens, |text| Ok(text.to_string()))
            .await
    }

    /// Send one prompt and run `parse` on the reply inside the same attempt,
    /// so a reply that fails to parse is subject to the retry policy too.
    pub async fn complete_with<T, P>(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
        parse: P,
    ) -> Result<T>
    where
        P: Fn(&str) -> Result<T>,
    {
        validate(!prompt.trim().is_empty(), "Prompt cannot be empty")?;

        let request = MessagesRequest::single_turn(
            &self.settings.model,
            max_tokens.unwrap_or(self.settings.max_tokens),
            system,
            prompt,
        );
        let request = &request;
        let parse = &parse;
        let mut shutdown = self.shutdown.clone();

        let result = retry_until(&self.policy, &mut shutdown, || async move {
            let text = self.send_once(request).await?;
            parse(&text)
        })
        .await;

        if let Err(err) = &result {
            FAILURES.with_label_values(&[err.kind().as_str()]).inc();
        }
        result
    }

    async fn send_once(&self, request: &MessagesRequest) -> Result<String> {
        let mut shutdown = self.shutdown.clone();
        let permit = self.limiter.acquire_until(&mut shutdown).await?;
        PROVIDER_ATTEMPTS.inc();

        debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            waited_ms = permit.waited.as_millis() as u64,
            "sending provider request"
        );

        let response = self
            .http
            .post(&self.settings.api_url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        let reply: MessagesResponse = response.json().await?;
        debug!(stop_reason = ?reply.stop_reason, "provider reply received");
        reply
            .text()
            .ok_or_else(|| GuardError::MalformedResponse("reply carried no text content".into()))
    }
}

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{error, warn};

use crate::error::{ErrorKind, GuardError, Result};
use crate::metrics::RETRIES;

/// How many times to run an operation and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after each further failure.
    pub base_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
    /// Error kinds that continue the loop. Anything else exits immediately.
    pub retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            retryable: vec![ErrorKind::RateLimited, ErrorKind::Transient],
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Replace the retryable set.
    pub fn retry_on(mut self, kinds: &[ErrorKind]) -> Self {
        self.retryable = kinds.to_vec();
        self
    }

    /// Add one kind to the retryable set.
    pub fn also_retry(mut self, kind: ErrorKind) -> Self {
        if !self.retryable.contains(&kind) {
            self.retryable.push(kind);
        }
        self
    }

    pub fn is_retryable(&self, err: &GuardError) -> bool {
        self.retryable.contains(&err.kind())
    }

    /// Backoff after failed attempt number `attempt` (1-based):
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    // A provider retry-after hint can lengthen the wait, never shorten it.
    fn delay_for(&self, attempt: u32, err: &GuardError) -> Duration {
        let backoff = self.backoff(attempt);
        match err.retry_after() {
            Some(hint) => backoff.max(hint.min(self.max_delay)),
            None => backoff,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable kind, or the
/// policy's attempts are used up. The last error is returned unchanged.
///
/// Every attempt re-runs the whole operation, so `op` must be safe to repeat.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(policy, None, op).await
}

/// Like [`retry`], but a backoff wait ends with `GuardError::Cancelled`
/// as soon as `shutdown` flips to `true`.
pub async fn retry_until<T, F, Fut>(
    policy: &RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(policy, Some(shutdown), op).await
}

async fn run<T, F, Fut>(
    policy: &RetryPolicy,
    mut shutdown: Option<&mut watch::Receiver<bool>>,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !policy.is_retryable(&err) {
            return Err(err);
        }
        if attempt >= max_attempts {
            if max_attempts > 1 {
                error!(
                    attempt,
                    max_attempts,
                    kind = %err.kind(),
                    error = %err,
                    "giving up after final attempt"
                );
            }
            return Err(err);
        }

        let delay = policy.delay_for(attempt, &err);
        warn!(
            attempt,
            max_attempts,
            kind = %err.kind(),
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed, backing off"
        );
        RETRIES.inc();

        match shutdown.as_deref_mut() {
            Some(rx) => pause(delay, rx).await?,
            None => sleep(delay).await,
        }
        attempt += 1;
    }
}

/// Sleep for `delay` unless `shutdown` is raised first.
///
/// A dropped sender means nobody can cancel any more; the full delay is
/// still honoured.
pub(crate) async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
    let stopped = *shutdown.borrow();
    if stopped {
        return Err(GuardError::Cancelled);
    }

    let deadline = Instant::now() + delay;
    let cancelled = tokio::select! {
        _ = sleep_until(deadline) => false,
        stop = shutdown.wait_for(|stop| *stop) => stop.is_ok(),
    };
    if cancelled {
        return Err(GuardError::Cancelled);
    }

    sleep_until(deadline).await;
    let stopped = *shutdown.borrow();
    if stopped {
        return Err(GuardError::Cancelled);
    }
    Ok(())
}

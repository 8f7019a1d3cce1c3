use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::error::{Result, validate};
use crate::metrics::LIMITER_WAIT;
use crate::retry::pause;

/// Token bucket with lazy, timestamp-driven refill.
///
/// Holds `0 <= tokens <= capacity` after every operation.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Full bucket refilling at `calls_per_minute / 60` permits per second.
    /// Zero capacity or rate is raised to one.
    pub fn new(capacity: u32, calls_per_minute: u32, now: Instant) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: f64::from(calls_per_minute.max(1)) / 60.0,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        // Instants can arrive out of order across callers; never refill backwards.
        if now <= self.last_refill {
            return;
        }
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one permit if available.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one permit is available; zero when one is available now.
    pub fn wait_time(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec)
    }

    /// Consume a permit after the caller has already waited for it.
    ///
    /// Float drift can leave the bucket a hair under one permit; the
    /// permit is still granted and the count floors at zero.
    fn take_after_wait(&mut self, now: Instant) {
        self.refill(now);
        self.tokens = (self.tokens - 1.0).max(0.0);
    }

    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

/// Proof that one call was admitted. The permit is spent at acquisition,
/// whatever happens to the call afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    pub waited: Duration,
}

/// Throttles callers to at most `calls_per_minute` by delaying, never dropping.
///
/// The bucket lock is held across the wait, so concurrent callers queue in
/// arrival order and cannot both claim the same refilled permit.
#[derive(Debug)]
pub struct RateLimiter {
    calls_per_minute: u32,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Limiter whose burst capacity equals `calls_per_minute`.
    pub fn new(calls_per_minute: u32) -> Result<Self> {
        Self::with_capacity(calls_per_minute, calls_per_minute)
    }

    pub fn with_capacity(calls_per_minute: u32, capacity: u32) -> Result<Self> {
        validate(calls_per_minute > 0, "calls per minute must be greater than zero")?;
        validate(capacity > 0, "rate limiter capacity must be greater than zero")?;
        Ok(Self {
            calls_per_minute,
            bucket: Mutex::new(TokenBucket::new(capacity, calls_per_minute, Instant::now())),
        })
    }

    pub fn calls_per_minute(&self) -> u32 {
        self.calls_per_minute
    }

    /// Wait until a permit is available, then take it.
    pub async fn acquire(&self) -> Permit {
        let mut bucket = self.bucket.lock().await;
        let wait = bucket.wait_time(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting for permit");
            sleep(wait).await;
        }
        bucket.take_after_wait(Instant::now());
        Self::record(wait)
    }

    /// Like [`acquire`](Self::acquire), but gives up with
    /// `GuardError::Cancelled` if `shutdown` is raised while waiting.
    /// A cancelled caller spends no permit.
    pub async fn acquire_until(&self, shutdown: &mut watch::Receiver<bool>) -> Result<Permit> {
        let mut bucket = self.bucket.lock().await;
        let wait = bucket.wait_time(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting for permit");
            pause(wait, shutdown).await?;
        }
        bucket.take_after_wait(Instant::now());
        Ok(Self::record(wait))
    }

    /// Take a permit only if one is available right now.
    pub async fn try_acquire(&self) -> Option<Permit> {
        let mut bucket = self.bucket.lock().await;
        bucket.try_take(Instant::now()).then(|| Self::record(Duration::ZERO))
    }

    /// Permits currently in the bucket.
    pub async fn available(&self) -> f64 {
        self.bucket.lock().await.available(Instant::now())
    }

    /// Permits in the bucket, or `None` if a caller is currently waiting on it.
    pub fn try_available(&self) -> Option<f64> {
        let mut bucket = self.bucket.try_lock().ok()?;
        Some(bucket.available(Instant::now()))
    }

    fn record(waited: Duration) -> Permit {
        LIMITER_WAIT.observe(waited.as_secs_f64());
        Permit { waited }
    }
}

/// Run `op` after taking one permit from `limiter`.
pub async fn rate_limited<T, F, Fut>(limiter: &RateLimiter, op: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let _permit = limiter.acquire().await;
    op().await
}

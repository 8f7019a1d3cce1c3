use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("content_requests_total", "Total number of generation requests").unwrap();
    pub static ref PROVIDER_ATTEMPTS: Counter = register_counter!(
        "content_provider_attempts_total",
        "Outbound provider call attempts"
    )
    .unwrap();
    pub static ref RETRIES: Counter =
        register_counter!("content_retries_total", "Backoff retries scheduled").unwrap();
    pub static ref FAILURES: CounterVec = register_counter_vec!(
        "content_failures_total",
        "Guarded calls that failed, by error kind",
        &["kind"]
    )
    .unwrap();
    pub static ref LIMITER_WAIT: Histogram = register_histogram!(
        "content_limiter_wait_seconds",
        "Time callers spent waiting for a rate limit permit"
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "content_request_latency_seconds",
        "Generation request latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("content_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("content_cache_misses_total", "Total cache misses").unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("content_cache_size", "Current number of items in cache").unwrap();
}

pub mod cache;
pub mod classify;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod retry;
pub mod state;
pub mod worker;

// Re-export commonly used types
pub use client::{ClientSettings, LlmClient};
pub use content::ContentGenerator;
pub use error::{ErrorKind, GuardError, Result, validate};
pub use rate_limit::{Permit, RateLimiter, TokenBucket, rate_limited};
pub use retry::{RetryPolicy, retry, retry_until};

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use crate::client::ClientSettings;
use crate::content::{BrandProfile, WordLimits};
use crate::error::{ErrorKind, Result, validate};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

// CLI argument structure; every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "content-guard")]
#[command(about = "Rate-limited, retrying content generation service for a hosted LLM API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "CONTENT_GUARD_PORT", default_value_t = 8080)]
    pub port: u16,

    // Messages API endpoint
    #[arg(long, env = "LLM_API_URL", default_value = "https://api.anthropic.com/v1/messages")]
    pub api_url: String,

    #[arg(long, env = "ANTHROPIC_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    #[arg(short, long, env = "CLAUDE_MODEL", default_value = "claude-sonnet-4-20250514")]
    pub model: String,

    #[arg(long, env = "MAX_TOKENS", default_value_t = 4000)]
    pub max_tokens: u32,

    // Per-request network timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 120)]
    pub request_timeout: u64,

    // Token bucket refill rate; also the burst capacity unless --burst is set
    #[arg(long, env = "CALLS_PER_MINUTE", default_value_t = 50)]
    pub calls_per_minute: u32,

    #[arg(long, env = "RATE_BURST")]
    pub burst: Option<u32>,

    // Total attempts per provider call, first one included
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 4)]
    pub max_attempts: u32,

    // First backoff delay in milliseconds, doubled per retry
    #[arg(long, env = "BASE_DELAY_MS", default_value_t = 1000)]
    pub base_delay_ms: u64,

    // Cap on a single backoff delay in seconds
    #[arg(long, env = "MAX_DELAY", default_value_t = 60)]
    pub max_delay: u64,

    // Also retry replies that fail to parse
    #[arg(long, env = "RETRY_MALFORMED")]
    pub retry_malformed: bool,

    // Cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL", default_value_t = 300)]
    pub cache_ttl: u64,

    // Queue depth in front of the generation worker
    #[arg(long, env = "QUEUE_SIZE", default_value_t = 100)]
    pub queue_size: usize,

    // Where generated content is written; nothing is saved when unset
    #[arg(long, env = "CONTENT_OUTPUT_PATH")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, env = "MIN_WORD_COUNT", default_value_t = 800)]
    pub min_word_count: u32,

    #[arg(long, env = "MAX_WORD_COUNT", default_value_t = 1500)]
    pub max_word_count: u32,

    #[arg(long, env = "BRAND_NAME", default_value = "Linoroso")]
    pub brand_name: String,

    #[arg(long, env = "BRAND_TAGLINE", default_value = "Simplicity, Elegance, Functionality")]
    pub brand_tagline: String,

    #[arg(
        long,
        env = "BRAND_VOICE",
        default_value = "professional, warm, helpful, family-oriented"
    )]
    pub brand_voice: String,

    #[arg(
        long,
        env = "TARGET_AUDIENCE",
        default_value = "quality-conscious home cooks, culinary enthusiasts"
    )]
    pub target_audience: String,

    // Product categories (comma-separated)
    #[arg(
        long,
        env = "MAIN_CATEGORIES",
        default_value = "kitchen knives,kitchen shears,knife sets,storage solutions"
    )]
    pub categories: String,
}

impl Args {
    /// Reject settings that would make the guard misbehave, before startup.
    pub fn check(&self) -> Result<()> {
        validate(
            !self.api_key.trim().is_empty(),
            "API key is required. Set ANTHROPIC_API_KEY",
        )?;
        validate(self.calls_per_minute > 0, "calls per minute must be greater than zero")?;
        validate(self.burst != Some(0), "rate limiter capacity must be greater than zero")?;
        validate(self.max_attempts >= 1, "max attempts must be at least 1")?;
        validate(self.queue_size > 0, "queue size must be greater than zero")?;
        validate(
            self.min_word_count > 0 && self.min_word_count <= self.max_word_count,
            "min word count must be positive and not above max word count",
        )?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_secs(self.max_delay));
        if self.retry_malformed {
            policy.also_retry(ErrorKind::MalformedResponse)
        } else {
            policy
        }
    }

    pub fn rate_limiter(&self) -> Result<RateLimiter> {
        RateLimiter::with_capacity(
            self.calls_per_minute,
            self.burst.unwrap_or(self.calls_per_minute),
        )
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.request_timeout),
        }
    }

    pub fn brand(&self) -> BrandProfile {
        BrandProfile {
            name: self.brand_name.clone(),
            tagline: self.brand_tagline.clone(),
            voice: self.brand_voice.clone(),
            audience: self.target_audience.clone(),
            categories: self
                .categories
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn word_limits(&self) -> WordLimits {
        WordLimits {
            min: self.min_word_count,
            max: self.max_word_count,
        }
    }
}

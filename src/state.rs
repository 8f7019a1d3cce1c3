use std::sync::Arc;
use tokio::sync::mpsc;
use crate::models::GenerationJob;
use crate::rate_limit::RateLimiter;
// app's shared state

pub struct AppState {
    pub jobs: mpsc::Sender<GenerationJob>,
    pub limiter: Arc<RateLimiter>, // shared with the provider client, read by /health
    pub model: String,
}

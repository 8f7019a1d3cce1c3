mod health;
mod metrics;
mod generate;

use axum::{Router, routing::{get, post}};
use std::sync::Arc;
use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use generate::{generate_batch_handler, generate_handler};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/generate/batch", post(generate_batch_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;
use crate::state::AppState;

// health handler
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // None while a caller holds the bucket waiting for a refill
    let available = state.limiter.try_available();
    Json(serde_json::json!({
        "status": "healthy",
        "model": state.model,
        "calls_per_minute": state.limiter.calls_per_minute(),
        "available_permits": available,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

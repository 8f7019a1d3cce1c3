use axum::{Json, extract::State};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use crate::error::{GuardError, Result, validate};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{BatchRequest, BatchResponse, ContentRequest, GeneratedContent, GenerationJob};
use crate::state::AppState;

// Largest batch accepted in one call
pub const MAX_BATCH_SIZE: usize = 20;

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ContentRequest>,
) -> Result<Json<GeneratedContent>> {
    REQUEST_TOTAL.inc();

    let start_time = Instant::now();

    let (response_tx, response_rx) = oneshot::channel();

    let job = GenerationJob::Single {
        request: payload,
        response_tx,
    };

    state.jobs.send(job).await
        .map_err(|_| GuardError::Transient("generation queue is closed".to_string()))?;

    let result = response_rx.await
        .map_err(|_| GuardError::Transient("generation worker failed to respond".to_string()))?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(Json)
}

/// Per-item results; the call itself only fails on a bad batch or a dead worker.
pub async fn generate_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchRequest>,
) -> Result<Json<BatchResponse>> {
    validate(!payload.requests.is_empty(), "Batch must contain at least one request")?;
    validate(
        payload.requests.len() <= MAX_BATCH_SIZE,
        format!("Batch cannot exceed {MAX_BATCH_SIZE} requests"),
    )?;
    REQUEST_TOTAL.inc_by(payload.requests.len() as f64);

    let start_time = Instant::now();

    let (response_tx, response_rx) = oneshot::channel();

    let job = GenerationJob::Batch {
        requests: payload.requests,
        response_tx,
    };

    state.jobs.send(job).await
        .map_err(|_| GuardError::Transient("generation queue is closed".to_string()))?;

    let results = response_rx.await
        .map_err(|_| GuardError::Transient("generation worker failed to respond".to_string()))?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok(Json(BatchResponse::new(results)))
}

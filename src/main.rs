use clap::Parser; // for cli
use content_guard::LlmClient;
use content_guard::cache::ResponseCache;
use content_guard::config::Args;
use content_guard::content::ContentGenerator;
use content_guard::handlers;
use content_guard::models::GenerationJob;
use content_guard::state::AppState;
use content_guard::worker::generation_worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_guard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments
    let args = Args::parse();
    args.check()?;

    // raised on ctrl-c; aborts limiter and backoff waits
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let limiter = Arc::new(args.rate_limiter()?);
    let client = LlmClient::new(args.client_settings(), Arc::clone(&limiter), args.retry_policy())?
        .with_shutdown(shutdown_rx);
    let generator = Arc::new(ContentGenerator::new(client, args.brand(), args.word_limits()));
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(args.cache_ttl)));

    let (job_tx, job_rx) = mpsc::channel::<GenerationJob>(args.queue_size);

    // spawn the background worker
    tokio::spawn(generation_worker(job_rx, generator, cache, args.output_dir.clone()));

    // creating shared state
    let state = Arc::new(AppState {
        jobs: job_tx,
        limiter,
        model: args.model.clone(),
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Content service running on http://localhost:{}", args.port);
    tracing::info!(
        "Rate limit: {} calls per minute, {} attempts per call, cache TTL {}s",
        args.calls_per_minute,
        args.max_attempts,
        args.cache_ttl
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "no ctrl-c handler, running until killed");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

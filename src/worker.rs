use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use crate::cache::{ResponseCache, make_cache_key};
use crate::content::{ContentGenerator, save_content};
use crate::error::Result;
use crate::metrics::{CACHE_HITS, CACHE_MISSES};
use crate::models::{ContentRequest, GeneratedContent, GenerationJob};

/// Drain the job queue one request at a time, so the provider only ever
/// sees a single in-flight generation from this process.
pub async fn generation_worker(
    mut rx: mpsc::Receiver<GenerationJob>,
    generator: Arc<ContentGenerator>,
    cache: Arc<ResponseCache>,
    output_dir: Option<PathBuf>,
) {
    info!("generation worker started - processing requests sequentially");

    let worker = Worker {
        generator,
        cache,
        output_dir,
    };

    // keep receiving the requests from queue
    while let Some(job) = rx.recv().await {
        match job {
            GenerationJob::Single {
                request,
                response_tx,
            } => {
                let result = worker.serve(&request).await;
                // Send response back to handler
                let _ = response_tx.send(result);
            }
            GenerationJob::Batch {
                requests,
                response_tx,
            } => {
                info!(items = requests.len(), "processing batch");
                let mut results = Vec::with_capacity(requests.len());
                for request in &requests {
                    results.push(worker.serve(request).await);
                }
                let _ = response_tx.send(results);
            }
        }
    }

    info!("generation queue closed, worker stopping");
}

struct Worker {
    generator: Arc<ContentGenerator>,
    cache: Arc<ResponseCache>,
    output_dir: Option<PathBuf>,
}

impl Worker {
    async fn serve(&self, request: &ContentRequest) -> Result<GeneratedContent> {
        let cache_key = make_cache_key(request);

        // check cache first
        if let Some(content) = self.cache.get(&cache_key) {
            CACHE_HITS.inc();
            info!(topic = %request.topic, "cache hit");
            return Ok(content);
        }
        CACHE_MISSES.inc();

        let result = self.generator.generate(request).await;

        // task boundary: record the failure, keep serving
        match &result {
            Ok(content) => {
                self.cache.insert(cache_key, content.clone());
                if let Some(dir) = &self.output_dir {
                    if let Err(e) = save_content(content, dir) {
                        warn!(error = %e, dir = %dir.display(), "failed to save generated content");
                    }
                }
            }
            Err(e) => {
                error!(
                    topic = %request.topic,
                    kind = %e.kind(),
                    error = %e,
                    "generation failed"
                );
            }
        }
        result
    }
}

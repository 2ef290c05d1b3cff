use std::sync::Arc;
use std::time::Duration;

use rag_observability::{
    context, fields, get_logger, CacheClient, CacheConfig, ContextFutureExt, MemoryStore,
    Observability, ObservabilityConfig, TraceContext,
};

#[derive(Debug, thiserror::Error)]
#[error("embedding backend returned {0}")]
struct EmbedError(u16);

async fn embed(chunks: usize) -> Result<usize, EmbedError> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    if chunks > 3 {
        return Err(EmbedError(503));
    }
    Ok(chunks * 384)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ObservabilityConfig::from_env("demo-service")?;
    let observability = Observability::init(config);
    let logger = observability.logger("demo");
    let cache = CacheClient::new(Arc::new(MemoryStore::new()), CacheConfig::from_env()?);

    let mut handles = Vec::new();
    for (request, chunks) in [("r1", 2usize), ("r2", 5)] {
        let logger = logger.clone();
        let cache = cache.clone();
        let trace = TraceContext::from_traceparent(&format!(
            "00-4bf92f3577b34da6a3ce929d0e0e47{}-00f067aa0ba902b7-01",
            if request == "r1" { "36" } else { "37" }
        ))?;

        // Scopes entered here travel with the spawned task.
        let _request = context::with_context(fields! { "request_id" => request });
        let _trace = context::with_trace(trace);
        let task = async move {
            logger.info("request received", fields! { "chunks" => chunks });
            let dims = logger
                .timed_async("embed_chunks", fields! { "chunks" => chunks }, embed(chunks))
                .await;
            match dims {
                Ok(dims) => {
                    if let Err(e) = cache.store(&format!("embeddings:{}", request), &dims, None).await {
                        logger.error_with("could not cache embeddings", None, &e);
                    }
                }
                Err(e) => logger.warning("request degraded", fields! { "reason" => e.to_string() }),
            }
        };
        handles.push(tokio::spawn(task.in_current_context()));
    }
    for handle in handles {
        handle.await?;
    }

    get_logger("demo").info("cached keys", fields! { "keys" => cache.list_keys("embeddings:*").await? });
    logger.info("done", None);
    Ok(())
}

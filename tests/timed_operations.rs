use std::sync::Arc;
use std::time::Duration;

use rag_observability::{fields, Config, Logging, MemorySink, OutputFormat};

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("vector store rejected batch {0}")]
struct UpsertError(u32);

fn pipeline() -> (Logging, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let logging = Logging::builder(Config::default().with_format(OutputFormat::Json))
        .sink(sink.clone())
        .build();
    (logging, sink)
}

fn parse(sink: &MemorySink) -> Vec<serde_json::Value> {
    sink.records()
        .iter()
        .map(|r| serde_json::from_str(r).unwrap())
        .collect()
}

#[tokio::test]
async fn async_success_spans_the_whole_future() {
    let (logging, sink) = pipeline();
    let logger = logging.logger("indexer");
    let result: Result<u32, UpsertError> = logger
        .timed_async("upsert", fields! { "batch" => 7 }, async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(128)
        })
        .await;
    assert_eq!(result, Ok(128));

    let records = parse(&sink);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message"], "upsert completed");
    assert_eq!(records[0]["batch"], 7);
    assert!(records[0]["duration_ms"].as_f64().unwrap() >= 29.0);
}

#[tokio::test]
async fn async_failure_is_returned_unchanged() {
    let (logging, sink) = pipeline();
    let logger = logging.logger("indexer");
    let result: Result<(), UpsertError> = logger
        .timed_async("upsert", None, async { Err(UpsertError(3)) })
        .await;
    assert_eq!(result, Err(UpsertError(3)));

    let records = parse(&sink);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "ERROR");
    assert_eq!(records[0]["error"], "vector store rejected batch 3");
    assert_eq!(records[0]["exception"]["type"], "UpsertError");
    assert_eq!(records[0]["exception"]["message"], "vector store rejected batch 3");
}

#[tokio::test]
async fn dropped_future_is_cancelled() {
    let (logging, sink) = pipeline();
    let logger = logging.logger("indexer");
    let slow = logger.timed_async("upsert", None, async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<(), UpsertError>(())
    });
    let outcome = tokio::time::timeout(Duration::from_millis(10), slow).await;
    assert!(outcome.is_err());

    let records = parse(&sink);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message"], "upsert cancelled");
    assert_eq!(records[0]["level"], "WARNING");
}

#[tokio::test]
async fn unpolled_future_logs_nothing() {
    let (logging, sink) = pipeline();
    let logger = logging.logger("indexer");
    drop(logger.timed_async("upsert", None, async { Ok::<(), UpsertError>(()) }));
    assert!(sink.is_empty());
}

//! Exercises the process-default pipeline, so everything runs in one test.

use std::sync::Arc;

use rag_observability::{context, fields, get_logger, install, Config, Level, Logging, MemorySink};

#[test]
fn request_scope_through_the_default_pipeline() {
    let logger = get_logger("api");
    logger.info("before configure", None);

    let sink = Arc::new(MemorySink::new());
    install(
        Logging::builder(Config::default().with_level(Level::Info))
            .sink(sink.clone())
            .build(),
    );
    assert!(sink.is_empty(), "records emitted before configuration are dropped");

    {
        let _request = context::with_context(fields! { "request_id" => "r1" });
        logger.info("start", None);
        logger.debug("below threshold", None);
        logger.info("override", fields! { "request_id" => "r2" });
    }
    logger.info("end", None);

    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert!(records[0].contains("[\"start\"]"));
    assert!(records[0].ends_with("[request_id=r1]"), "{}", records[0]);
    assert!(records[1].ends_with("[request_id=r2]"), "{}", records[1]);
    assert!(records[2].contains("[\"end\"]"));
    assert!(!records[2].contains("request_id"));

    // reconfiguring replaces the pipeline for existing handles
    let replacement = Arc::new(MemorySink::new());
    install(
        Logging::builder(Config::default().with_level(Level::Error))
            .sink(replacement.clone())
            .build(),
    );
    logger.warning("filtered by the new level", None);
    logger.error("kept", None);
    assert_eq!(sink.len(), 3);
    assert_eq!(replacement.len(), 1);
}

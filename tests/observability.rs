//! Installs global state, so everything runs in one test.

use std::sync::Arc;

use rag_observability::{
    context, fields, get_logger, Bridge, MemorySink, Observability, ObservabilityConfig, OutputFormat,
    TraceContext,
};

fn config(lookup: &[(&str, &str)]) -> ObservabilityConfig {
    let pairs: Vec<(String, String)> = lookup
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ObservabilityConfig::from_lookup("chunking-service", move |key| {
        pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
    .unwrap()
}

fn parse(line: &str) -> serde_json::Value {
    serde_json::from_str(line).unwrap()
}

#[test]
fn init_installs_pipeline_and_bridge_once() {
    let sink = Arc::new(MemorySink::new());
    let observability = Observability::init_with_sink(config(&[("LOG_FORMAT", "json")]), sink.clone());
    assert_eq!(observability.bridge(), Bridge::Installed);
    assert_eq!(observability.config().logging.format, OutputFormat::Json);

    let startup = parse(&sink.records()[0]);
    assert_eq!(startup["message"], "chunking-service observability initialized");
    assert_eq!(startup["logger"], "chunking-service");
    assert_eq!(startup["service"], "chunking-service");
    assert_eq!(startup["tracing_enabled"], true);
    assert_eq!(startup["log_format"], "json");

    // tracing events and default-pipeline loggers share context and trace
    let trace = TraceContext::from_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01").unwrap();
    {
        let _request = context::with_context(fields! { "request_id" => "r1" });
        let _trace = context::with_trace(trace);
        tracing::info!(target: "chunker", pages = 12, "parsed document");
        get_logger("chunker").info("chunked", None);
    }
    let records = sink.records();
    assert_eq!(records.len(), 3);
    for line in &records[1..] {
        let data = parse(line);
        assert_eq!(data["context"]["request_id"], "r1");
        assert_eq!(data["trace_id"], "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(data["trace_flags"], 1);
    }
    assert_eq!(parse(&records[1])["pages"], 12);

    // a second init replaces the pipeline but cannot install the bridge again
    let replacement = Arc::new(MemorySink::new());
    let again = Observability::init_with_sink(config(&[]), replacement.clone());
    assert_eq!(again.bridge(), Bridge::AlreadyInstalled);
    tracing::warn!("after reinit");
    assert_eq!(sink.len(), 3);
    let lines = replacement.records();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("[\"after reinit\"]"));

    let disabled = Observability::init_with_sink(
        config(&[("TRACING_ENABLED", "false")]),
        Arc::new(MemorySink::new()),
    );
    assert_eq!(disabled.bridge(), Bridge::Disabled);
}

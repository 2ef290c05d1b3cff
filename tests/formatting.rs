use chrono::{TimeZone, Utc};
use rag_observability::format::{render_value, RecordFormatter};
use rag_observability::{
    fields, ErrorInfo, Level, LogEvent, OutputFormat, ServiceInfo, SourceLocation, TraceContext, Value,
};

fn event() -> LogEvent {
    LogEvent::new(Level::Info, "chunker", "chunk created")
        .with_timestamp(Utc.with_ymd_and_hms(2025, 12, 31, 18, 42, 23).unwrap())
        .at(SourceLocation {
            module: "chunker".to_string(),
            line: Some(42),
            function: None,
        })
        .with_fields(fields! { "size" => 1024 })
}

#[test]
fn formatting_is_deterministic_for_both_policies() {
    let context = fields! { "request_id" => "r1" };
    let trace = TraceContext::from_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01").unwrap();
    for format in [OutputFormat::Readable, OutputFormat::Json] {
        let formatter = format.formatter(&ServiceInfo::default());
        let first = formatter.format(&event(), &context, Some(&trace));
        let second = formatter.format(&event(), &context, Some(&trace));
        assert_eq!(first, second, "{} output changed between calls", format);
    }
}

#[test]
fn readable_line_layout() {
    let formatter = OutputFormat::Readable.formatter(&ServiceInfo::default());
    let event = event().with_error(ErrorInfo::new("ValueError", "bad chunk"));
    let line = formatter.format(&event, &fields! { "request_id" => "r1" }, None);
    assert_eq!(
        line,
        "[2025/12/31 18:42:23.000 +00:00] [INFO] [chunker:42] [\"chunk created\"] \
         [request_id=r1] [size=1024] [exception=ValueError: bad chunk]"
    );
}

#[test]
fn readable_value_rendering() {
    assert_eq!(render_value(&Value::Null), "null");
    assert_eq!(render_value(&Value::Bool(true)), "true");
    assert_eq!(render_value(&Value::from("hello world")), "\"hello world\"");
    assert_eq!(render_value(&Value::from("ok")), "ok");
    assert_eq!(render_value(&Value::from(3.0)), "3");
    assert_eq!(render_value(&Value::from(3.14159)), "3.14");
}

#[test]
fn json_record_members() {
    let service = ServiceInfo {
        name: "chunking-service".to_string(),
        version: "2.0.0".to_string(),
        environment: "production".to_string(),
    };
    let formatter = OutputFormat::Json.formatter(&service);
    let line = formatter.format(&event(), &fields! { "request_id" => "r1" }, None);
    let data: serde_json::Value = serde_json::from_str(&line).unwrap();

    assert_eq!(data["timestamp"], "2025-12-31T18:42:23.000Z");
    assert_eq!(data["service"], "chunking-service");
    assert_eq!(data["version"], "2.0.0");
    assert_eq!(data["environment"], "production");
    assert_eq!(data["level"], "INFO");
    assert_eq!(data["logger"], "chunker");
    assert_eq!(data["message"], "chunk created");
    assert_eq!(data["module"], "chunker");
    assert_eq!(data["line"], 42);
    assert_eq!(data["context"]["request_id"], "r1");
    assert_eq!(data["size"], 1024);
    assert!(data.get("trace_id").is_none());
    assert!(data.get("exception").is_none());
    assert!(!line.contains('\n'));
}

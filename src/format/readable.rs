use super::RecordFormatter;
use crate::record::LogEvent;
use crate::trace::TraceContext;
use crate::value::{Fields, Value};
use std::fmt::Write;

/// Human-readable bracketed lines:
///
/// ```text
/// [2025/12/31 18:42:23.765 +00:00] [INFO] [chunker:42] ["chunk created"] [request_id=r1] [size=1024]
/// ```
///
/// Context fields come first, then call-site fields (a call-site value
/// replaces a context value of the same name), then the trace correlation,
/// then the captured exception.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadableFormatter;

impl RecordFormatter for ReadableFormatter {
    fn format(&self, event: &LogEvent, context: &Fields, trace: Option<&TraceContext>) -> String {
        let mut line = String::with_capacity(128);

        let _ = write!(
            line,
            "[{} +00:00] [{}] ",
            event.timestamp.format("%Y/%m/%d %H:%M:%S%.3f"),
            event.level
        );
        match event.location.line {
            Some(n) => {
                let _ = write!(line, "[{}:{}]", event.location.module, n);
            }
            None => {
                let _ = write!(line, "[{}]", event.location.module);
            }
        }
        let _ = write!(line, " [\"{}\"]", event.message);

        let mut fields = context.clone();
        crate::value::merge(&mut fields, &event.fields);
        for (key, value) in &fields {
            push_field(&mut line, key, &render_value(value));
        }

        if let Some(trace) = trace {
            push_field(&mut line, "trace_id", &trace.trace_id);
            push_field(&mut line, "span_id", &trace.span_id);
        }

        if let Some(error) = &event.error {
            push_field(&mut line, "exception", &format!("{}: {}", error.kind, error.message));
        }

        line
    }
}

fn push_field(line: &mut String, key: &str, rendered: &str) {
    let _ = write!(line, " [{}={}]", key, rendered);
}

/// Render a field value for bracketed output.
///
/// - `null`, `true`, `false` as is
/// - strings bare, or double-quoted when empty or containing whitespace or `"`
/// - sequences as `[a, b]`, mappings as `{k: v}`, recursively
/// - integral floats without a decimal point, other floats to two places
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => {
            if s.is_empty() || s.contains(|c: char| c.is_whitespace() || c == '"') {
                format!("\"{}\"", s)
            } else {
                s.clone()
            }
        }
        Value::Number(n) => {
            if n.is_f64() {
                // serde_json numbers are always finite
                let f = n.as_f64().unwrap_or_default();
                if f.fract() == 0.0 {
                    // `{:.0}` would print -0 for negative zero
                    if f == 0.0 {
                        "0".to_string()
                    } else {
                        format!("{:.0}", f)
                    }
                } else {
                    format!("{:.2}", f)
                }
            } else {
                n.to_string()
            }
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let items: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, render_value(v)))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::level::Level;
    use crate::record::{ErrorInfo, SourceLocation};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn event(message: &str) -> LogEvent {
        LogEvent::new(Level::Info, "ingest", message)
            .with_timestamp(
                Utc.with_ymd_and_hms(2025, 12, 31, 18, 42, 23).unwrap()
                    + chrono::Duration::milliseconds(765),
            )
            .at(SourceLocation {
                module: "chunker".to_string(),
                line: Some(42),
                function: None,
            })
    }

    #[test]
    fn renders_scalar_values() {
        assert_eq!(render_value(&Value::Null), "null");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!("hello world")), "\"hello world\"");
        assert_eq!(render_value(&json!("ok")), "ok");
        assert_eq!(render_value(&json!("")), "\"\"");
        assert_eq!(render_value(&json!("say \"hi\"")), "\"say \"hi\"\"");
        assert_eq!(render_value(&json!("tab\there")), "\"tab\there\"");
        assert_eq!(render_value(&json!(3.0)), "3");
        assert_eq!(render_value(&json!(-0.0)), "0");
        assert_eq!(render_value(&json!(3.14159)), "3.14");
        assert_eq!(render_value(&json!(42)), "42");
        assert_eq!(render_value(&json!(-7)), "-7");
    }

    #[test]
    fn renders_nested_values() {
        assert_eq!(render_value(&json!([1, "a b", null])), "[1, \"a b\", null]");
        assert_eq!(
            render_value(&json!({"doc": "x", "pages": [1.5, 2.0]})),
            "{doc: x, pages: [1.50, 2]}"
        );
        assert_eq!(render_value(&json!([])), "[]");
        assert_eq!(render_value(&json!({})), "{}");
    }

    #[test]
    fn renders_full_line() {
        let event = event("Chunk created").with_fields(fields! { "chunk_id" => "abc", "size" => 1024 });
        let line = ReadableFormatter.format(&event, &fields! { "request_id" => "r1" }, None);
        assert_eq!(
            line,
            "[2025/12/31 18:42:23.765 +00:00] [INFO] [chunker:42] [\"Chunk created\"] \
             [request_id=r1] [chunk_id=abc] [size=1024]"
        );
    }

    #[test]
    fn call_site_field_overrides_context() {
        let event = event("retry").with_fields(fields! { "a" => 3 });
        let line = ReadableFormatter.format(&event, &fields! { "a" => 2, "b" => 1 }, None);
        assert!(line.ends_with("[a=3] [b=1]"), "{}", line);
        assert!(!line.contains("[a=2]"));
    }

    #[test]
    fn appends_trace_then_exception() {
        let trace = TraceContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", 1).unwrap();
        let event = event("upload failed")
            .with_fields(fields! { "doc_id" => "d1" })
            .with_error(ErrorInfo::new("ValueError", "bad page"));
        let line = ReadableFormatter.format(&event, &Fields::new(), Some(&trace));
        assert!(line.ends_with(
            "[doc_id=d1] [trace_id=4bf92f3577b34da6a3ce929d0e0e4736] \
             [span_id=00f067aa0ba902b7] [exception=ValueError: bad page]"
        ));
    }

    #[test]
    fn location_without_line() {
        let mut event = event("boot");
        event.location.line = None;
        let line = ReadableFormatter.format(&event, &Fields::new(), None);
        assert!(line.contains("[INFO] [chunker] [\"boot\"]"));
    }
}

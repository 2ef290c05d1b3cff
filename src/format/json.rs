use super::RecordFormatter;
use crate::config::ServiceInfo;
use crate::record::LogEvent;
use crate::trace::TraceContext;
use crate::value::{Fields, Value};
use chrono::SecondsFormat;
use std::collections::HashSet;
use std::sync::Mutex;

/// Member names owned by the record itself. A call-site field with one of
/// these names still wins, but is reported once per formatter.
pub const RESERVED_MEMBERS: &[&str] = &[
    "timestamp",
    "service",
    "version",
    "environment",
    "level",
    "logger",
    "message",
    "module",
    "function",
    "line",
    "context",
    "trace_id",
    "span_id",
    "trace_flags",
    "exception",
];

/// One self-contained JSON object per record.
#[derive(Debug)]
pub struct JsonFormatter {
    service: ServiceInfo,
    warned: Mutex<HashSet<String>>,
}

impl JsonFormatter {
    pub fn new(service: ServiceInfo) -> Self {
        JsonFormatter {
            service,
            warned: Mutex::new(HashSet::new()),
        }
    }

    fn warn_collision(&self, key: &str) {
        let mut warned = match self.warned.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if warned.insert(key.to_string()) {
            eprintln!(
                "log field {:?} collides with a reserved record member; the call-site value is used",
                key
            );
        }
    }

    /// Build the record object; exposed for sinks that want the structured
    /// form rather than the rendered line.
    pub fn to_object(&self, event: &LogEvent, context: &Fields, trace: Option<&TraceContext>) -> Fields {
        let mut record = Fields::new();
        record.insert(
            "timestamp".into(),
            Value::String(event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert("service".into(), Value::String(self.service.name.clone()));
        record.insert("version".into(), Value::String(self.service.version.clone()));
        record.insert("environment".into(), Value::String(self.service.environment.clone()));
        record.insert("level".into(), Value::String(event.level.as_str().to_string()));
        record.insert("logger".into(), Value::String(event.logger.clone()));
        record.insert("message".into(), Value::String(event.message.clone()));
        record.insert("module".into(), Value::String(event.location.module.clone()));
        // present on every record so aggregators see a fixed shape
        record.insert(
            "function".into(),
            event.location.function.clone().map_or(Value::Null, Value::String),
        );
        if let Some(line) = event.location.line {
            record.insert("line".into(), Value::from(line));
        }
        if !context.is_empty() {
            record.insert("context".into(), Value::Object(context.clone()));
        }
        if let Some(trace) = trace {
            record.insert("trace_id".into(), Value::String(trace.trace_id.clone()));
            record.insert("span_id".into(), Value::String(trace.span_id.clone()));
            record.insert("trace_flags".into(), Value::from(trace.flags));
        }
        if let Some(error) = &event.error {
            let mut exception = Fields::new();
            exception.insert("type".into(), Value::String(error.kind.clone()));
            exception.insert("message".into(), Value::String(error.message.clone()));
            if !error.frames.is_empty() {
                exception.insert(
                    "frames".into(),
                    Value::Array(error.frames.iter().cloned().map(Value::String).collect()),
                );
            }
            record.insert("exception".into(), Value::Object(exception));
        }

        for (key, value) in &event.fields {
            if RESERVED_MEMBERS.contains(&key.as_str()) {
                self.warn_collision(key);
            }
            record.insert(key.clone(), value.clone());
        }
        record
    }
}

impl RecordFormatter for JsonFormatter {
    fn format(&self, event: &LogEvent, context: &Fields, trace: Option<&TraceContext>) -> String {
        let record = self.to_object(event, context, trace);
        serde_json::to_string(&record).unwrap_or_else(|err| {
            format!(
                "{{\"level\":\"ERROR\",\"message\":\"unrenderable log record: {}\"}}",
                err.to_string().replace('"', "'")
            )
        })
    }
}

use crate::level::Level;
use crate::logger::{self, Logging};
use crate::record::{ErrorInfo, LogEvent, SourceLocation};
use crate::value::{Fields, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns `tracing` events into
/// [`LogEvent`]s and emits them through a logging pipeline.
///
/// Events pick up the emitting flow's context fields and trace correlation
/// exactly like records written through a [`Logger`](crate::Logger). The
/// event target becomes the logger name and the innermost span name becomes
/// the `function` member.
#[derive(Debug, Clone)]
pub struct ContextLayer {
    logging: Option<Logging>,
}

impl ContextLayer {
    /// Emit through `logging`.
    pub fn new(logging: Logging) -> Self {
        ContextLayer {
            logging: Some(logging),
        }
    }

    /// Emit through whichever pipeline is the process default when each
    /// event happens.
    pub fn global() -> Self {
        ContextLayer { logging: None }
    }

    fn pipeline(&self) -> Option<Logging> {
        match &self.logging {
            Some(logging) => Some(logging.clone()),
            None => logger::installed(),
        }
    }
}

impl<S> Layer<S> for ContextLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Level::from(meta.level());
        let Some(logging) = self.pipeline() else {
            return;
        };
        if !logging.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut location = SourceLocation::from_metadata(meta);
        location.function = ctx.event_span(event).map(|span| span.name().to_string());

        let mut log_event = LogEvent::new(level, meta.target(), visitor.message.unwrap_or_default())
            .at(location)
            .with_fields(visitor.fields);
        log_event.error = visitor.error;
        logging.emit(&log_event);
    }
}

/// Collects the fields of one `tracing` event.
#[derive(Debug, Default)]
pub struct FieldVisitor {
    pub fields: Fields,
    pub message: Option<String>,
    pub error: Option<ErrorInfo>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.insert(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    /// `tracing` hands errors over as `dyn Error`, so the concrete type is
    /// gone by the time they get here. The exception is named after the
    /// field instead (`error = &e` gives type `error`); message and cause
    /// chain are kept.
    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
        if self.error.is_none() {
            let mut error = ErrorInfo::from_error(value);
            error.kind = field.name().to_string();
            self.error = Some(error);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }
}

//! Logging pipeline and logger handles.
//!
//! A [`Logging`] value is the constructed pipeline: level gate, formatter,
//! sink and trace provider. Services usually build one at startup and
//! install it as the process default with [`configure`] or [`install`];
//! [`get_logger`] handles resolve that default at each emission.
//!
//! ```
//! use std::sync::Arc;
//! use rag_observability::{context, fields, Config, Logging, MemorySink};
//!
//! let sink = Arc::new(MemorySink::new());
//! let logging = Logging::builder(Config::default()).sink(sink.clone()).build();
//! let logger = logging.logger("ingest");
//!
//! let _scope = context::with_context(fields! { "request_id" => "r1" });
//! logger.info("start", None);
//! assert!(sink.records()[0].contains("[\"start\"] [request_id=r1]"));
//! ```

use crate::config::Config;
use crate::context;
use crate::format::RecordFormatter;
use crate::level::Level;
use crate::record::{ErrorInfo, LogEvent, SourceLocation};
use crate::sink::{ConsoleSink, LogSink};
use crate::trace::{self, NoopTraceProvider, ScopedTraceProvider, TraceContextProvider};
use crate::value::Fields;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};

struct Pipeline {
    config: Config,
    formatter: Box<dyn RecordFormatter>,
    sink: Arc<dyn LogSink>,
    tracer: Arc<dyn TraceContextProvider>,
}

/// A constructed logging pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Logging {
    inner: Arc<Pipeline>,
}

impl fmt::Debug for Logging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logging")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Logging {
    /// Pipeline writing to stdout.
    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> LoggingBuilder {
        LoggingBuilder {
            config,
            sink: None,
            tracer: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.inner.config.level
    }

    /// A logger bound to this pipeline.
    pub fn logger(&self, name: impl Into<String>) -> Logger {
        Logger {
            name: logger_name(name),
            target: Target::Bound(self.clone()),
        }
    }

    /// Render `event` against the calling flow's context and write it.
    ///
    /// **Parameters**
    /// - `event`: the record to write. Its own fields are merged over the
    ///   calling flow's context fields.
    ///
    /// **Behavior**
    /// - Records below the configured level are dropped before formatting.
    /// - Trace correlation comes from the pipeline's trace provider, which
    ///   by default reads the active [`with_trace`](context::with_trace) scope.
    /// - The rendered line reaches the sink in one write.
    /// - Never fails: a sink error is reported on stderr and the record is lost.
    pub fn emit(&self, event: &LogEvent) {
        if !self.enabled(event.level) {
            return;
        }
        let context = context::snapshot();
        let trace = trace::query(self.inner.tracer.as_ref());
        let record = self.inner.formatter.format(event, &context, trace.as_ref());
        if let Err(e) = self.inner.sink.write_record(&record) {
            eprintln!("error writing log record: {}", e);
        }
    }

    pub fn flush(&self) {
        if let Err(e) = self.inner.sink.flush() {
            eprintln!("error flushing log sink: {}", e);
        }
    }
}

pub struct LoggingBuilder {
    config: Config,
    sink: Option<Arc<dyn LogSink>>,
    tracer: Option<Arc<dyn TraceContextProvider>>,
}

impl LoggingBuilder {
    /// Where records go. Defaults to stdout.
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Source of trace correlation. Defaults to [`ScopedTraceProvider`] when
    /// `trace_correlation` is on and [`NoopTraceProvider`] otherwise.
    pub fn trace_provider(mut self, tracer: Arc<dyn TraceContextProvider>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn build(self) -> Logging {
        let tracer = self.tracer.unwrap_or_else(|| {
            if self.config.trace_correlation {
                Arc::new(ScopedTraceProvider)
            } else {
                Arc::new(NoopTraceProvider)
            }
        });
        let formatter = self.config.format.formatter(&self.config.service);
        Logging {
            inner: Arc::new(Pipeline {
                formatter,
                sink: self.sink.unwrap_or_else(|| Arc::new(ConsoleSink::stdout())),
                tracer,
                config: self.config,
            }),
        }
    }
}

static DEFAULT: RwLock<Option<Logging>> = RwLock::new(None);

/// Build a stdout pipeline from `config` and make it the process default,
/// replacing any previous one.
///
/// **Parameters**
/// - `config`: level, format and service identity of the pipeline.
///
/// **Returns**
/// - The installed [`Logging`]. Loggers from [`get_logger`] pick it up on
///   their next call.
pub fn configure(config: Config) -> Logging {
    let logging = Logging::new(config);
    install(logging.clone());
    logging
}

/// Make `logging` the process default, replacing any previous one.
pub fn install(logging: Logging) {
    *DEFAULT.write().unwrap_or_else(PoisonError::into_inner) = Some(logging);
}

/// The current process default, if one has been installed.
pub fn installed() -> Option<Logging> {
    DEFAULT.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// A logger that writes through whichever pipeline is the process default
/// at the time of each call. Records emitted before any pipeline is
/// installed are discarded.
pub fn get_logger(name: impl Into<String>) -> Logger {
    Logger {
        name: logger_name(name),
        target: Target::Default,
    }
}

fn logger_name(name: impl Into<String>) -> Arc<str> {
    let name: String = name.into();
    Arc::from(name)
}

#[derive(Debug, Clone)]
enum Target {
    Default,
    Bound(Logging),
}

/// Named logging handle.
#[derive(Debug, Clone)]
pub struct Logger {
    name: Arc<str>,
    target: Target,
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn pipeline(&self) -> Option<Logging> {
        match &self.target {
            Target::Default => installed(),
            Target::Bound(logging) => Some(logging.clone()),
        }
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.pipeline().is_some_and(|logging| logging.enabled(level))
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.emit_at(level, message.into(), fields.into(), None, Location::caller());
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.emit_at(Level::Debug, message.into(), fields.into(), None, Location::caller());
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.emit_at(Level::Info, message.into(), fields.into(), None, Location::caller());
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.emit_at(Level::Warning, message.into(), fields.into(), None, Location::caller());
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.emit_at(Level::Error, message.into(), fields.into(), None, Location::caller());
    }

    /// ERROR record carrying the type, message and cause chain of `err`.
    #[track_caller]
    pub fn error_with<E: Error + ?Sized>(
        &self,
        message: impl Into<String>,
        fields: impl Into<Option<Fields>>,
        err: &E,
    ) {
        self.emit_at(
            Level::Error,
            message.into(),
            fields.into(),
            Some(ErrorInfo::from_error(err)),
            Location::caller(),
        );
    }

    pub(crate) fn emit_at(
        &self,
        level: Level,
        message: String,
        fields: Option<Fields>,
        error: Option<ErrorInfo>,
        location: &Location<'_>,
    ) {
        let Some(logging) = self.pipeline() else {
            return;
        };
        if !logging.enabled(level) {
            return;
        }
        let mut event = LogEvent::new(level, &*self.name, message)
            .at(SourceLocation::from_caller(location))
            .with_fields(fields.unwrap_or_default());
        event.error = error;
        logging.emit(&event);
    }
}

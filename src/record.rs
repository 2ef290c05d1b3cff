use crate::level::Level;
use crate::value::Fields;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::panic::Location;
use std::path::Path;

/// One log emission, produced by the emitting call and consumed
/// immediately by the formatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    /// Capture instant, taken once per event.
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger: String,
    pub location: SourceLocation,
    pub message: String,
    /// Call-site structured data, in the order provided.
    pub fields: Fields,
    pub error: Option<ErrorInfo>,
}

impl LogEvent {
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            location: SourceLocation::default(),
            message: message.into(),
            fields: Fields::new(),
            error: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Pin the timestamp, e.g. to render a record deterministically.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Best-effort origin of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// File stem of the emitting source file (`handlers` for `src/handlers.rs`).
    pub module: String,
    pub line: Option<u32>,
    /// Enclosing function or span name, when known.
    pub function: Option<String>,
}

impl SourceLocation {
    pub fn from_caller(location: &Location<'_>) -> Self {
        SourceLocation {
            module: module_from_file(location.file()),
            line: Some(location.line()),
            function: None,
        }
    }

    pub fn from_metadata(meta: &tracing::Metadata<'_>) -> Self {
        let module = match (meta.file(), meta.module_path()) {
            (Some(file), _) => module_from_file(file),
            (None, Some(path)) => path.rsplit("::").next().unwrap_or(path).to_string(),
            (None, None) => meta.target().to_string(),
        };
        SourceLocation {
            module,
            line: meta.line(),
            function: None,
        }
    }
}

fn module_from_file(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file)
        .to_string()
}

/// A captured failure attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Short type name, e.g. `ParseIntError`.
    pub kind: String,
    pub message: String,
    /// Rendered cause chain, outermost cause first.
    pub frames: Vec<String>,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorInfo {
            kind: kind.into(),
            message: message.into(),
            frames: Vec::new(),
        }
    }

    /// Capture the type name, display message and `source()` chain of `err`.
    pub fn from_error<E: Error + ?Sized>(err: &E) -> Self {
        let mut frames = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            frames.push(cause.to_string());
            source = cause.source();
        }
        ErrorInfo {
            kind: short_type_name(std::any::type_name::<E>()).to_string(),
            message: err.to_string(),
            frames,
        }
    }
}

/// `core::num::error::ParseIntError` -> `ParseIntError`,
/// `dyn core::error::Error + Send` -> `Error`.
fn short_type_name(full: &str) -> &str {
    let name = full.strip_prefix("dyn ").unwrap_or(full);
    let end = name.find(['<', ' ']).unwrap_or(name.len());
    let path = &name[..end];
    path.rsplit("::").next().unwrap_or(path)
}

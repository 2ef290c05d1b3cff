//! Record rendering policies.
//!
//! A formatter is a pure function of the event, the context snapshot taken
//! at emission time and the trace correlation (if any). Exactly one policy is
//! active per pipeline, chosen by [`OutputFormat`].

mod json;
mod readable;

pub use json::JsonFormatter;
pub use readable::{render_value, ReadableFormatter};

use crate::config::ServiceInfo;
use crate::record::LogEvent;
use crate::trace::TraceContext;
use crate::value::Fields;
use std::fmt;
use std::str::FromStr;

/// Renders one event into one output line (without trailing newline).
pub trait RecordFormatter: Send + Sync {
    fn format(&self, event: &LogEvent, context: &Fields, trace: Option<&TraceContext>) -> String;
}

/// Which rendering policy a pipeline uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// `[timestamp] [LEVEL] [module:line] ["message"] [key=value] ...`
    #[default]
    Readable,
    /// One JSON object per line.
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Readable => "readable",
            OutputFormat::Json => "json",
        }
    }

    /// Build the formatter for this policy.
    pub fn formatter(&self, service: &ServiceInfo) -> Box<dyn RecordFormatter> {
        match self {
            OutputFormat::Readable => Box::new(ReadableFormatter),
            OutputFormat::Json => Box::new(JsonFormatter::new(service.clone())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log format {0:?} (expected readable or json)")]
pub struct ParseFormatError(pub String);

impl FromStr for OutputFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "readable" | "text" | "bracketed" => Ok(OutputFormat::Readable),
            "json" | "structured" => Ok(OutputFormat::Json),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::record::SourceLocation;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_format_names() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("readable".parse::<OutputFormat>(), Ok(OutputFormat::Readable));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn both_policies_are_deterministic() {
        let event = LogEvent::new(Level::Info, "ingest", "chunk created")
            .with_timestamp(Utc.with_ymd_and_hms(2025, 12, 31, 18, 42, 23).unwrap())
            .at(SourceLocation {
                module: "chunker".to_string(),
                line: Some(42),
                function: None,
            })
            .with_fields(crate::fields! { "size" => 1024, "ratio" => 0.5 });
        let context = crate::fields! { "request_id" => "r1" };

        for format in [OutputFormat::Readable, OutputFormat::Json] {
            let formatter = format.formatter(&ServiceInfo::default());
            assert_eq!(
                formatter.format(&event, &context, None),
                formatter.format(&event, &context, None)
            );
        }
    }
}

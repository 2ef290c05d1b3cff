//! Trace correlation.
//!
//! The formatter asks a [`TraceContextProvider`] for the active trace on
//! every record. Which provider is used is decided once, when the pipeline is
//! built: [`ScopedTraceProvider`] reports the trace entered with
//! [`crate::context::with_trace`], [`NoopTraceProvider`] never reports one.

use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

/// Identifiers of the active distributed trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TraceContext {
    /// 32 lowercase hex characters.
    pub trace_id: String,
    /// 16 lowercase hex characters.
    pub span_id: String,
    pub flags: u8,
}

impl TraceContext {
    pub fn new(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        flags: u8,
    ) -> Result<Self, TraceParseError> {
        let trace_id = trace_id.into().to_ascii_lowercase();
        let span_id = span_id.into().to_ascii_lowercase();
        if !is_valid_trace_id(&trace_id) {
            return Err(TraceParseError::InvalidTraceId(trace_id));
        }
        if !is_valid_span_id(&span_id) {
            return Err(TraceParseError::InvalidSpanId(span_id));
        }
        Ok(TraceContext {
            trace_id,
            span_id,
            flags,
        })
    }

    /// Parse a W3C `traceparent` header: `00-<trace_id>-<span_id>-<flags>`.
    pub fn from_traceparent(header: &str) -> Result<Self, TraceParseError> {
        let parts: Vec<&str> = header.trim().split('-').collect();
        if parts.len() != 4 {
            return Err(TraceParseError::Malformed(header.to_string()));
        }
        if parts[0].len() != 2 || parts[0].eq_ignore_ascii_case("ff") {
            return Err(TraceParseError::UnsupportedVersion(parts[0].to_string()));
        }
        let flags = u8::from_str_radix(parts[3], 16)
            .ok()
            .filter(|_| parts[3].len() == 2)
            .ok_or_else(|| TraceParseError::Malformed(header.to_string()))?;
        TraceContext::new(parts[1], parts[2], flags)
    }

    pub fn to_traceparent(&self) -> String {
        format!("00-{}-{}-{:02x}", self.trace_id, self.span_id, self.flags)
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & 0x01 == 0x01
    }

    fn is_well_formed(&self) -> bool {
        is_valid_trace_id(&self.trace_id) && is_valid_span_id(&self.span_id)
    }
}

impl FromStr for TraceContext {
    type Err = TraceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TraceContext::from_traceparent(s)
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_traceparent())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceParseError {
    #[error("malformed traceparent: {0:?}")]
    Malformed(String),

    #[error("unsupported traceparent version: {0:?}")]
    UnsupportedVersion(String),

    #[error("invalid trace id: {0:?}")]
    InvalidTraceId(String),

    #[error("invalid span id: {0:?}")]
    InvalidSpanId(String),
}

/// 32 hex characters, not all zero.
pub fn is_valid_trace_id(trace_id: &str) -> bool {
    is_hex_id(trace_id, 32)
}

/// 16 hex characters, not all zero.
pub fn is_valid_span_id(span_id: &str) -> bool {
    is_hex_id(span_id, 16)
}

fn is_hex_id(id: &str, len: usize) -> bool {
    id.len() == len
        && id.chars().all(|c| c.is_ascii_hexdigit())
        && id.chars().any(|c| c != '0')
}

/// Source of the trace correlation attached to records.
pub trait TraceContextProvider: Send + Sync {
    /// The active, recording trace, if any.
    fn current_trace(&self) -> Option<TraceContext>;
}

/// Provider used when trace correlation is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTraceProvider;

impl TraceContextProvider for NoopTraceProvider {
    fn current_trace(&self) -> Option<TraceContext> {
        None
    }
}

/// Reports the innermost trace entered on the calling flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedTraceProvider;

impl TraceContextProvider for ScopedTraceProvider {
    fn current_trace(&self) -> Option<TraceContext> {
        crate::context::current_trace()
    }
}

impl<F> TraceContextProvider for F
where
    F: Fn() -> Option<TraceContext> + Send + Sync,
{
    fn current_trace(&self) -> Option<TraceContext> {
        self()
    }
}

/// Query `provider` without letting it take the log call down: a panic or a
/// malformed answer both mean "no trace".
pub(crate) fn query(provider: &dyn TraceContextProvider) -> Option<TraceContext> {
    catch_unwind(AssertUnwindSafe(|| provider.current_trace()))
        .ok()
        .flatten()
        .filter(TraceContext::is_well_formed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    #[test]
    fn parses_traceparent() {
        let header = format!("00-{}-{}-01", TRACE_ID, SPAN_ID);
        let trace: TraceContext = header.parse().unwrap();
        assert_eq!(trace.trace_id, TRACE_ID);
        assert_eq!(trace.span_id, SPAN_ID);
        assert!(trace.is_sampled());
        assert_eq!(trace.to_traceparent(), header);
    }

    #[test]
    fn rejects_bad_traceparents() {
        assert!(TraceContext::from_traceparent("garbage").is_err());
        assert!(TraceContext::from_traceparent(&format!("ff-{}-{}-01", TRACE_ID, SPAN_ID)).is_err());
        assert!(TraceContext::from_traceparent(&format!("00-{}-{}-1", TRACE_ID, SPAN_ID)).is_err());
        assert_eq!(
            TraceContext::from_traceparent(&format!("00-{}-{}-01", "0".repeat(32), SPAN_ID)),
            Err(TraceParseError::InvalidTraceId("0".repeat(32)))
        );
    }

    #[test]
    fn ids_are_normalized_to_lowercase() {
        let trace = TraceContext::new(TRACE_ID.to_uppercase(), SPAN_ID, 0).unwrap();
        assert_eq!(trace.trace_id, TRACE_ID);
        assert!(!trace.is_sampled());
    }

    #[test]
    fn query_survives_panicking_provider() {
        let provider = || -> Option<TraceContext> { panic!("collector unreachable") };
        assert_eq!(query(&provider), None);
    }

    #[test]
    fn query_drops_malformed_answers() {
        let provider = || {
            Some(TraceContext {
                trace_id: "short".to_string(),
                span_id: SPAN_ID.to_string(),
                flags: 1,
            })
        };
        assert_eq!(query(&provider), None);
        assert_eq!(query(&NoopTraceProvider), None);
    }
}

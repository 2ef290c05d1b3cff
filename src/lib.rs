//! Shared observability for document-pipeline services: leveled logging with
//! flow-scoped context fields, trace correlation, timed operations, a bridge
//! for `tracing` events, and a typed cache facade.

pub mod value;
pub mod level;
pub mod record;
pub mod context;
pub mod trace;
pub mod format;
pub mod sink;
pub mod noop_sink;
pub mod config;
pub mod logger;
pub mod timed;
pub mod layer;
pub mod init;
pub mod observability;
pub mod cache;

pub use cache::{CacheClient, CacheError, KeyTtl, KvStore, MemoryStore};
pub use config::{CacheConfig, Config, ConfigError, ServiceInfo};
pub use context::{ContextFutureExt, ContextGuard};
pub use format::OutputFormat;
pub use init::{init_tracing, InitError};
pub use layer::ContextLayer;
pub use level::Level;
pub use logger::{configure, get_logger, install, Logger, Logging, LoggingBuilder};
pub use noop_sink::NoopSink;
pub use observability::{Bridge, Observability, ObservabilityConfig};
pub use record::{ErrorInfo, LogEvent, SourceLocation};
pub use sink::{ConsoleSink, LogSink, MemorySink, WriterSink};
pub use timed::Timer;
pub use trace::{NoopTraceProvider, ScopedTraceProvider, TraceContext, TraceContextProvider};
pub use value::{Fields, Value};

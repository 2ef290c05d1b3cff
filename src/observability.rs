//! One-call setup for a service: logging pipeline, trace correlation and the
//! `tracing` bridge.
//!
//! ```no_run
//! use rag_observability::{Observability, ObservabilityConfig};
//!
//! let config = ObservabilityConfig::from_env("chunking-service").expect("bad environment");
//! let observability = Observability::init(config);
//! observability.logger("chunking").info("ready", None);
//! ```

use crate::config::{Config, ConfigError};
use crate::fields;
use crate::init;
use crate::logger::{self, Logger, Logging};
use crate::sink::{ConsoleSink, LogSink};
use std::sync::Arc;

/// Settings for [`Observability::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub logging: Config,
    /// Attach flow trace correlation to records and bridge `tracing` events.
    pub tracing_enabled: bool,
}

impl ObservabilityConfig {
    /// Read the environment. A non-empty `service_name` takes precedence
    /// over `SERVICE_NAME`.
    pub fn from_env(service_name: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        service_name: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut logging = Config::from_lookup(lookup)?;
        if !service_name.is_empty() {
            logging.service.name = service_name.to_string();
        }
        Ok(ObservabilityConfig {
            tracing_enabled: logging.trace_correlation,
            logging,
        })
    }
}

/// State of the global `tracing` bridge after [`Observability::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bridge {
    /// Tracing is disabled; nothing was installed.
    Disabled,
    Installed,
    /// Another subscriber (usually an earlier `init`) already owns the
    /// global default.
    AlreadyInstalled,
}

/// Constructed observability state for a service.
#[derive(Debug, Clone)]
pub struct Observability {
    config: ObservabilityConfig,
    logging: Logging,
    bridge: Bridge,
}

impl Observability {
    /// Set up observability writing to stdout. See [`Observability::init_with_sink`].
    pub fn init(config: ObservabilityConfig) -> Self {
        Self::init_with_sink(config, Arc::new(ConsoleSink::stdout()))
    }

    /// Set up observability for one service.
    ///
    /// **Parameters**
    /// - `config`: logging configuration plus whether to bridge `tracing`.
    /// - `sink`: where rendered records go.
    ///
    /// **Effects**
    /// - Installs the pipeline as the process default, replacing any earlier one.
    /// - Installs the `tracing` bridge when tracing is enabled. A global
    ///   subscriber set by someone else is left alone and reported through
    ///   [`Bridge::AlreadyInstalled`].
    /// - Logs `"<service> observability initialized"` at INFO.
    pub fn init_with_sink(config: ObservabilityConfig, sink: Arc<dyn LogSink>) -> Self {
        let mut logging_config = config.logging.clone();
        logging_config.trace_correlation = config.tracing_enabled;
        let logging = Logging::builder(logging_config).sink(sink).build();
        logger::install(logging.clone());

        let bridge = if !config.tracing_enabled {
            Bridge::Disabled
        } else {
            match init::init_tracing() {
                Ok(()) => Bridge::Installed,
                Err(_) => Bridge::AlreadyInstalled,
            }
        };

        let service = &config.logging.service.name;
        logging.logger(service.as_str()).info(
            format!("{} observability initialized", service),
            fields! {
                "tracing_enabled" => config.tracing_enabled,
                "log_format" => config.logging.format.as_str(),
            },
        );

        Observability {
            config,
            logging,
            bridge,
        }
    }

    pub fn config(&self) -> &ObservabilityConfig {
        &self.config
    }

    pub fn logging(&self) -> &Logging {
        &self.logging
    }

    pub fn bridge(&self) -> Bridge {
        self.bridge
    }

    /// A logger bound to this pipeline.
    pub fn logger(&self, name: impl Into<String>) -> Logger {
        self.logging.logger(name)
    }
}

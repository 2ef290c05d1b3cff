//! Environment-driven configuration.
//!
//! These are helpers; the pipeline itself only ever sees a constructed
//! [`Config`], never the environment.

use crate::format::OutputFormat;
use crate::level::Level;
use std::time::Duration;

/// Minimum severity emitted: DEBUG, INFO, WARNING or ERROR.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Rendering policy: `readable` or `json`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Whether timed operations also log a start marker.
pub const LOG_TIMED_START_ENV: &str = "LOG_TIMED_START";

pub const SERVICE_NAME_ENV: &str = "SERVICE_NAME";
pub const SERVICE_VERSION_ENV: &str = "SERVICE_VERSION";
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";

/// Trace correlation and the `tracing` bridge.
pub const TRACING_ENABLED_ENV: &str = "TRACING_ENABLED";

/// Default cache TTL in seconds.
pub const CACHE_TTL_SECONDS_ENV: &str = "CACHE_TTL_SECONDS";

/// Per-operation cache timeout in seconds.
pub const CACHE_TIMEOUT_SECONDS_ENV: &str = "CACHE_TIMEOUT_SECONDS";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Level(#[from] crate::level::ParseLevelError),

    #[error(transparent)]
    Format(#[from] crate::format::ParseFormatError),

    #[error("{key} must be a boolean, got {value:?}")]
    Bool { key: String, value: String },

    #[error("{key} must be a non-negative number, got {value:?}")]
    Number { key: String, value: String },
}

/// Identity attached to structured records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        ServiceInfo {
            name: "unknown-service".to_string(),
            version: "1.0.0".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub level: Level,
    pub format: OutputFormat,
    pub service: ServiceInfo,
    /// Emit `"<op> started"` from timed operations.
    pub timed_start: bool,
    /// Attach the flow's trace correlation to records.
    pub trace_correlation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            level: Level::Info,
            format: OutputFormat::Readable,
            service: ServiceInfo::default(),
            timed_start: false,
            trace_correlation: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let service = ServiceInfo {
            name: lookup(SERVICE_NAME_ENV).unwrap_or(defaults.service.name),
            version: lookup(SERVICE_VERSION_ENV).unwrap_or(defaults.service.version),
            environment: lookup(ENVIRONMENT_ENV).unwrap_or(defaults.service.environment),
        };

        Ok(Config {
            level: match lookup(LOG_LEVEL_ENV) {
                Some(raw) => raw.parse()?,
                None => defaults.level,
            },
            format: match lookup(LOG_FORMAT_ENV) {
                Some(raw) => raw.parse()?,
                None => defaults.format,
            },
            service,
            timed_start: parse_bool(&lookup, LOG_TIMED_START_ENV, defaults.timed_start)?,
            trace_correlation: parse_bool(&lookup, TRACING_ENABLED_ENV, defaults.trace_correlation)?,
        })
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_service(mut self, service: ServiceInfo) -> Self {
        self.service = service;
        self
    }
}

/// Cache facade configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when `store` is called without one.
    pub default_ttl: Duration,
    /// Upper bound on each store round trip.
    pub timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            default_ttl: Duration::from_secs(3600),
            timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = CacheConfig::default();
        Ok(CacheConfig {
            default_ttl: parse_secs(&lookup, CACHE_TTL_SECONDS_ENV, defaults.default_ttl)?,
            timeout: parse_secs(&lookup, CACHE_TIMEOUT_SECONDS_ENV, defaults.timeout)?,
        })
    }
}

pub(crate) fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Bool {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ConfigError::Number {
            key: key.to_string(),
            value: raw,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.service.name, "unknown-service");
    }

    #[test]
    fn reads_all_logging_keys() {
        let config = Config::from_lookup(lookup(&[
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "json"),
            ("LOG_TIMED_START", "yes"),
            ("SERVICE_NAME", "chunker"),
            ("SERVICE_VERSION", "2.3.0"),
            ("ENVIRONMENT", "staging"),
            ("TRACING_ENABLED", "false"),
        ]))
        .unwrap();
        assert_eq!(config.level, Level::Debug);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.timed_start);
        assert!(!config.trace_correlation);
        assert_eq!(config.service.name, "chunker");
        assert_eq!(config.service.version, "2.3.0");
        assert_eq!(config.service.environment, "staging");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("LOG_LEVEL", "loud")])),
            Err(ConfigError::Level(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("TRACING_ENABLED", "maybe")])),
            Err(ConfigError::Bool { .. })
        ));
        assert!(matches!(
            CacheConfig::from_lookup(lookup(&[("CACHE_TTL_SECONDS", "-1")])),
            Err(ConfigError::Number { .. })
        ));
    }

    #[test]
    fn reads_cache_durations() {
        let config = CacheConfig::from_lookup(lookup(&[
            ("CACHE_TTL_SECONDS", "60"),
            ("CACHE_TIMEOUT_SECONDS", "0.5"),
        ]))
        .unwrap();
        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert_eq!(config.timeout, Duration::from_millis(500));
    }
}

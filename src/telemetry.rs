//! Log output for the ingest binary.
//!
//! Logs go to stderr so stdout carries only the run report. Unless `RUST_LOG`
//! is set, the crate logs at the configured level while sqlx statement
//! logging and HTTP client internals are kept at `warn`.

use log::LevelFilter;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Targets that are noisy at the crate's level
const QUIET_TARGETS: &[&str] = &["sqlx", "sea_orm", "hyper", "reqwest", "rustls"];

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("unknown log format '{0}' (expected json, pretty or compact)")]
    UnknownFormat(String),
    #[error("invalid log filter '{directives}': {source}")]
    Filter {
        directives: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to route `log` records into tracing: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self, TelemetryInitError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" | "text" => Ok(LogFormat::Compact),
            other => Err(TelemetryInitError::UnknownFormat(other.to_string())),
        }
    }
}

/// Filter directives for a run: an explicit `RUST_LOG` wins, otherwise the
/// configured level with the quiet targets capped at `warn`.
pub fn filter_directives(log_level: &str, rust_log: Option<&str>) -> String {
    if let Some(explicit) = rust_log.map(str::trim).filter(|v| !v.is_empty()) {
        return explicit.to_string();
    }

    let mut directives = vec![log_level.trim().to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
    directives.join(",")
}

/// Install the global subscriber. Call once, before the first log line.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    let format = LogFormat::parse(&config.log_format)?;
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(&config.log_level, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directives).map_err(|source| TelemetryInitError::Filter {
        directives: directives.clone(),
        source,
    })?;

    // sqlx reports statements through the `log` facade
    LogTracer::builder()
        .with_max_level(LevelFilter::Debug)
        .init()?;

    let output = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_quiet_driver_logs() {
        let directives = filter_directives("debug", None);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("sqlx=warn"));
        assert!(directives.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        assert_eq!(
            filter_directives("info", Some("activity_ingest=trace")),
            "activity_ingest=trace"
        );
        // Blank RUST_LOG is treated as unset
        assert!(filter_directives("info", Some("  ")).starts_with("info,"));
    }

    #[test]
    fn log_format_names() {
        assert_eq!(LogFormat::parse("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("text").unwrap(), LogFormat::Compact);
        assert!(matches!(
            LogFormat::parse("xml"),
            Err(TelemetryInitError::UnknownFormat(f)) if f == "xml"
        ));
    }
}

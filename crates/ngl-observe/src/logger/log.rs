use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::time::OffsetTime, layer::Layered,
    layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError};

/// Subscriber stack every output layer is stacked on.
type Filtered = Layered<EnvFilter, Registry>;

pub struct Logger;

impl Logger {
    pub fn text(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_file(cfg.with_source)
            .with_line_number(cfg.with_source)
            .with_timer(mk_timer());
        install(cfg, layer)
    }

    /// One object per event with the event fields at the top level, ready for a log shipper.
    pub fn json(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_file(cfg.with_source)
            .with_line_number(cfg.with_source)
            .with_timer(mk_timer());
        install(cfg, layer)
    }

    pub fn journald(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        install(cfg, mk_journald()?)
    }
}

fn install<L>(cfg: &LoggerConfig, layer: L) -> Result<(), LoggerError>
where
    L: Layer<Filtered> + Send + Sync + 'static,
{
    let filter = mk_filter(&cfg.level)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(as_error)
}

/// Build the filter; the `NIGHTINGALE_LOG` variable takes precedence over the configured directive.
pub(crate) fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    if let Ok(from_env) = std::env::var(crate::LOG_ENV)
        && !from_env.trim().is_empty()
    {
        return EnvFilter::try_new(&from_env).map_err(|_| LoggerError::InvalidLogLevel(from_env));
    }
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

/// Timestamps in the host's offset, read once before the runtime starts any thread.
fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn as_error(e: impl std::fmt::Display) -> LoggerError {
    let s = e.to_string();
    if s.contains("SetGlobalDefaultError") || s.contains("global default") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(s)
    }
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn mk_journald() -> Result<tracing_journald::Layer, LoggerError> {
    Ok(tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("nightingale".to_string()))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn mk_journald() -> Result<tracing_subscriber::layer::Identity, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

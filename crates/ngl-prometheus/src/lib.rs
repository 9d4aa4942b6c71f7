//! Prometheus text-format export of a run's outcome.
//!
//! The file is meant for the node-exporter textfile collector: it is rewritten atomically after every run.
//!
//! ## Metrics
//! - `nightingale_build_success{app}` - Gauge, 1 when the final attempt succeeded
//! - `nightingale_build_attempts{app}` - Gauge, attempts made in this run
//! - `nightingale_build_duration_seconds{app}` - Gauge, duration of the final attempt
//! - `nightingale_run_timestamp_seconds` - Gauge, unix time the run finished
mod error;
pub use error::MetricsError;

mod textfile;
pub use textfile::OutcomeMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};

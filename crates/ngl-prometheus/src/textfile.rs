use std::{path::Path, time::SystemTime};

use ngl_core::BatchOutcome;
use prometheus::{Encoder, GaugeVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::debug;

use crate::error::MetricsError;

/// Gauges describing one finished run.
#[derive(Clone)]
pub struct OutcomeMetrics {
    registry: Registry,
    success: IntGaugeVec,
    attempts: IntGaugeVec,
    duration: GaugeVec,
    timestamp: IntGauge,
}

impl OutcomeMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let success = IntGaugeVec::new(
            Opts::new(
                "nightingale_build_success",
                "1 when the final build attempt of the app succeeded",
            ),
            &["app"],
        )?;
        let attempts = IntGaugeVec::new(
            Opts::new(
                "nightingale_build_attempts",
                "Build attempts made for the app in the last run",
            ),
            &["app"],
        )?;
        let duration = GaugeVec::new(
            Opts::new(
                "nightingale_build_duration_seconds",
                "Duration of the final build attempt",
            ),
            &["app"],
        )?;
        let timestamp = IntGauge::new(
            "nightingale_run_timestamp_seconds",
            "Unix time at which the last run finished",
        )?;

        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(attempts.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(timestamp.clone()))?;

        Ok(Self {
            registry,
            success,
            attempts,
            duration,
            timestamp,
        })
    }

    pub fn record(&self, outcome: &BatchOutcome, finished: SystemTime) {
        for result in outcome.final_results() {
            let app = result.descriptor_name.as_str();
            self.success
                .with_label_values(&[app])
                .set(i64::from(result.success));
            self.attempts
                .with_label_values(&[app])
                .set(outcome.attempts(app) as i64);
            if let Some(d) = result.duration {
                self.duration
                    .with_label_values(&[app])
                    .set(d.as_secs_f64());
            }
        }
        let secs = finished
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.timestamp.set(secs);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of everything recorded so far.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Replace `path` atomically: write a sibling temporary file, then rename it over the target.
    pub fn write_textfile(&self, path: &Path) -> Result<(), MetricsError> {
        let text = self.render()?;
        let write_err = |e: std::io::Error| MetricsError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, text).map_err(write_err)?;
        std::fs::rename(&tmp, path).map_err(write_err)?;
        debug!(path = %path.display(), "metrics textfile written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use ngl_model::BuildAttemptResult;

    use super::*;

    fn outcome() -> BatchOutcome {
        BatchOutcome {
            results: vec![
                BuildAttemptResult::failed("api", 1, "image build failed")
                    .with_duration(Duration::from_secs(3)),
                BuildAttemptResult::succeeded("web", 1, "1.0", "built web:1.0")
                    .with_duration(Duration::from_millis(1500)),
                BuildAttemptResult::failed("api", 2, "image build failed")
                    .with_duration(Duration::from_secs(4)),
            ],
            rounds: 2,
            ..BatchOutcome::default()
        }
    }

    #[test]
    fn final_results_are_exported() {
        let m = OutcomeMetrics::new().unwrap();
        m.record(&outcome(), UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let text = m.render().unwrap();

        assert!(text.contains("nightingale_build_success{app=\"api\"} 0"));
        assert!(text.contains("nightingale_build_success{app=\"web\"} 1"));
        assert!(text.contains("nightingale_build_attempts{app=\"api\"} 2"));
        assert!(text.contains("nightingale_build_attempts{app=\"web\"} 1"));
        assert!(text.contains("nightingale_build_duration_seconds{app=\"api\"} 4"));
        assert!(text.contains("nightingale_build_duration_seconds{app=\"web\"} 1.5"));
        assert!(text.contains("nightingale_run_timestamp_seconds 1700000000"));
    }

    #[test]
    fn textfile_is_replaced_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nightingale.prom");
        std::fs::write(&path, "stale").unwrap();

        let m = OutcomeMetrics::new().unwrap();
        m.record(&outcome(), SystemTime::now());
        m.write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# TYPE nightingale_build_success gauge"));
        assert!(!dir.path().join("nightingale.prom.tmp").exists());
    }
}

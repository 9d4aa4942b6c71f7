use std::{collections::HashMap, fmt::Write as _, time::Duration};

use ngl_model::BuildAttemptResult;
use time::{PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description};

/// Prefix of every notification subject.
pub const SUBJECT_PREFIX: &str = "[nightingale]";

const SUBJECT_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// A composed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub body: String,
    pub success: bool,
}

pub struct ReportComposer {
    host: String,
}

impl ReportComposer {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Composer labelled with this machine's host name.
    pub fn for_this_host() -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self::new(host)
    }

    /// Summarise `results`; only the latest result of each descriptor counts.
    pub fn compose(&self, results: &[BuildAttemptResult], now: PrimitiveDateTime) -> Report {
        let latest = latest_per_descriptor(results);
        let success = latest.iter().all(|r| r.success);

        let subject = format!(
            "{SUBJECT_PREFIX} {} {} {}",
            if success { "OK" } else { "FAIL" },
            self.host,
            now.format(SUBJECT_TIME).unwrap_or_default()
        );

        let mut body = String::new();
        if latest.is_empty() {
            body.push_str("No applications were built in this run.\n");
        }
        for r in &latest {
            let _ = write!(body, "{}: ", r.descriptor_name);
            if r.success {
                body.push_str(r.version.as_deref().unwrap_or("?"));
            } else {
                let _ = write!(body, "FAILED - {}", r.message);
            }
            if let Some(d) = r.duration {
                let _ = write!(body, " ({})", human_duration(d));
            }
            body.push('\n');
        }

        Report {
            subject,
            body,
            success,
        }
    }
}

/// Last result of each descriptor, in order of first appearance.
pub fn latest_per_descriptor(results: &[BuildAttemptResult]) -> Vec<&BuildAttemptResult> {
    let mut order: Vec<&str> = Vec::new();
    let mut last: HashMap<&str, &BuildAttemptResult> = HashMap::new();
    for r in results {
        let name = r.descriptor_name.as_str();
        if last.insert(name, r).is_none() {
            order.push(name);
        }
    }
    order.into_iter().filter_map(|n| last.get(n).copied()).collect()
}

/// `42s`, `3m 05s`, `1h 02m 03s`.
pub fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m {s:02}s"),
        _ => format!("{h}h {m:02}m {s:02}s"),
    }
}

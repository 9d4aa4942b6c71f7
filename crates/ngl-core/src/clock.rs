use std::sync::Arc;

use time::{OffsetDateTime, PrimitiveDateTime};

/// Source of "now" as naive local wall-clock time.
pub type Clock = Arc<dyn Fn() -> PrimitiveDateTime + Send + Sync>;

/// Current local wall-clock time; falls back to UTC when the local offset cannot be determined.
pub fn local_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    PrimitiveDateTime::new(now.date(), now.time())
}

pub fn system_clock() -> Clock {
    Arc::new(local_now)
}

/// A clock frozen at `at`.
pub fn fixed_clock(at: PrimitiveDateTime) -> Clock {
    Arc::new(move || at)
}

//! Time-related abstractions.
//!
//! Wall-clock time for business logic (catalog freshness) comes from the
//! injectable `Clock` in `bridge-traits`; this module only covers executor
//! timing: sleeping, timeouts and monotonic instants.

pub use tokio::time::{interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

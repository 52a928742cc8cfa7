//! Clock helpers.
//!
//! Track positions travel through the system as signed milliseconds (with
//! `-1` meaning "unknown"), while timers work with [`Duration`]. These helpers
//! convert between the two without silent truncation.

use std::time::Duration;

/// Saturating millisecond accessors for [`Duration`].
pub trait DurationExt {
    fn as_millis_u64(&self) -> u64;

    /// Signed so it can be mixed with epoch timestamps.
    fn as_millis_i64(&self) -> i64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }

    fn as_millis_i64(&self) -> i64 {
        i64::try_from(self.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Current wall-clock time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Format a millisecond position as `m:ss`.
///
/// Negative values (the "unknown" sentinel) render as `0:00`.
#[must_use]
pub fn format_clock(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    format!("{minutes}:{seconds:02}")
}

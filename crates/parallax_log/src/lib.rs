//! Logging for the Parallax scheduler.

use std::time::Duration;

pub use log::Level;

/// Number of decimals kept when formatting durations.
const DURATION_DECIMALS: usize = 2;

/// A sink for scheduler lifecycle messages.
///
/// The scheduler and its workers emit one line per terminal task event
/// (completion, failure or cancellation). The sink is supplied by the caller,
/// so embedders can route messages into their own logging infrastructure.
pub trait LogSink: Send + Sync {
    /// Consumes a formatted message at the given severity.
    fn log(&self, level: Level, message: &str);
}

/// The default [`LogSink`], forwarding every message to the global logger
/// registered with the [`log`] crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct FacadeSink;

impl LogSink for FacadeSink {
    fn log(&self, level: Level, message: &str) {
        log::log!(level, "{message}");
    }
}

/// Formats a duration as a human-friendly quantity with an appropriate unit,
/// from nanoseconds up to weeks.
///
/// Values are rounded to two decimals and trailing zeros are trimmed, so
/// exact quantities print without a fraction (`"3 seconds"`, not
/// `"3.00 seconds"`).
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs_f64();
    let (value, unit) = if seconds < 1e-6 {
        (seconds * 1e9, "nanosecond")
    } else if seconds < 1e-3 {
        (seconds * 1e6, "microsecond")
    } else if seconds < 1.0 {
        (seconds * 1e3, "millisecond")
    } else if seconds < 60.0 {
        (seconds, "second")
    } else if seconds < 3600.0 {
        (seconds / 60.0, "minute")
    } else if seconds < 86_400.0 {
        (seconds / 3600.0, "hour")
    } else if seconds < 604_800.0 {
        (seconds / 86_400.0, "day")
    } else {
        (seconds / 604_800.0, "week")
    };

    let scale = 10f64.powi(DURATION_DECIMALS as i32);
    let rounded = (value * scale).round() / scale;

    let mut quantity = format!("{rounded:.DURATION_DECIMALS$}");
    if quantity.contains('.') {
        quantity = quantity
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string();
    }

    if rounded == 1.0 {
        format!("{quantity} {unit}")
    } else {
        format!("{quantity} {unit}s")
    }
}

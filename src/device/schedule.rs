use chrono::DateTime;

use super::hal::Timestamp;

pub const MILLISECONDS_IN_SECOND: i64 = 1000;

/// Smallest `t >= now` that is a whole multiple of `interval` since the epoch.
///
/// Saturates to the last representable multiple when `now` is within one
/// interval of `u32::MAX`.
pub fn align_to_interval(now: u32, interval: u32) -> u32 {
    debug_assert!(interval > 0);
    let remainder = now % interval;
    if remainder == 0 {
        return now;
    }
    now.checked_add(interval - remainder)
        .unwrap_or(u32::MAX - u32::MAX % interval)
}

/// Signed time from `now` until `target` seconds; zero or negative once passed.
pub fn milliseconds_until(target: u32, now: Timestamp) -> i64 {
    target as i64 * MILLISECONDS_IN_SECOND
        - now.seconds as i64 * MILLISECONDS_IN_SECOND
        - now.milliseconds as i64
}

/// `YYYYMMDD_HHMMSS.BIN` for a UTC epoch time.
pub fn record_filename(time: u32) -> String {
    match DateTime::from_timestamp(time as i64, 0) {
        Some(t) => t.format("%Y%m%d_%H%M%S.BIN").to_string(),
        None => format!("{:010}.BIN", time),
    }
}

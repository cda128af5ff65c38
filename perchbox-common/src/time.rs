//! Timestamp utilities for the transition log
//!
//! Log timestamps are UTC wall-clock time with millisecond resolution.

use chrono::{DateTime, Datelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp as `HH:MM:SS.mmm`
pub fn format_clock_ms(at: &DateTime<Utc>) -> String {
    at.format("%H:%M:%S%.3f").to_string()
}

/// Format the run date as `YYYY/M/D` (no zero padding)
pub fn format_run_date(at: &DateTime<Utc>) -> String {
    format!("{}/{}/{}", at.year(), at.month(), at.day())
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, h, m, s).unwrap()
            + chrono::Duration::milliseconds(ms as i64)
    }

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[test]
    fn test_clock_has_millisecond_field() {
        assert_eq!(format_clock_ms(&at(9, 5, 3, 7)), "09:05:03.007");
        assert_eq!(format_clock_ms(&at(23, 59, 59, 999)), "23:59:59.999");
    }

    #[test]
    fn test_clock_whole_second() {
        assert_eq!(format_clock_ms(&at(12, 0, 0, 0)), "12:00:00.000");
    }

    #[test]
    fn test_run_date_is_unpadded() {
        assert_eq!(format_run_date(&at(0, 0, 0, 0)), "2024/3/7");
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
        assert_eq!(millis_to_duration(300), Duration::from_millis(300));
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
    }
}

//! Time helpers shared by the manager, synchronizer, and workspace layers.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, SecondsFormat, Utc};

/// Current time as epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current time as an RFC 3339 / ISO-8601 UTC timestamp.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Today's date in the local calendar, as `YYYY-MM-DD`.
///
/// Daily memory files are keyed by the user's wall-clock day, not UTC.
pub fn today_stamp() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_advances() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        // Sanity: after 2020, before 2100.
        assert!(a > 1_577_836_800_000);
        assert!(a < 4_102_444_800_000);
    }

    #[test]
    fn iso_now_is_rfc3339() {
        let ts = iso_now();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn today_stamp_shape() {
        let stamp = today_stamp();
        let parts: Vec<&str> = stamp.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 4);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2].len(), 2);
    }
}

//! Timestamp utilities for ledger lines and score records

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

/// Timestamp layout used in the ledger and the score record
pub const RECORD_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a timestamp the way ledger and score lines store it
pub fn format_record(ts: &DateTime<Utc>) -> String {
    ts.format(RECORD_FORMAT).to_string()
}

/// Parse a record timestamp back into UTC
pub fn parse_record(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), RECORD_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Consistency(format!("invalid record timestamp {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_format_record_layout() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_record(&ts), "2024-03-09 07:05:01");
    }

    #[test]
    fn test_parse_record_accepts_surrounding_whitespace() {
        let ts = parse_record(" 2024-03-09 07:05:01 ").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap());
    }

    #[test]
    fn test_parse_record_rejects_garbage() {
        let err = parse_record("yesterday").unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
    }

    #[test]
    fn test_format_parse_agree_to_the_second() {
        let ts = now();
        let parsed = parse_record(&format_record(&ts)).unwrap();
        assert_eq!(parsed.timestamp(), ts.timestamp());
    }
}

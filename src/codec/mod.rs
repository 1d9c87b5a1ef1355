//! Conversion between raw records and typed rows.

mod decoder;
mod encoder;

pub use decoder::{RecordDecoder, TextPool};
pub use encoder::RecordEncoder;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Date format used when none is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Returns true if `format` is a usable chrono strftime pattern.
pub fn is_valid_date_format(format: &str) -> bool {
    !format.is_empty() && StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// Parse a date cell into milliseconds since the Unix epoch.
///
/// Patterns with an offset are honoured; naive values are taken as UTC and
/// date-only patterns resolve to midnight.
pub fn parse_date(cell: &str, format: &str) -> Option<f64> {
    let cell = cell.trim();

    if let Ok(dt) = DateTime::parse_from_str(cell, format) {
        return Some(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(cell, format) {
        return Some(dt.and_utc().timestamp_millis() as f64);
    }
    NaiveDate::parse_from_str(cell, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}

/// Canonical text form of a stored number.
#[inline]
pub fn format_number(value: f64) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_default_format() {
        assert_eq!(
            parse_date("1970-01-02T00:00:01", DEFAULT_DATE_FORMAT),
            Some(86_401_000.0)
        );
        assert_eq!(parse_date("1970-01-02", DEFAULT_DATE_FORMAT), None);
    }

    #[test]
    fn test_parse_date_only() {
        assert_eq!(parse_date("1970-01-02", "%Y-%m-%d"), Some(86_400_000.0));
        assert_eq!(parse_date("02/01/1970", "%d/%m/%Y"), Some(86_400_000.0));
        assert_eq!(parse_date("1970-13-01", "%Y-%m-%d"), None);
    }

    #[test]
    fn test_parse_date_with_offset() {
        assert_eq!(
            parse_date("1970-01-01 01:00:00 +0100", "%Y-%m-%d %H:%M:%S %z"),
            Some(0.0)
        );
    }

    #[test]
    fn test_date_format_validation() {
        assert!(is_valid_date_format("%Y-%m-%d"));
        assert!(is_valid_date_format(DEFAULT_DATE_FORMAT));
        assert!(!is_valid_date_format("%Q"));
        assert!(!is_valid_date_format(""));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(5.1), "5.1");
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.25), "-0.25");
        assert_eq!(format_number(1e21), "1000000000000000000000");
    }
}

//! Timestamp normalization
//!
//! All recognized timestamps are rendered as RFC 3339 UTC with second precision
//! (`2024-01-01T12:00:00Z`). Unrecognized strings are kept verbatim.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Normalizes a loosely typed timestamp field
///
/// # Returns
///
/// * `Some(rfc3339)` - Epoch seconds or a recognized date string
/// * `Some(original)` - A non-empty string in an unknown format
/// * `None` - Missing, empty, non-finite, out of range, or a non-scalar value
pub fn normalize_timestamp(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                from_epoch_seconds(secs as f64)
            } else {
                n.as_f64().and_then(from_epoch_seconds)
            }
        }
        Value::String(s) => normalize_timestamp_str(s),
        _ => None,
    }
}

/// Normalizes a timestamp given as text
pub fn normalize_timestamp_str(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(format_utc(dt.with_timezone(&Utc)));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(format_utc(naive.and_utc()));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Some(format_utc(midnight.and_utc()));
        }
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(secs) = trimmed.parse::<i64>() {
            if let Some(ts) = from_epoch_seconds(secs as f64) {
                return Some(ts);
            }
        }
    }

    // Best effort: keep what the feed gave us
    Some(trimmed.to_string())
}

fn from_epoch_seconds(secs: f64) -> Option<String> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp(whole as i64, 0).map(format_utc)
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_epoch() {
        assert_eq!(
            normalize_timestamp(&json!(1609459200)),
            Some("2021-01-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_float_epoch_truncates_fraction() {
        assert_eq!(
            normalize_timestamp(&json!(1609459200.75)),
            Some("2021-01-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_rfc3339_with_offset_is_converted_to_utc() {
        assert_eq!(
            normalize_timestamp(&json!("2024-01-01T14:00:00+02:00")),
            Some("2024-01-01T12:00:00Z".to_string())
        );
        assert_eq!(
            normalize_timestamp(&json!("2024-01-01T12:00:00Z")),
            Some("2024-01-01T12:00:00Z".to_string())
        );
    }

    #[test]
    fn test_naive_formats_assume_utc() {
        assert_eq!(
            normalize_timestamp_str("2024-03-05T08:09:10"),
            Some("2024-03-05T08:09:10Z".to_string())
        );
        assert_eq!(
            normalize_timestamp_str("2024-03-05 08:09:10.123"),
            Some("2024-03-05T08:09:10Z".to_string())
        );
        assert_eq!(
            normalize_timestamp_str("2024-03-05"),
            Some("2024-03-05T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_numeric_string_is_epoch() {
        assert_eq!(
            normalize_timestamp_str("1609459200"),
            Some("2021-01-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_unknown_format_passes_through() {
        assert_eq!(
            normalize_timestamp_str("last tuesday"),
            Some("last tuesday".to_string())
        );
    }

    #[test]
    fn test_absent_values() {
        assert_eq!(normalize_timestamp(&json!(null)), None);
        assert_eq!(normalize_timestamp(&json!("")), None);
        assert_eq!(normalize_timestamp(&json!(true)), None);
        assert_eq!(normalize_timestamp(&json!({"t": 1})), None);
        assert_eq!(normalize_timestamp(&json!(1e300)), None);
    }
}

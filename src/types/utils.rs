//! Shared helpers for row mapping and timestamps.

use std::fmt::Display;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

// =============================================================================
// Timestamps
// =============================================================================

/// Render a timestamp the way it is stored: RFC 3339, whole seconds, `Z` suffix.
///
/// Fixed width, so lexical order in SQL matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp.
///
/// Also accepts the space-separated `YYYY-MM-DD HH:MM:SS` form written by
/// SQLite's `CURRENT_TIMESTAMP`, read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Read a stored timestamp column, surfacing malformed values as conversion errors.
pub fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp '{}'", raw).into(),
        )
    })
}

/// Nullable variant of [`timestamp_column`].
pub fn optional_timestamp_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(_) => timestamp_column(row, idx).map(Some),
    }
}

/// Short human form for console tables.
pub fn display_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

// =============================================================================
// Iterator Helpers
// =============================================================================

/// Filter an iterator of Results, logging errors at warn level before discarding.
///
/// Use this instead of `.filter_map(|r| r.ok())` when you want visibility into
/// what errors are being discarded.
pub fn log_filter_warn<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip_is_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 5, 13, 9, 44).unwrap();
        let stored = format_timestamp(ts);
        assert_eq!(stored, "2025-06-05T13:09:44Z");
        assert_eq!(parse_timestamp(&stored), Some(ts));
    }

    #[test]
    fn test_parse_sqlite_current_timestamp_form() {
        let ts = parse_timestamp("2025-06-05 13:09:44").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 6, 5, 13, 9, 44).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_log_filter_warn() {
        let ok: Result<i32, String> = Ok(1);
        let err: Result<i32, String> = Err("bad row".into());
        assert_eq!(log_filter_warn(ok, "test"), Some(1));
        assert_eq!(log_filter_warn(err, "test"), None);
    }
}

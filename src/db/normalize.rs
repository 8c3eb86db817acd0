//! Field-level conversion rules bridging legacy rows and the current schema.
//!
//! Each legacy column belongs to exactly one [`ColumnFamily`]; the functions
//! below are the per-family rules applied while a migration step copies rows.

use chrono::{DateTime, NaiveDateTime, Utc};
use url::Url;

use crate::error::{Result, StoreError};

/// How a legacy column's values map onto the current schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFamily {
    /// Row id, copied verbatim so foreign keys survive the migration.
    Id,
    /// Required text; an absent value becomes `""`, never null.
    Text,
    /// Optional text; an absent value stays absent.
    NullableText,
    /// Integer flag that is set only when the value is exactly 1.
    Flag,
    /// Integer flag that is set unless the value is exactly 0.
    InvertedFlag,
    /// Free-text timestamp parsed into a typed value; absent stays absent.
    Timestamp,
    /// Text that must parse as a URL.
    Url,
    /// Denormalized in the legacy schema, not carried over.
    Dropped,
}

pub fn text_or_empty(value: Option<String>) -> String {
    value.unwrap_or_default()
}

/// [`ColumnFamily::Flag`]: `notify`, `notified`.
pub fn flag_is_set(value: Option<i64>) -> bool {
    value == Some(1)
}

/// [`ColumnFamily::InvertedFlag`]: `unread` defaults to set.
pub fn flag_not_cleared(value: Option<i64>) -> bool {
    value != Some(0)
}

/// Default for `last_sync`, which no legacy column ever supplied.
pub fn epoch_start() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

pub fn parse_feed_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| StoreError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Parse the timestamp shapes found in legacy stores. Naive values are taken
/// as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// [`ColumnFamily::Timestamp`]: `pubdate`. Unparseable text is treated the
/// same as absent.
pub fn parse_pub_date(value: Option<String>) -> Option<DateTime<Utc>> {
    value.as_deref().and_then(parse_timestamp)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn absent_text_becomes_empty() {
        assert_eq!(text_or_empty(None), "");
        assert_eq!(text_or_empty(Some("tag".into())), "tag");
    }

    #[test]
    fn flag_requires_exactly_one() {
        assert!(flag_is_set(Some(1)));
        assert!(!flag_is_set(Some(0)));
        assert!(!flag_is_set(Some(2)));
        assert!(!flag_is_set(None));
    }

    #[test]
    fn inverted_flag_defaults_to_set() {
        assert!(flag_not_cleared(None));
        assert!(flag_not_cleared(Some(1)));
        assert!(!flag_not_cleared(Some(0)));
    }

    #[test]
    fn epoch_start_is_unix_zero() {
        assert_eq!(epoch_start().timestamp(), 0);
    }

    #[test]
    fn timestamps_parse_with_and_without_zone() {
        let expected = Utc.with_ymd_and_hms(2018, 2, 3, 4, 5, 0).unwrap();
        assert_eq!(parse_timestamp("2018-02-03T04:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2018-02-03 04:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2018-02-03T04:05:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn absent_pub_date_stays_absent() {
        assert_eq!(parse_pub_date(None), None);
        assert_eq!(parse_pub_date(Some("garbage".into())), None);
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(parse_feed_url("https://feedA").is_ok());
        let err = parse_feed_url("not a url").unwrap_err();
        assert!(matches!(err, StoreError::InvalidUrl { .. }));
    }
}

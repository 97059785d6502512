use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};

/// `yyyy-MM-dd` label used for date headers and staging sheet names.
pub fn date_label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_label(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date {value:?}, expected yyyy-MM-dd"))
}

/// Parse a tracker timestamp such as `2024-01-10T09:15:00.000+0000`.
/// RFC 3339 (`+00:00` offsets) is accepted too.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .with_context(|| format!("Invalid tracker timestamp {value:?}"))
}

pub fn utc_today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

//! Fixed-pattern date-time exchange format.
//!
//! All timestamps cross the service boundary as `yyyy-MM-dd HH:mm:ss`
//! strings without a zone. Internally they are [`NaiveDateTime`] values
//! interpreted as UTC.

use chrono::NaiveDateTime;

use crate::error::ValidationRule;

/// `strftime` pattern for `yyyy-MM-dd HH:mm:ss`.
pub const DATE_TIME_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a fixed-pattern date-time string.
///
/// # Errors
///
/// Returns [`ValidationRule::MalformedDateTime`] if the input does not
/// match [`DATE_TIME_PATTERN`].
pub fn parse_date_time(raw: &str) -> Result<NaiveDateTime, ValidationRule> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_TIME_PATTERN)
        .map_err(|_| ValidationRule::MalformedDateTime(raw.to_string()))
}

/// Formats a timestamp with [`DATE_TIME_PATTERN`].
#[must_use]
pub fn format_date_time(value: NaiveDateTime) -> String {
    value.format(DATE_TIME_PATTERN).to_string()
}

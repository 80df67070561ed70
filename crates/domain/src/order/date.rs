use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::OrderError;

const NAIVE_DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses the optional requested date of an order.
///
/// Accepts RFC 3339 timestamps, date-times without an offset, and bare
/// `YYYY-MM-DD` dates; anything without an offset is taken as UTC. A
/// missing or blank value means `now`.
pub fn parse_order_date(
    raw: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, OrderError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(now);
    };

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }

    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(date.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
        .ok_or_else(|| OrderError::InvalidDate(raw.to_string()))
}

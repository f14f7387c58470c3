use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ApiError;

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("date {:?} is not YYYY-MM-DD", raw.trim())))
}

/// Parse an `HH:MM` time of day.
pub fn parse_time(raw: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ApiError::validation(format!("time {:?} is not HH:MM", raw.trim())))
}

/// Place a wall-clock time on `date` in `tz` and convert it to UTC.
///
/// Ambiguous times (clocks going back) resolve to the earlier instant; times
/// that do not exist (clocks going forward) are rejected.
pub fn combine(date: NaiveDate, time: NaiveTime, tz: Tz) -> Result<DateTime<Utc>, ApiError> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(ApiError::validation(format!(
            "{} {} does not exist in {}",
            date,
            time.format("%H:%M"),
            tz.name()
        ))),
    }
}

/// Start and end of an event held on a single day. End must come after start.
pub fn event_window(
    date: &str,
    start: &str,
    end: &str,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let day = parse_date(date)?;
    let start = combine(day, parse_time(start)?, tz)?;
    let end = combine(day, parse_time(end)?, tz)?;
    if end <= start {
        return Err(ApiError::validation("end time must be after start time"));
    }
    Ok((start, end))
}

/// `dd-mm-YYYY HH:MM` in the viewer's zone.
pub fn format_local(value: DateTime<Utc>, tz: Tz) -> String {
    value.with_timezone(&tz).format("%d-%m-%Y %H:%M").to_string()
}

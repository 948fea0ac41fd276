//! Observation-date parsing.
//!
//! Lab sources send either a calendar date (`2024-01-01`) or a timestamp, with or
//! without an offset. Everything is normalised to a naive UTC instant; a bare date
//! is midnight.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

fn iso_date_to_naive(date: iso8601::Date) -> Option<NaiveDate> {
    match date {
        iso8601::Date::YMD { year, month, day } => NaiveDate::from_ymd_opt(year, month, day),
        iso8601::Date::Week { year, ww, d } => {
            let weekday = match d {
                1 => Weekday::Mon,
                2 => Weekday::Tue,
                3 => Weekday::Wed,
                4 => Weekday::Thu,
                5 => Weekday::Fri,
                6 => Weekday::Sat,
                7 => Weekday::Sun,
                _ => return None,
            };
            NaiveDate::from_isoywd_opt(year, ww, weekday)
        }
        iso8601::Date::Ordinal { year, ddd } => NaiveDate::from_yo_opt(year, ddd),
    }
}

fn iso_datetime_to_utc(value: iso8601::DateTime) -> Option<NaiveDateTime> {
    let date = iso_date_to_naive(value.date)?;
    let time = NaiveTime::from_hms_milli_opt(
        value.time.hour,
        value.time.minute,
        value.time.second,
        value.time.millisecond,
    )?;
    let offset = Duration::hours(value.time.tz_offset_hours as i64)
        + Duration::minutes(value.time.tz_offset_minutes as i64);
    date.and_time(time).checked_sub_signed(offset)
}

/// Parses an observation date. Returns `None` for empty or unparseable input.
pub fn parse_observation_date(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = iso8601::datetime(trimmed) {
        if let Some(instant) = iso_datetime_to_utc(value) {
            return Some(instant);
        }
    }

    // Database exports use a space instead of `T`.
    if let Ok(instant) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(instant);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }

    if let Ok(date) = iso8601::date(trimmed) {
        return iso_date_to_naive(date).map(|d| d.and_time(NaiveTime::MIN));
    }

    None
}

use chrono::{NaiveDateTime, Timelike};

use crate::calendar::{self, CalendarSystem};

/// Storage format for fire times: UTC wall-clock at minute precision,
/// no seconds, no offset suffix.
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Render an instant in the storage format, dropping any sub-minute part.
pub fn format_minute(dt: NaiveDateTime) -> String {
    dt.format(MINUTE_FORMAT).to_string()
}

pub fn parse_minute(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), MINUTE_FORMAT)
}

/// Truncate an instant to minute precision.
pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Render a local instant in the user's calendar, `YYYY/MM/DD HH:MM`.
/// Persian-speaking users get Eastern Arabic digits.
pub fn format_local(local: NaiveDateTime, calendar: CalendarSystem, language: &str) -> String {
    let cd = calendar::from_gregorian(local.date(), calendar);
    let rendered = format!(
        "{}/{:02}/{:02} {:02}:{:02}",
        cd.year,
        cd.month,
        cd.day,
        local.hour(),
        local.minute()
    );
    if language == "fa" {
        to_persian_digits(&rendered)
    } else {
        rendered
    }
}

/// Replace ASCII digits with their Persian counterparts.
pub fn to_persian_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '0'..='9' => {
                let offset = c as u32 - '0' as u32;
                // '۰' (U+06F0) .. '۹' (U+06F9)
                char::from_u32(0x06F0 + offset).unwrap_or(c)
            }
            other => other,
        })
        .collect()
}

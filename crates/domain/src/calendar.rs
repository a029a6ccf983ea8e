use std::{fmt::Display, str::FromStr};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The calendar a date is expressed in.
///
/// Recurring reminders persist the calendar that was active when they were
/// created and all later month/year arithmetic happens in that calendar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarSystem {
    #[default]
    #[serde(alias = "miladi")]
    Gregorian,
    /// Solar Hijri (Iranian).
    #[serde(alias = "jalali", alias = "persian")]
    Shamsi,
    /// Lunar Hijri (Islamic), tabular rule.
    #[serde(alias = "hijri", alias = "islamic")]
    Qamari,
}

impl CalendarSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarSystem::Gregorian => "gregorian",
            CalendarSystem::Shamsi => "shamsi",
            CalendarSystem::Qamari => "qamari",
        }
    }
}

impl Display for CalendarSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum InvalidCalendarError {
    #[error("Unknown calendar: {0}")]
    Unknown(String),
}

impl FromStr for CalendarSystem {
    type Err = InvalidCalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gregorian" | "miladi" => Ok(CalendarSystem::Gregorian),
            "shamsi" | "jalali" | "persian" => Ok(CalendarSystem::Shamsi),
            "qamari" | "hijri" | "islamic" => Ok(CalendarSystem::Qamari),
            other => Err(InvalidCalendarError::Unknown(other.to_string())),
        }
    }
}

/// A calendar-local date triple. Only meaningful next to a `CalendarSystem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

// Conversions run over integer Julian day numbers, per the Fourmilab
// arithmetic algorithms. The Gregorian side bridges through chrono, whose
// day count relates to the JDN by a fixed shift.
const JDN_CE_SHIFT: i64 = 1_721_425;

fn date_to_jdn(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 + JDN_CE_SHIFT
}

fn jdn_to_date(jdn: i64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt((jdn - JDN_CE_SHIFT) as i32)
}

// --- Solar Hijri (2820-year arithmetic cycle) ---

fn persian_epoch_base(year: i32) -> i64 {
    if year >= 0 {
        year as i64 - 474
    } else {
        year as i64 - 473
    }
}

fn persian_is_leap(year: i32) -> bool {
    let epbase = persian_epoch_base(year);
    ((epbase.rem_euclid(2820) + 474 + 38) * 682).rem_euclid(2816) < 682
}

fn persian_to_jdn(year: i32, month: u32, day: u32) -> i64 {
    let epbase = persian_epoch_base(year);
    let epyear = 474 + epbase.rem_euclid(2820);
    let mdays = if month <= 7 {
        (month as i64 - 1) * 31
    } else {
        (month as i64 - 1) * 30 + 6
    };
    day as i64
        + mdays
        + (682 * epyear - 110).div_euclid(2816)
        + (epyear - 1) * 365
        + epbase.div_euclid(2820) * 1_029_983
        + 1_948_320
}

fn persian_from_jdn(jdn: i64) -> CalendarDate {
    let depoch = jdn - persian_to_jdn(475, 1, 1);
    let cycle = depoch.div_euclid(1_029_983);
    let cyear = depoch.rem_euclid(1_029_983);
    let ycycle = if cyear == 1_029_982 {
        2820
    } else {
        let aux1 = cyear / 366;
        let aux2 = cyear % 366;
        (2134 * aux1 + 2816 * aux2 + 2815) / 1_028_522 + aux1 + 1
    };
    let mut year = ycycle + 2820 * cycle + 474;
    if year <= 0 {
        year -= 1;
    }
    let year = year as i32;
    let yday = jdn - persian_to_jdn(year, 1, 1) + 1;
    let month = if yday <= 186 {
        (yday + 30) / 31
    } else {
        (yday - 6 + 29) / 30
    } as u32;
    let day = (jdn - persian_to_jdn(year, month, 1) + 1) as u32;
    CalendarDate::new(year, month, day)
}

fn persian_month_length(year: i32, month: u32) -> u32 {
    match month {
        1..=6 => 31,
        7..=11 => 30,
        12 => {
            if persian_is_leap(year) {
                30
            } else {
                29
            }
        }
        _ => 0,
    }
}

// --- Lunar Hijri (tabular, type II intercalation) ---

fn islamic_is_leap(year: i32) -> bool {
    (11 * year as i64 + 14).rem_euclid(30) < 11
}

fn islamic_to_jdn(year: i32, month: u32, day: u32) -> i64 {
    day as i64
        + (59 * (month as i64 - 1) + 1) / 2
        + (year as i64 - 1) * 354
        + (3 + 11 * year as i64).div_euclid(30)
        + 1_948_439
}

fn islamic_from_jdn(jdn: i64) -> CalendarDate {
    let mut year = (30 * (jdn - 1_948_440) + 10_646).div_euclid(10_631) as i32;
    if jdn < islamic_to_jdn(year, 1, 1) {
        year -= 1;
    } else if jdn >= islamic_to_jdn(year + 1, 1, 1) {
        year += 1;
    }
    let mut rem = jdn - islamic_to_jdn(year, 1, 1);
    for month in 1..=12u32 {
        let len = islamic_month_length(year, month) as i64;
        if rem < len {
            return CalendarDate::new(year, month, rem as u32 + 1);
        }
        rem -= len;
    }
    // Unreachable for in-range input; fall back to the last day of the year.
    CalendarDate::new(year, 12, islamic_month_length(year, 12))
}

fn islamic_month_length(year: i32, month: u32) -> u32 {
    match month {
        12 => {
            if islamic_is_leap(year) {
                30
            } else {
                29
            }
        }
        m if m % 2 == 1 => 30,
        1..=11 => 29,
        _ => 0,
    }
}

// --- Gregorian ---

fn gregorian_is_leap(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn gregorian_month_length(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if gregorian_is_leap(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Number of days in `month` of `year` in the given calendar.
/// Out-of-range months report zero days.
pub fn month_length(calendar: CalendarSystem, year: i32, month: u32) -> u32 {
    match calendar {
        CalendarSystem::Gregorian => gregorian_month_length(year, month),
        CalendarSystem::Shamsi => persian_month_length(year, month),
        CalendarSystem::Qamari => islamic_month_length(year, month),
    }
}

pub fn is_leap_year(calendar: CalendarSystem, year: i32) -> bool {
    match calendar {
        CalendarSystem::Gregorian => gregorian_is_leap(year),
        CalendarSystem::Shamsi => persian_is_leap(year),
        CalendarSystem::Qamari => islamic_is_leap(year),
    }
}

/// Express a Gregorian date in the target calendar.
pub fn from_gregorian(date: NaiveDate, calendar: CalendarSystem) -> CalendarDate {
    match calendar {
        CalendarSystem::Gregorian => CalendarDate::new(date.year(), date.month(), date.day()),
        CalendarSystem::Shamsi => persian_from_jdn(date_to_jdn(date)),
        CalendarSystem::Qamari => islamic_from_jdn(date_to_jdn(date)),
    }
}

/// Resolve a calendar-local date to a Gregorian one.
/// Returns `None` when the triple does not name a day of that calendar.
pub fn to_gregorian(date: CalendarDate, calendar: CalendarSystem) -> Option<NaiveDate> {
    if date.month < 1 || date.month > 12 {
        return None;
    }
    if date.day < 1 || date.day > month_length(calendar, date.year, date.month) {
        return None;
    }
    match calendar {
        CalendarSystem::Gregorian => NaiveDate::from_ymd_opt(date.year, date.month, date.day),
        CalendarSystem::Shamsi => jdn_to_date(persian_to_jdn(date.year, date.month, date.day)),
        CalendarSystem::Qamari => jdn_to_date(islamic_to_jdn(date.year, date.month, date.day)),
    }
}

/// The year `today` falls in, expressed in the given calendar.
pub fn current_year(calendar: CalendarSystem, today: NaiveDate) -> i32 {
    from_gregorian(today, calendar).year
}

/// Resolve a day/month pair (and optional year) the way users state dates:
/// a missing year means the current year of the requested calendar.
pub fn resolve_date(
    day: u32,
    month: u32,
    year: Option<i32>,
    calendar: CalendarSystem,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let year = year.unwrap_or_else(|| current_year(calendar, today));
    to_gregorian(CalendarDate::new(year, month, day), calendar)
}

/// Advance a date by whole months in the given calendar, clamping the day
/// to the target month's length. Clamping never crosses a month boundary.
pub fn add_months(date: NaiveDate, months: i32, calendar: CalendarSystem) -> Option<NaiveDate> {
    let cd = from_gregorian(date, calendar);
    let total = cd.year as i64 * 12 + (cd.month as i64 - 1) + months as i64;
    let year = total.div_euclid(12) as i32;
    let month = (total.rem_euclid(12) + 1) as u32;
    let day = cd.day.min(month_length(calendar, year, month));
    to_gregorian(CalendarDate::new(year, month, day), calendar)
}

/// Advance a date by whole years in the given calendar, clamping the day
/// (Feb 29 anchors land on Feb 28 in non-leap targets, Esfand 30 on 29).
pub fn add_years(date: NaiveDate, years: i32, calendar: CalendarSystem) -> Option<NaiveDate> {
    let cd = from_gregorian(date, calendar);
    let year = cd.year + years;
    let day = cd.day.min(month_length(calendar, year, cd.month));
    to_gregorian(CalendarDate::new(year, cd.month, day), calendar)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greg(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_calendar_aliases() {
        assert_eq!("miladi".parse::<CalendarSystem>().unwrap(), CalendarSystem::Gregorian);
        assert_eq!("Shamsi".parse::<CalendarSystem>().unwrap(), CalendarSystem::Shamsi);
        assert_eq!("hijri".parse::<CalendarSystem>().unwrap(), CalendarSystem::Qamari);
        assert!("mayan".parse::<CalendarSystem>().is_err());
    }

    #[test]
    fn shamsi_anchor_dates() {
        // 1 Farvardin 1400 began on 2021-03-21.
        assert_eq!(
            to_gregorian(CalendarDate::new(1400, 1, 1), CalendarSystem::Shamsi),
            Some(greg(2021, 3, 21))
        );
        assert_eq!(
            from_gregorian(greg(2021, 3, 21), CalendarSystem::Shamsi),
            CalendarDate::new(1400, 1, 1)
        );
        // Last day of 1399 (a leap year, Esfand has 30 days).
        assert!(is_leap_year(CalendarSystem::Shamsi, 1399));
        assert_eq!(
            from_gregorian(greg(2021, 3, 20), CalendarSystem::Shamsi),
            CalendarDate::new(1399, 12, 30)
        );
    }

    #[test]
    fn qamari_anchor_dates() {
        // Epoch: 1 Muharram 1 AH is JDN 1948440 = 622-07-19 proleptic Gregorian.
        assert_eq!(
            to_gregorian(CalendarDate::new(1, 1, 1), CalendarSystem::Qamari),
            Some(greg(622, 7, 19))
        );
        // Tabular rule: 1 Ramadan 1446 is 2025-03-01.
        assert_eq!(
            to_gregorian(CalendarDate::new(1446, 9, 1), CalendarSystem::Qamari),
            Some(greg(2025, 3, 1))
        );
        assert_eq!(
            from_gregorian(greg(2025, 3, 1), CalendarSystem::Qamari),
            CalendarDate::new(1446, 9, 1)
        );
    }

    #[test]
    fn shamsi_month_lengths() {
        for month in 1..=6 {
            assert_eq!(month_length(CalendarSystem::Shamsi, 1403, month), 31);
        }
        for month in 7..=11 {
            assert_eq!(month_length(CalendarSystem::Shamsi, 1403, month), 30);
        }
        assert_eq!(month_length(CalendarSystem::Shamsi, 1399, 12), 30);
        assert_eq!(month_length(CalendarSystem::Shamsi, 1400, 12), 29);
    }

    #[test]
    fn qamari_month_lengths() {
        assert_eq!(month_length(CalendarSystem::Qamari, 1446, 1), 30);
        assert_eq!(month_length(CalendarSystem::Qamari, 1446, 2), 29);
        assert_eq!(month_length(CalendarSystem::Qamari, 1446, 11), 30);
        // Year 1445 is a tabular leap year, so Dhu al-Hijjah has 30 days.
        assert!(islamic_is_leap(1445));
        assert_eq!(month_length(CalendarSystem::Qamari, 1445, 12), 30);
        assert!(!islamic_is_leap(1446));
        assert_eq!(month_length(CalendarSystem::Qamari, 1446, 12), 29);
    }

    #[test]
    fn round_trips_through_every_calendar() {
        // ~55 years around the current era, sampled at a stride that is
        // coprime with the month lengths involved.
        let mut date = greg(1990, 1, 1);
        let end = greg(2045, 1, 1);
        while date < end {
            for calendar in [
                CalendarSystem::Gregorian,
                CalendarSystem::Shamsi,
                CalendarSystem::Qamari,
            ] {
                let cd = from_gregorian(date, calendar);
                assert_eq!(
                    to_gregorian(cd, calendar),
                    Some(date),
                    "round trip failed for {date} in {calendar}"
                );
                assert!(cd.day >= 1 && cd.day <= month_length(calendar, cd.year, cd.month));
            }
            date = date + chrono::Duration::days(17);
        }
    }

    #[test]
    fn rejects_invalid_triples() {
        assert!(to_gregorian(CalendarDate::new(1403, 13, 1), CalendarSystem::Shamsi).is_none());
        assert!(to_gregorian(CalendarDate::new(1400, 12, 30), CalendarSystem::Shamsi).is_none());
        assert!(to_gregorian(CalendarDate::new(2025, 2, 29), CalendarSystem::Gregorian).is_none());
        assert!(to_gregorian(CalendarDate::new(1446, 2, 30), CalendarSystem::Qamari).is_none());
    }

    #[test]
    fn resolve_date_defaults_to_current_year() {
        // 15 Khordad with no year, seen from a day early in 1404.
        let today = to_gregorian(CalendarDate::new(1404, 1, 10), CalendarSystem::Shamsi).unwrap();
        let resolved = resolve_date(15, 3, None, CalendarSystem::Shamsi, today).unwrap();
        assert_eq!(
            from_gregorian(resolved, CalendarSystem::Shamsi),
            CalendarDate::new(1404, 3, 15)
        );
    }

    #[test]
    fn add_months_clamps_day() {
        // Gregorian: Jan 31 + 1 month lands on the last day of February.
        assert_eq!(
            add_months(greg(2025, 1, 31), 1, CalendarSystem::Gregorian),
            Some(greg(2025, 2, 28))
        );
        assert_eq!(
            add_months(greg(2024, 1, 31), 1, CalendarSystem::Gregorian),
            Some(greg(2024, 2, 29))
        );
        // December rolls the year.
        assert_eq!(
            add_months(greg(2024, 12, 15), 1, CalendarSystem::Gregorian),
            Some(greg(2025, 1, 15))
        );
        // Shamsi: 31 Shahrivar (month 6) + 1 month clamps to 30 Mehr.
        let base = to_gregorian(CalendarDate::new(1403, 6, 31), CalendarSystem::Shamsi).unwrap();
        let next = add_months(base, 1, CalendarSystem::Shamsi).unwrap();
        assert_eq!(
            from_gregorian(next, CalendarSystem::Shamsi),
            CalendarDate::new(1403, 7, 30)
        );
    }

    #[test]
    fn add_years_clamps_leap_day() {
        assert_eq!(
            add_years(greg(2024, 2, 29), 1, CalendarSystem::Gregorian),
            Some(greg(2025, 2, 28))
        );
        // Esfand 30 of a leap Shamsi year clamps to Esfand 29.
        let base = to_gregorian(CalendarDate::new(1399, 12, 30), CalendarSystem::Shamsi).unwrap();
        let next = add_years(base, 1, CalendarSystem::Shamsi).unwrap();
        assert_eq!(
            from_gregorian(next, CalendarSystem::Shamsi),
            CalendarDate::new(1400, 12, 29)
        );
    }
}

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

use crate::{
    calendar::{self, CalendarSystem},
    parse::{ParsedReminder, parse_hhmm},
    shared::recurrence::{IntervalUnit, Repeat},
};

#[derive(Error, Debug, PartialEq)]
pub enum MaterializeError {
    /// The utterance names a concrete moment that has already passed and the
    /// category does not roll forward.
    #[error("resolved date {detected} is already past (now {current})")]
    PastDate {
        detected: NaiveDateTime,
        current: NaiveDateTime,
    },
}

/// Turn a parsed intent into the first local fire instant.
///
/// `now_local` is the user's current wall-clock at minute precision; the
/// result is a local wall-clock too, converted to UTC by the caller. The
/// descriptor priority is fixed: interval cadences, anchored monthly/weekly
/// patterns, concrete dates, relative offsets, "today", then the plain
/// time-of-day fallback.
pub fn resolve_fire_time(
    parsed: &ParsedReminder,
    now_local: NaiveDateTime,
    user_calendar: CalendarSystem,
) -> Result<NaiveDateTime, MaterializeError> {
    let (hour, minute) = target_time(parsed.time.as_deref(), now_local);

    if let Repeat::Interval { value, unit } = parsed.repeat {
        let anchor = interval_anchor(parsed, now_local, user_calendar);
        return Ok(first_interval_occurrence(
            anchor, hour, minute, value, unit, now_local,
        ));
    }

    if let Repeat::Monthly { day: Some(day) } = parsed.repeat {
        return Ok(first_monthly_occurrence(
            day,
            hour,
            minute,
            user_calendar,
            now_local,
        ));
    }
    if let Repeat::Weekly { weekday: Some(weekday) } = parsed.repeat {
        return Ok(first_weekly_occurrence(weekday, hour, minute, now_local));
    }

    if let Some(date) = parsed.specific_date.as_ref() {
        if let (Some(day), Some(month)) = (date.day, date.month) {
            let calendar = date.calendar_system(user_calendar);
            if let Some(resolved) = resolve_specific_date(
                parsed,
                day,
                month,
                date.year,
                calendar,
                hour,
                minute,
                now_local,
            )? {
                return Ok(resolved);
            }
        }
    }

    if let Some(minutes) = parsed.relative_minutes {
        return Ok(now_local + Duration::minutes(minutes.max(0)));
    }

    if let Some(days) = parsed.relative_days.filter(|d| *d != 0) {
        let mut target = at(
            (now_local + Duration::days(days)).date(),
            hour,
            minute,
            now_local,
        );
        if target < now_local {
            target += Duration::days(1);
        }
        return Ok(target);
    }

    // "today", an explicit zero-day offset, or nothing but a time of day:
    // today at the target time, bumped to tomorrow when already past.
    let mut target = at(now_local.date(), hour, minute, now_local);
    if target <= now_local {
        target += Duration::days(1);
    }
    Ok(target)
}

fn target_time(time: Option<&str>, now_local: NaiveDateTime) -> (u32, u32) {
    time.and_then(parse_hhmm)
        .unwrap_or((now_local.hour(), now_local.minute()))
}

fn at(date: NaiveDate, hour: u32, minute: u32, fallback: NaiveDateTime) -> NaiveDateTime {
    match NaiveTime::from_hms_opt(hour, minute, 0) {
        Some(time) => date.and_time(time),
        None => fallback,
    }
}

fn interval_anchor(
    parsed: &ParsedReminder,
    now_local: NaiveDateTime,
    user_calendar: CalendarSystem,
) -> Option<NaiveDate> {
    if let Some(days) = parsed.relative_days {
        return Some((now_local + Duration::days(days)).date());
    }
    let date = parsed.specific_date.as_ref()?;
    let (day, month) = (date.day?, date.month?);
    let calendar = date.calendar_system(user_calendar);
    calendar::resolve_date(day, month, date.year, calendar, now_local.date())
}

/// First occurrence of a fixed cadence at or after now: the anchor itself if
/// still ahead, otherwise the anchor advanced by whole periods past now.
fn first_interval_occurrence(
    anchor_date: Option<NaiveDate>,
    hour: u32,
    minute: u32,
    value: u32,
    unit: IntervalUnit,
    now_local: NaiveDateTime,
) -> NaiveDateTime {
    let start = at(anchor_date.unwrap_or(now_local.date()), hour, minute, now_local);
    let period = unit.duration(value.max(1)).num_minutes().max(1);
    if start > now_local {
        return start;
    }
    let elapsed = (now_local - start).num_minutes();
    let periods_passed = elapsed / period;
    start + Duration::minutes((periods_passed + 1) * period)
}

/// First day-of-month occurrence at or after now, in the user's calendar,
/// with the day clamped to each month's length.
fn first_monthly_occurrence(
    day: u32,
    hour: u32,
    minute: u32,
    calendar: CalendarSystem,
    now_local: NaiveDateTime,
) -> NaiveDateTime {
    let today = calendar::from_gregorian(now_local.date(), calendar);
    let clamped = day
        .min(calendar::month_length(calendar, today.year, today.month))
        .max(1);
    let this_month = calendar::to_gregorian(
        calendar::CalendarDate::new(today.year, today.month, clamped),
        calendar,
    )
    .map(|d| at(d, hour, minute, now_local));
    if let Some(candidate) = this_month {
        if candidate > now_local {
            return candidate;
        }
    }
    let next = calendar::add_months(now_local.date(), 1, calendar)
        .map(|d| calendar::from_gregorian(d, calendar))
        .unwrap_or(today);
    let clamped = day
        .min(calendar::month_length(calendar, next.year, next.month))
        .max(1);
    calendar::to_gregorian(calendar::CalendarDate::new(next.year, next.month, clamped), calendar)
        .map(|d| at(d, hour, minute, now_local))
        .unwrap_or(now_local + Duration::days(1))
}

/// First instant at or after now whose ISO weekday matches.
fn first_weekly_occurrence(
    weekday: u32,
    hour: u32,
    minute: u32,
    now_local: NaiveDateTime,
) -> NaiveDateTime {
    let current = now_local.weekday().number_from_monday();
    let mut ahead = weekday as i64 - current as i64;
    if ahead < 0 {
        ahead += 7;
    } else if ahead == 0 {
        let target = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(now_local.time());
        if target <= now_local.time() {
            ahead = 7;
        }
    }
    at((now_local + Duration::days(ahead)).date(), hour, minute, now_local)
}

/// A concrete date. Birthdays and anniversaries ignore any stated year and
/// roll forward past dates; anything else errs on an explicit past year and
/// rolls forward only when the year was omitted. `Ok(None)` means the triple
/// does not resolve in the calendar and the caller should fall through.
#[allow(clippy::too_many_arguments)]
fn resolve_specific_date(
    parsed: &ParsedReminder,
    day: u32,
    month: u32,
    year: Option<i32>,
    calendar: CalendarSystem,
    hour: u32,
    minute: u32,
    now_local: NaiveDateTime,
) -> Result<Option<NaiveDateTime>, MaterializeError> {
    let today = now_local.date();

    if parsed.rolls_year_forward {
        let Some(date) = calendar::resolve_date(day, month, None, calendar, today) else {
            return Ok(None);
        };
        let candidate = at(date, hour, minute, now_local);
        if candidate < now_local {
            let next = calendar::add_years(date, 1, calendar).unwrap_or(date);
            return Ok(Some(at(next, hour, minute, now_local)));
        }
        return Ok(Some(candidate));
    }

    match year {
        Some(year) => {
            let Some(date) = calendar::resolve_date(day, month, Some(year), calendar, today)
            else {
                return Ok(None);
            };
            let candidate = at(date, hour, minute, now_local);
            if candidate < now_local {
                return Err(MaterializeError::PastDate {
                    detected: candidate,
                    current: now_local,
                });
            }
            Ok(Some(candidate))
        }
        None => {
            let Some(date) = calendar::resolve_date(day, month, None, calendar, today) else {
                return Ok(None);
            };
            let mut candidate = at(date, hour, minute, now_local);
            if candidate < now_local {
                let next = calendar::add_years(date, 1, calendar).unwrap_or(date);
                candidate = at(next, hour, minute, now_local);
            }
            Ok(Some(candidate))
        }
    }
}

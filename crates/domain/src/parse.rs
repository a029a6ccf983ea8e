use serde::Deserialize;

use crate::{
    calendar::CalendarSystem,
    reminder::Category,
    shared::recurrence::Repeat,
};

/// A concrete date as stated by the user, in whichever calendar they spoke.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpecificDate {
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub calendar: Option<String>,
}

impl SpecificDate {
    pub fn is_set(&self) -> bool {
        self.day.is_some() || self.month.is_some() || self.year.is_some()
    }

    /// The calendar this date should be read in. An explicit name wins;
    /// otherwise the year magnitude disambiguates, and an absent year means
    /// the user's own calendar.
    pub fn calendar_system(&self, user_calendar: CalendarSystem) -> CalendarSystem {
        if let Some(name) = &self.calendar {
            if let Ok(calendar) = name.parse::<CalendarSystem>() {
                return calendar;
            }
        }
        match self.year {
            Some(year) if year > 1500 => CalendarSystem::Gregorian,
            Some(year) if year > 1300 => CalendarSystem::Shamsi,
            _ => user_calendar,
        }
    }
}

/// Reminder object as the language model emits it, before validation.
/// Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawParsedReminder {
    pub category: Option<String>,
    pub content: Option<String>,
    pub time: Option<String>,
    pub specific_date: Option<SpecificDate>,
    pub relative_days: Option<i64>,
    pub relative_minutes: Option<i64>,
    pub today: Option<bool>,
    pub repeat: Option<serde_json::Value>,
}

/// A validated, normalized reminder intent ready for time materialization.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReminder {
    pub category: Category,
    /// True when the model called it a birthday or anniversary: resolved
    /// past dates roll a year forward instead of erroring.
    pub rolls_year_forward: bool,
    pub content: String,
    pub time: Option<String>,
    pub specific_date: Option<SpecificDate>,
    pub relative_days: Option<i64>,
    pub relative_minutes: Option<i64>,
    pub today: bool,
    pub repeat: Repeat,
}

impl ParsedReminder {
    /// Validate a raw model object. `None` means the object is unusable
    /// (missing content); everything else is coerced rather than rejected.
    pub fn from_raw(raw: RawParsedReminder) -> Option<ParsedReminder> {
        let content = sanitize_content(raw.content.as_deref().unwrap_or(""), 40);
        if content.is_empty() {
            return None;
        }
        let raw_category = raw.category.unwrap_or_default();
        let rolls_year_forward = matches!(raw_category.trim(), "birthday" | "anniversary");
        let repeat = raw
            .repeat
            .as_ref()
            .map(Repeat::from_value)
            .unwrap_or(Repeat::None);
        Some(ParsedReminder {
            category: Category::coerce(&raw_category),
            rolls_year_forward,
            content,
            time: raw.time.filter(|t| parse_hhmm(t).is_some()),
            specific_date: raw.specific_date.filter(SpecificDate::is_set),
            relative_days: raw.relative_days,
            relative_minutes: raw.relative_minutes,
            today: raw.today.unwrap_or(false),
            repeat,
        })
    }
}

/// Field changes the edit flow detected; unmentioned fields stay `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReminderDelta {
    pub content: Option<String>,
    pub time: Option<String>,
    pub specific_date: Option<SpecificDate>,
    pub category: Option<String>,
    pub repeat: Option<serde_json::Value>,
}

impl ReminderDelta {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.time.is_none()
            && self.specific_date.is_none()
            && self.category.is_none()
            && self.repeat.is_none()
    }

    pub fn category(&self) -> Option<Category> {
        self.category.as_deref().map(Category::coerce)
    }

    pub fn repeat(&self) -> Option<Repeat> {
        self.repeat.as_ref().map(Repeat::from_value)
    }
}

/// Strip control characters, collapse surrounding whitespace and bound the
/// length (in characters, the content is arbitrary Unicode).
pub fn sanitize_content(raw: &str, max_chars: usize) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .chars()
        .take(max_chars)
        .collect()
}

/// Parse a wall-clock `HH:MM`.
pub fn parse_hhmm(raw: &str) -> Option<(u32, u32)> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    let hours = hours.parse::<u32>().ok()?;
    let minutes = minutes.parse::<u32>().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some((hours, minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wall_clock_times() {
        assert_eq!(parse_hhmm("08:00"), Some((8, 0)));
        assert_eq!(parse_hhmm(" 23:59 "), Some((23, 59)));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("8"), None);
        assert_eq!(parse_hhmm("eight"), None);
    }

    #[test]
    fn sanitizes_and_bounds_content() {
        assert_eq!(sanitize_content("  take\tpills\n ", 40), "take pills");
        assert_eq!(sanitize_content("", 40), "");
        let long = "x".repeat(100);
        assert_eq!(sanitize_content(&long, 40).chars().count(), 40);
        // Multi-byte content is bounded by characters, not bytes.
        let persian = "یادآوری ".repeat(20);
        assert_eq!(sanitize_content(&persian, 40).chars().count(), 40);
    }

    #[test]
    fn raw_reminder_without_content_is_rejected() {
        let raw = RawParsedReminder {
            category: Some("medicine".into()),
            repeat: Some(serde_json::json!("daily")),
            ..Default::default()
        };
        assert!(ParsedReminder::from_raw(raw).is_none());
    }

    #[test]
    fn raw_reminder_is_coerced_not_rejected() {
        let raw: RawParsedReminder = serde_json::from_value(serde_json::json!({
            "category": "banquet",
            "content": "dinner with Sara",
            "time": "19:00",
            "repeat": {"type": "weekly", "weekday": "friday"},
        }))
        .unwrap();
        let parsed = ParsedReminder::from_raw(raw).unwrap();
        assert_eq!(parsed.category, Category::General);
        assert_eq!(parsed.repeat, Repeat::Weekly { weekday: Some(5) });
        assert_eq!(parsed.time.as_deref(), Some("19:00"));
        assert!(!parsed.rolls_year_forward);
    }

    #[test]
    fn anniversary_rolls_forward_but_stores_as_general() {
        let raw: RawParsedReminder = serde_json::from_value(serde_json::json!({
            "category": "anniversary",
            "content": "سالگرد ازدواج",
            "specific_date": {"day": 1, "month": 2, "calendar": "shamsi"},
            "repeat": "yearly",
        }))
        .unwrap();
        let parsed = ParsedReminder::from_raw(raw).unwrap();
        assert!(parsed.rolls_year_forward);
        assert_eq!(parsed.category, Category::General);
        assert_eq!(parsed.repeat, Repeat::Yearly);
    }

    #[test]
    fn malformed_time_is_dropped() {
        let raw: RawParsedReminder = serde_json::from_value(serde_json::json!({
            "category": "general",
            "content": "call mom",
            "time": "later",
            "repeat": "none",
        }))
        .unwrap();
        let parsed = ParsedReminder::from_raw(raw).unwrap();
        assert_eq!(parsed.time, None);
    }

    #[test]
    fn specific_date_calendar_heuristics() {
        let explicit = SpecificDate {
            day: Some(15),
            month: Some(3),
            year: None,
            calendar: Some("shamsi".into()),
        };
        assert_eq!(
            explicit.calendar_system(CalendarSystem::Gregorian),
            CalendarSystem::Shamsi
        );

        let by_year = SpecificDate { year: Some(2026), ..Default::default() };
        assert_eq!(
            by_year.calendar_system(CalendarSystem::Shamsi),
            CalendarSystem::Gregorian
        );

        let by_shamsi_year = SpecificDate { year: Some(1404), ..Default::default() };
        assert_eq!(
            by_shamsi_year.calendar_system(CalendarSystem::Gregorian),
            CalendarSystem::Shamsi
        );

        let bare = SpecificDate { day: Some(1), month: Some(1), ..Default::default() };
        assert_eq!(
            bare.calendar_system(CalendarSystem::Qamari),
            CalendarSystem::Qamari
        );
    }
}

use std::fmt::Display;

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize, ser::SerializeMap};

use crate::calendar::{self, CalendarSystem};

/// Unit of a fixed-duration repeat cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
        }
    }

    pub fn duration(&self, value: u32) -> Duration {
        match self {
            IntervalUnit::Minutes => Duration::minutes(value as i64),
            IntervalUnit::Hours => Duration::hours(value as i64),
            IntervalUnit::Days => Duration::days(value as i64),
        }
    }
}

impl Display for IntervalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repeat pattern of a reminder.
///
/// The serialized form is the canonical `{"type":…}` JSON object; reading is
/// deliberately permissive (bare words, `every_N_unit` shorthands and partial
/// objects all normalize) because stored rows and parser replies have
/// historically used every one of those spellings. Anything unusable
/// normalizes to `None` rather than failing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Repeat {
    #[default]
    None,
    Daily,
    /// Every week; with `weekday` (ISO, 1 = Monday) pinned to that day.
    Weekly { weekday: Option<u32> },
    /// Every month; with `day` pinned to that day-of-month, clamped to the
    /// month's length in the reminder's calendar.
    Monthly { day: Option<u32> },
    Yearly,
    Interval { value: u32, unit: IntervalUnit },
}

impl Repeat {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Repeat::None)
    }

    /// Canonical serialized form, e.g. `{"type":"interval","value":8,"unit":"hours"}`.
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"none"}"#.to_string())
    }

    /// Permissive parse of any historical spelling. Malformed input is `None`.
    pub fn parse(raw: &str) -> Repeat {
        let raw = raw.trim();
        match raw {
            "" | "none" => return Repeat::None,
            "daily" => return Repeat::Daily,
            "weekly" => return Repeat::Weekly { weekday: None },
            "monthly" => return Repeat::Monthly { day: None },
            "yearly" => return Repeat::Yearly,
            _ => {}
        }
        if let Some(interval) = parse_every_shorthand(raw) {
            return interval;
        }
        match serde_json::from_str::<Repeat>(raw) {
            Ok(repeat) => repeat,
            Err(e) => {
                tracing::debug!("Unrecognized repeat pattern {raw:?} ({e}); treating as one-shot");
                Repeat::None
            }
        }
    }

    /// Normalize a JSON value that may hold either spelling.
    pub fn from_value(value: &serde_json::Value) -> Repeat {
        match value {
            serde_json::Value::String(s) => Repeat::parse(s),
            serde_json::Value::Object(_) => {
                serde_json::from_value(value.clone()).unwrap_or(Repeat::None)
            }
            _ => Repeat::None,
        }
    }

    /// Localized human phrase for the pattern.
    pub fn display(&self, language: &str) -> String {
        let (once, daily, weekly, monthly, yearly) = match language {
            "fa" => ("یکبار", "روزانه", "هفتگی", "ماهانه", "سالانه"),
            "ar" => ("مرة واحدة", "يوميا", "أسبوعيا", "شهريا", "سنويا"),
            "ru" => ("Один раз", "Ежедневно", "Еженедельно", "Ежемесячно", "Ежегодно"),
            _ => ("Once", "Daily", "Weekly", "Monthly", "Yearly"),
        };
        match self {
            Repeat::None => once.to_string(),
            Repeat::Daily => daily.to_string(),
            Repeat::Weekly { .. } => weekly.to_string(),
            Repeat::Monthly { .. } => monthly.to_string(),
            Repeat::Yearly => yearly.to_string(),
            Repeat::Interval { value, unit } => interval_phrase(language, *value, *unit),
        }
    }

    /// The next local occurrence strictly after `base`, with month and year
    /// arithmetic done in `calendar`. `None` for one-shot patterns (and for
    /// degenerate zero intervals, which would otherwise stall).
    pub fn next_after(
        &self,
        base: NaiveDateTime,
        calendar: CalendarSystem,
    ) -> Option<NaiveDateTime> {
        match self {
            Repeat::None => None,
            Repeat::Interval { value: 0, .. } => None,
            Repeat::Interval { value, unit } => Some(base + unit.duration(*value)),
            Repeat::Daily => Some(base + Duration::days(1)),
            Repeat::Weekly { weekday: None } => Some(base + Duration::days(7)),
            Repeat::Weekly { weekday: Some(weekday) } => {
                let current = base.weekday().number_from_monday();
                let mut ahead = *weekday as i64 - current as i64;
                if ahead <= 0 {
                    ahead += 7;
                }
                Some(base + Duration::days(ahead))
            }
            Repeat::Monthly { day: None } => {
                calendar::add_months(base.date(), 1, calendar).map(|d| d.and_time(base.time()))
            }
            Repeat::Monthly { day: Some(day) } => {
                let cd = calendar::from_gregorian(base.date(), calendar);
                let total = cd.year as i64 * 12 + cd.month as i64; // next month, zero-based
                let year = total.div_euclid(12) as i32;
                let month = (total.rem_euclid(12) + 1) as u32;
                let clamped = (*day).min(calendar::month_length(calendar, year, month)).max(1);
                calendar::to_gregorian(calendar::CalendarDate::new(year, month, clamped), calendar)
                    .map(|d| d.and_time(base.time()))
            }
            Repeat::Yearly => {
                calendar::add_years(base.date(), 1, calendar).map(|d| d.and_time(base.time()))
            }
        }
    }
}

fn interval_phrase(language: &str, value: u32, unit: IntervalUnit) -> String {
    let unit_word = match (language, unit) {
        ("fa", IntervalUnit::Minutes) => "دقیقه",
        ("fa", IntervalUnit::Hours) => "ساعت",
        ("fa", IntervalUnit::Days) => "روز",
        ("ar", IntervalUnit::Minutes) => "دقيقة",
        ("ar", IntervalUnit::Hours) => "ساعة",
        ("ar", IntervalUnit::Days) => "يوم",
        ("ru", IntervalUnit::Minutes) => "минут",
        ("ru", IntervalUnit::Hours) => "часов",
        ("ru", IntervalUnit::Days) => "дней",
        (_, IntervalUnit::Minutes) => "minutes",
        (_, IntervalUnit::Hours) => "hours",
        (_, IntervalUnit::Days) => "days",
    };
    match language {
        "fa" => format!("هر {} {}", value, unit_word),
        "ar" => format!("كل {} {}", value, unit_word),
        "ru" => format!("Каждые {} {}", value, unit_word),
        _ => format!("Every {} {}", value, unit_word),
    }
}

/// `every_8_hours` style shorthand, seen in parser replies.
fn parse_every_shorthand(raw: &str) -> Option<Repeat> {
    let rest = raw.strip_prefix("every_")?;
    let (value, unit) = rest.split_once('_')?;
    let value = value.parse::<u32>().ok().filter(|v| *v > 0)?;
    match unit {
        "minutes" => Some(Repeat::Interval { value, unit: IntervalUnit::Minutes }),
        "hours" => Some(Repeat::Interval { value, unit: IntervalUnit::Hours }),
        "days" => Some(Repeat::Interval { value, unit: IntervalUnit::Days }),
        "weeks" => Some(Repeat::Interval { value: value * 7, unit: IntervalUnit::Days }),
        _ => None,
    }
}

impl Serialize for Repeat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        match self {
            Repeat::None => map.serialize_entry("type", "none")?,
            Repeat::Daily => map.serialize_entry("type", "daily")?,
            Repeat::Weekly { weekday } => {
                map.serialize_entry("type", "weekly")?;
                if let Some(weekday) = weekday {
                    map.serialize_entry("weekday", weekday)?;
                }
            }
            Repeat::Monthly { day } => {
                map.serialize_entry("type", "monthly")?;
                if let Some(day) = day {
                    map.serialize_entry("day", day)?;
                }
            }
            Repeat::Yearly => map.serialize_entry("type", "yearly")?,
            Repeat::Interval { value, unit } => {
                map.serialize_entry("type", "interval")?;
                map.serialize_entry("value", value)?;
                map.serialize_entry("unit", unit.as_str())?;
            }
        }
        map.end()
    }
}

/// Loose wire shape: every field optional, weekday as a number or a name.
#[derive(Deserialize)]
struct RepeatRaw {
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<i64>,
    unit: Option<String>,
    day: Option<i64>,
    weekday: Option<serde_json::Value>,
}

impl<'de> Deserialize<'de> for Repeat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RepeatRaw::deserialize(deserializer)?;
        let kind = raw.kind.unwrap_or_default();
        Ok(match kind.as_str() {
            "daily" => Repeat::Daily,
            "weekly" => Repeat::Weekly { weekday: raw.weekday.as_ref().and_then(parse_weekday) },
            "monthly" => Repeat::Monthly {
                day: raw.day.filter(|d| (1..=31).contains(d)).map(|d| d as u32),
            },
            "yearly" => Repeat::Yearly,
            "interval" => {
                let value = raw.value.filter(|v| *v > 0);
                let unit = raw.unit.as_deref().and_then(|u| match u {
                    "minutes" | "minute" => Some(IntervalUnit::Minutes),
                    "hours" | "hour" => Some(IntervalUnit::Hours),
                    "days" | "day" => Some(IntervalUnit::Days),
                    _ => None,
                });
                match (value, unit) {
                    (Some(value), Some(unit)) => Repeat::Interval { value: value as u32, unit },
                    _ => Repeat::None,
                }
            }
            _ => Repeat::None,
        })
    }
}

fn parse_weekday(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().filter(|d| (1..=7).contains(d)).map(|d| d as u32),
        serde_json::Value::String(name) => match name.to_lowercase().as_str() {
            "monday" => Some(1),
            "tuesday" => Some(2),
            "wednesday" => Some(3),
            "thursday" => Some(4),
            "friday" => Some(5),
            "saturday" => Some(6),
            "sunday" => Some(7),
            _ => None,
        },
        _ => None,
    }
}

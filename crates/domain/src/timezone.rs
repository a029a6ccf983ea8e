use std::{fmt::Display, str::FromStr};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize, de::Visitor};
use thiserror::Error;

/// A fixed UTC offset in the `±HH:MM` form users configure.
///
/// Offsets are metadata on stored rows: the canonical fire time is always
/// UTC and the offset is only applied when converting for display or for
/// calendar arithmetic on the local wall-clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TzOffset {
    minutes: i32,
}

impl TzOffset {
    pub const UTC: TzOffset = TzOffset { minutes: 0 };

    /// Total offset east of UTC, in minutes.
    pub fn minutes(&self) -> i32 {
        self.minutes
    }

    pub fn to_duration(&self) -> Duration {
        Duration::minutes(self.minutes as i64)
    }

    /// Shift a UTC wall-clock instant into this offset's local wall-clock.
    pub fn utc_to_local(&self, utc: NaiveDateTime) -> NaiveDateTime {
        utc + self.to_duration()
    }

    /// Shift a local wall-clock instant back to UTC.
    pub fn local_to_utc(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - self.to_duration()
    }
}

impl Default for TzOffset {
    fn default() -> Self {
        Self::UTC
    }
}

impl Display for TzOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.minutes < 0 { '-' } else { '+' };
        let abs = self.minutes.abs();
        write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)
    }
}

#[derive(Error, Debug)]
pub enum InvalidOffsetError {
    #[error("Malformed UTC offset: {0}")]
    Malformed(String),
    #[error("UTC offset out of range: {0}")]
    OutOfRange(String),
}

impl FromStr for TzOffset {
    type Err = InvalidOffsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use InvalidOffsetError::{Malformed, OutOfRange};

        let sign = match s.chars().next() {
            Some('+') => 1,
            Some('-') => -1,
            _ => return Err(Malformed(s.to_string())),
        };
        let (hours, minutes) = s[1..]
            .split_once(':')
            .ok_or_else(|| Malformed(s.to_string()))?;
        let hours = hours
            .parse::<i32>()
            .map_err(|_| Malformed(s.to_string()))?;
        let minutes = minutes
            .parse::<i32>()
            .map_err(|_| Malformed(s.to_string()))?;

        let signed_hours = sign * hours;
        if !(-12..=14).contains(&signed_hours) || !(0..=59).contains(&minutes) {
            return Err(OutOfRange(s.to_string()));
        }

        Ok(TzOffset {
            minutes: sign * (hours * 60 + minutes),
        })
    }
}

impl Serialize for TzOffset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TzOffset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct TzOffsetVisitor;

        impl Visitor<'_> for TzOffsetVisitor {
            type Value = TzOffset;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("A UTC offset of the form ±HH:MM")
            }

            fn visit_str<E>(self, value: &str) -> Result<TzOffset, E>
            where
                E: serde::de::Error,
            {
                value
                    .parse::<TzOffset>()
                    .map_err(|_| E::custom(format!("Malformed UTC offset: {}", value)))
            }
        }

        deserializer.deserialize_str(TzOffsetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn parses_valid_offsets() {
        assert_eq!("+00:00".parse::<TzOffset>().unwrap().minutes(), 0);
        assert_eq!("+03:30".parse::<TzOffset>().unwrap().minutes(), 210);
        assert_eq!("-05:00".parse::<TzOffset>().unwrap().minutes(), -300);
        assert_eq!("+14:00".parse::<TzOffset>().unwrap().minutes(), 840);
        assert_eq!("-12:00".parse::<TzOffset>().unwrap().minutes(), -720);
    }

    #[test]
    fn rejects_malformed_offsets() {
        assert!("".parse::<TzOffset>().is_err());
        assert!("03:30".parse::<TzOffset>().is_err());
        assert!("+0330".parse::<TzOffset>().is_err());
        assert!("+3:3x".parse::<TzOffset>().is_err());
        assert!("+15:00".parse::<TzOffset>().is_err());
        assert!("-13:00".parse::<TzOffset>().is_err());
        assert!("+03:60".parse::<TzOffset>().is_err());
    }

    #[test]
    fn round_trips_display() {
        for raw in ["+00:00", "+03:30", "-05:45", "+14:00"] {
            assert_eq!(raw.parse::<TzOffset>().unwrap().to_string(), raw);
        }
    }

    #[test]
    fn local_utc_round_trip() {
        let tehran = "+03:30".parse::<TzOffset>().unwrap();
        let utc = dt(2025, 1, 11, 4, 30);
        assert_eq!(tehran.utc_to_local(utc), dt(2025, 1, 11, 8, 0));
        assert_eq!(tehran.local_to_utc(tehran.utc_to_local(utc)), utc);

        let ny = "-05:00".parse::<TzOffset>().unwrap();
        let local = dt(2025, 6, 1, 0, 15);
        assert_eq!(ny.utc_to_local(ny.local_to_utc(local)), local);
    }

    #[test]
    fn crosses_midnight_both_ways() {
        let tz = "+03:30".parse::<TzOffset>().unwrap();
        assert_eq!(tz.utc_to_local(dt(2025, 3, 31, 22, 0)), dt(2025, 4, 1, 1, 30));
        let tz = "-05:00".parse::<TzOffset>().unwrap();
        assert_eq!(tz.utc_to_local(dt(2025, 1, 1, 2, 0)), dt(2024, 12, 31, 21, 0));
    }
}

pub mod calendar;
mod date;
pub mod materialize;
pub mod parse;
mod reminder;
mod settings;
mod shared;
mod timezone;

pub use calendar::{CalendarDate, CalendarSystem};
pub use chrono::Weekday;
pub use date::{
    MINUTE_FORMAT,
    format_local,
    format_minute,
    parse_minute,
    to_persian_digits,
    truncate_to_minute,
};
pub use materialize::{MaterializeError, resolve_fire_time};
pub use parse::{ParsedReminder, RawParsedReminder, ReminderDelta, SpecificDate, sanitize_content};
pub use reminder::{
    Category,
    NewReminder,
    NotificationPayload,
    PayloadButton,
    Reminder,
    ReminderAction,
    ReminderStatus,
    ReminderUpdate,
};
pub use settings::{ReminderBuckets, UserDocument, UserSettings};
pub use shared::{
    entity::{Entity, ID},
    recurrence::{IntervalUnit, Repeat},
};
pub use timezone::{InvalidOffsetError, TzOffset};

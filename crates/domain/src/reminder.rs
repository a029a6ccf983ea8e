use std::{fmt::Display, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, de::Visitor};

use crate::{
    calendar::CalendarSystem,
    shared::{
        entity::{Entity, ID},
        recurrence::Repeat,
    },
    timezone::TzOffset,
};

/// Reminder category. Drives the notification payload and the follow-up
/// policy; anything the parser emits outside this closed set coerces to
/// `General`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Category {
    #[default]
    General,
    Medicine,
    Birthday,
    BirthdayPreWeek,
    BirthdayPreThree,
    Installment,
    InstallmentRetry,
    Appointment,
    Work,
    Exercise,
    Prayer,
    Shopping,
    Call,
    Study,
    Bill,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Medicine => "medicine",
            Category::Birthday => "birthday",
            Category::BirthdayPreWeek => "birthday_pre_week",
            Category::BirthdayPreThree => "birthday_pre_three",
            Category::Installment => "installment",
            Category::InstallmentRetry => "installment_retry",
            Category::Appointment => "appointment",
            Category::Work => "work",
            Category::Exercise => "exercise",
            Category::Prayer => "prayer",
            Category::Shopping => "shopping",
            Category::Call => "call",
            Category::Study => "study",
            Category::Bill => "bill",
        }
    }

    /// Coercing lookup: unknown names become `General`.
    pub fn coerce(raw: &str) -> Category {
        raw.parse().unwrap_or_default()
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Category::General => "⏰",
            Category::Medicine => "💊",
            Category::Birthday => "🎂",
            Category::BirthdayPreWeek | Category::BirthdayPreThree => "📅",
            Category::Installment | Category::Bill => "💳",
            Category::InstallmentRetry => "💳⚠️",
            Category::Appointment => "📅",
            Category::Work => "💼",
            Category::Exercise => "🏃",
            Category::Prayer => "🕌",
            Category::Shopping => "🛒",
            Category::Call => "📞",
            Category::Study => "📚",
        }
    }

    /// Interactive actions offered with a notification for this category.
    pub fn actions(&self, id: ID) -> Vec<ReminderAction> {
        match self {
            Category::Medicine => vec![ReminderAction {
                label_key: "medicine_taken",
                callback: format!("taken_{id}"),
            }],
            Category::Birthday | Category::BirthdayPreWeek | Category::BirthdayPreThree => {
                vec![ReminderAction {
                    label_key: "stop_reminder",
                    callback: format!("stop_{id}"),
                }]
            }
            Category::Installment | Category::InstallmentRetry | Category::Bill => vec![
                ReminderAction {
                    label_key: "installment_paid",
                    callback: format!("paid_{id}"),
                },
                ReminderAction {
                    label_key: "stop_reminder",
                    callback: format!("stop_{id}"),
                },
            ],
            _ => Vec::new(),
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "general" => Category::General,
            "medicine" => Category::Medicine,
            "birthday" => Category::Birthday,
            "birthday_pre_week" => Category::BirthdayPreWeek,
            "birthday_pre_three" => Category::BirthdayPreThree,
            "installment" => Category::Installment,
            "installment_retry" => Category::InstallmentRetry,
            "appointment" => Category::Appointment,
            "work" => Category::Work,
            "exercise" => Category::Exercise,
            "prayer" => Category::Prayer,
            "shopping" => Category::Shopping,
            "call" => Category::Call,
            "study" => Category::Study,
            "bill" => Category::Bill,
            _ => return Err(()),
        })
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct CategoryVisitor;

        impl Visitor<'_> for CategoryVisitor {
            type Value = Category;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("A reminder category name")
            }

            fn visit_str<E>(self, value: &str) -> Result<Category, E>
            where
                E: serde::de::Error,
            {
                // Unknown categories coerce rather than fail.
                Ok(Category::coerce(value))
            }
        }

        deserializer.deserialize_str(CategoryVisitor)
    }
}

/// One interactive button offered with a notification. The callback string
/// (`taken_<id>`, `paid_<id>`, `stop_<id>`) comes back over the wire as a
/// status-transition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderAction {
    pub label_key: &'static str,
    pub callback: String,
}

/// A rendered notification ready for a transport: localized text plus the
/// buttons to offer with it.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub text: String,
    pub actions: Vec<PayloadButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadButton {
    pub label: String,
    pub callback: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl ReminderStatus {
    /// `completed` and `cancelled` are terminal; transitions never lead back
    /// to `active`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReminderStatus::Active)
    }
}

impl From<ReminderStatus> for String {
    fn from(s: ReminderStatus) -> Self {
        match s {
            ReminderStatus::Active => "active".into(),
            ReminderStatus::Completed => "completed".into(),
            ReminderStatus::Cancelled => "cancelled".into(),
        }
    }
}

impl TryFrom<String> for ReminderStatus {
    type Error = anyhow::Error;
    fn try_from(s: String) -> anyhow::Result<ReminderStatus> {
        Ok(match &s[..] {
            "active" => ReminderStatus::Active,
            "completed" => ReminderStatus::Completed,
            "cancelled" => ReminderStatus::Cancelled,
            _ => Err(anyhow::anyhow!("Invalid status"))?,
        })
    }
}

/// A stored reminder row.
///
/// `fire_time_utc` is the canonical schedule moment, minute precision. The
/// offset and calendar are immutable metadata captured at insert time; a
/// user later changing zone or calendar does not re-anchor existing rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ID,
    pub user_id: i64,
    pub category: Category,
    pub content: String,
    pub fire_time_utc: NaiveDateTime,
    pub timezone: TzOffset,
    pub calendar: CalendarSystem,
    pub repeat: Repeat,
    pub status: ReminderStatus,
    pub meta: Option<serde_json::Value>,
}

impl Reminder {
    /// Fire time shifted into the row's own zone, for display and for
    /// calendar arithmetic on the local wall-clock.
    pub fn local_fire_time(&self) -> NaiveDateTime {
        self.timezone.utc_to_local(self.fire_time_utc)
    }

    /// For `installment_retry` rows: the id of the installment they chase.
    pub fn installment_base_id(&self) -> Option<ID> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.get("base_id"))
            .and_then(|id| id.as_i64())
            .map(ID::new)
    }
}

impl Entity<ID> for Reminder {
    fn id(&self) -> ID {
        self.id
    }
}

/// Fields of a reminder that exist before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: i64,
    pub category: Category,
    pub content: String,
    pub fire_time_utc: NaiveDateTime,
    pub timezone: TzOffset,
    pub calendar: CalendarSystem,
    pub repeat: Repeat,
    pub meta: Option<serde_json::Value>,
}

/// Partial update applied by the edit flow; untouched fields keep their
/// current values.
#[derive(Debug, Clone, Default)]
pub struct ReminderUpdate {
    pub category: Option<Category>,
    pub content: Option<String>,
    pub fire_time_utc: Option<NaiveDateTime>,
    pub repeat: Option<Repeat>,
}

use serde::{Deserialize, Serialize};

use crate::{calendar::CalendarSystem, shared::entity::ID, timezone::TzOffset};

/// Per-user preferences. Created with deployment defaults on first
/// interaction and mutated by user commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub language: String,
    pub timezone: TzOffset,
    pub calendar: CalendarSystem,
    pub setup_complete: bool,
}

impl UserSettings {
    pub fn with_defaults(language: &str, timezone: TzOffset, calendar: CalendarSystem) -> Self {
        Self {
            language: language.to_string(),
            timezone,
            calendar,
            setup_complete: false,
        }
    }
}

/// Reminder ids bucketed by status, mirrored into the user document so a
/// user's history survives store cleanup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderBuckets {
    pub active: Vec<ID>,
    pub completed: Vec<ID>,
    pub cancelled: Vec<ID>,
}

impl ReminderBuckets {
    pub fn add_active(&mut self, id: ID) {
        if !self.active.contains(&id) {
            self.active.push(id);
        }
    }

    pub fn mark_completed(&mut self, id: ID) {
        self.active.retain(|held| *held != id);
        if !self.completed.contains(&id) {
            self.completed.push(id);
        }
    }

    pub fn mark_cancelled(&mut self, id: ID) {
        self.active.retain(|held| *held != id);
        if !self.cancelled.contains(&id) {
            self.cancelled.push(id);
        }
    }
}

/// The per-user document held by the settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    pub user_id: i64,
    pub settings: UserSettings,
    pub reminders: ReminderBuckets,
}

impl UserDocument {
    pub fn with_defaults(
        user_id: i64,
        language: &str,
        timezone: TzOffset,
        calendar: CalendarSystem,
    ) -> Self {
        Self {
            user_id,
            settings: UserSettings::with_defaults(language, timezone, calendar),
            reminders: ReminderBuckets::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_move_ids_between_states() {
        let mut buckets = ReminderBuckets::default();
        buckets.add_active(ID::new(1));
        buckets.add_active(ID::new(2));
        buckets.add_active(ID::new(1));
        assert_eq!(buckets.active.len(), 2);

        buckets.mark_completed(ID::new(1));
        assert_eq!(buckets.active, vec![ID::new(2)]);
        assert_eq!(buckets.completed, vec![ID::new(1)]);

        buckets.mark_cancelled(ID::new(2));
        assert!(buckets.active.is_empty());
        assert_eq!(buckets.cancelled, vec![ID::new(2)]);
    }

    #[test]
    fn document_serde_round_trip() {
        let doc = UserDocument::with_defaults(
            99,
            "fa",
            "+03:30".parse().unwrap(),
            CalendarSystem::Shamsi,
        );
        let raw = serde_json::to_string(&doc).unwrap();
        let back: UserDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, doc);
        assert!(!back.settings.setup_complete);
        assert_eq!(back.settings.timezone.minutes(), 210);
    }
}

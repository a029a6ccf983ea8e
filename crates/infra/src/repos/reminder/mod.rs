mod sqlite;

use chrono::NaiveDateTime;
pub use sqlite::SqliteReminderRepo;
use yadavar_domain::{ID, NewReminder, Reminder, ReminderStatus, ReminderUpdate};

/// Counts kept by the cleanup task's periodic log line and the stats surface.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub distinct_users: i64,
    /// Category histogram over non-cancelled rows.
    pub by_category: Vec<(String, i64)>,
}

#[async_trait::async_trait]
pub trait IReminderRepo: Send + Sync {
    /// Insert a reminder. A yearly birthday expands into its pre-notice trio
    /// inside one transaction; the returned id is the birthday row's.
    async fn insert(&self, reminder: &NewReminder) -> anyhow::Result<ID>;
    async fn get(&self, id: ID) -> anyhow::Result<Option<Reminder>>;
    async fn list(&self, user_id: i64, status: ReminderStatus) -> anyhow::Result<Vec<Reminder>>;
    async fn all_active(&self) -> anyhow::Result<Vec<Reminder>>;
    /// Active rows due at `now_utc`, oldest first, malformed rows skipped.
    async fn due(&self, now_utc: NaiveDateTime, limit: u32) -> anyhow::Result<Vec<Reminder>>;
    async fn count_active(&self, user_id: i64) -> anyhow::Result<i64>;
    /// Returns false when the row had already left `active`.
    async fn update_status(&self, id: ID, status: ReminderStatus) -> anyhow::Result<bool>;
    async fn update_fire_time_utc(&self, id: ID, fire_time_utc: NaiveDateTime)
    -> anyhow::Result<()>;
    /// Accepts the row's local wall-clock and converts using its own offset.
    async fn update_fire_time_local(&self, id: ID, local: NaiveDateTime) -> anyhow::Result<()>;
    async fn update_fields(&self, id: ID, update: &ReminderUpdate) -> anyhow::Result<()>;
    async fn count_installment_retries(&self, base_id: ID) -> anyhow::Result<i64>;
    /// Move an installment to `status` and cancel its outstanding retries in
    /// the same transaction. Returns the cancelled retry ids.
    async fn settle_installment(
        &self,
        base_id: ID,
        status: ReminderStatus,
    ) -> anyhow::Result<Vec<ID>>;
    /// Cancel a birthday and both of its pre-notices. Returns their ids.
    async fn cancel_birthday_group(&self, user_id: i64, content: &str) -> anyhow::Result<Vec<ID>>;
    async fn cleanup_old(&self, days: u32) -> anyhow::Result<u64>;
    async fn stats(&self, user_id: Option<i64>) -> anyhow::Result<StoreStats>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use yadavar_domain::{
        CalendarSystem,
        Category,
        IntervalUnit,
        Repeat,
        TzOffset,
        truncate_to_minute,
    };

    use super::*;
    use crate::{Config, repos::Repos, system::RealSys};

    async fn setup() -> Repos {
        Repos::create_sqlite("sqlite::memory:", &Config::new(), Arc::new(RealSys))
            .await
            .unwrap()
    }

    fn new_reminder(user_id: i64, minutes_ahead: i64) -> NewReminder {
        NewReminder {
            user_id,
            category: Category::General,
            content: "water the plants".into(),
            fire_time_utc: truncate_to_minute(Utc::now().naive_utc())
                + Duration::minutes(minutes_ahead),
            timezone: TzOffset::UTC,
            calendar: CalendarSystem::Gregorian,
            repeat: Repeat::None,
            meta: None,
        }
    }

    #[tokio::test]
    async fn crud() {
        let repos = setup().await;
        let id = repos.reminders.insert(&new_reminder(1, 60)).await.unwrap();
        let stored = repos.reminders.get(id).await.unwrap().unwrap();
        assert_eq!(stored.user_id, 1);
        assert_eq!(stored.status, ReminderStatus::Active);
        assert_eq!(stored.repeat, Repeat::None);

        let listed = repos.reminders.list(1, ReminderStatus::Active).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);

        assert!(repos
            .reminders
            .update_status(id, ReminderStatus::Completed)
            .await
            .unwrap());
        assert!(repos
            .reminders
            .list(1, ReminderStatus::Active)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn status_transitions_are_monotonic() {
        let repos = setup().await;
        let id = repos.reminders.insert(&new_reminder(2, 60)).await.unwrap();
        assert!(repos
            .reminders
            .update_status(id, ReminderStatus::Cancelled)
            .await
            .unwrap());
        // A terminal row never transitions again.
        assert!(!repos
            .reminders
            .update_status(id, ReminderStatus::Completed)
            .await
            .unwrap());
        let stored = repos.reminders.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Cancelled);
    }

    #[tokio::test]
    async fn due_returns_oldest_first_up_to_limit() {
        let repos = setup().await;
        let now = truncate_to_minute(Utc::now().naive_utc());
        for minutes in [-30i64, -20, -10] {
            repos.reminders.insert(&new_reminder(3, minutes)).await.unwrap();
        }
        repos.reminders.insert(&new_reminder(3, 60)).await.unwrap();

        let due = repos.reminders.due(now, 2).await.unwrap();
        assert_eq!(due.len(), 2);
        assert!(due[0].fire_time_utc <= due[1].fire_time_utc);

        let all_due = repos.reminders.due(now, 500).await.unwrap();
        assert_eq!(all_due.len(), 3);
        let times: Vec<_> = all_due.iter().map(|r| r.fire_time_utc).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[tokio::test]
    async fn due_skips_malformed_rows() {
        let repos = setup().await;
        repos.reminders.insert(&new_reminder(4, -5)).await.unwrap();
        // A row with a corrupt fire time must be skipped, not crash the tick.
        sqlx::query(
            "INSERT INTO reminders (user_id, category, content, fire_time, timezone, calendar, repeat, status) \
             VALUES (4, 'general', 'broken', 'garbage', '+00:00', 'gregorian', 'none', 'active')",
        )
        .execute(repos.pool())
        .await
        .unwrap();

        let now = truncate_to_minute(Utc::now().naive_utc());
        let due = repos.reminders.due(now, 500).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].content, "water the plants");
    }

    #[tokio::test]
    async fn birthday_insert_creates_the_trio_atomically() {
        let repos = setup().await;
        let tz: TzOffset = "+03:30".parse().unwrap();
        // Anchor the birthday two months out so the pre-notices stay future.
        let local_anchor = truncate_to_minute(Utc::now().naive_utc() + Duration::days(60));
        let reminder = NewReminder {
            user_id: 5,
            category: Category::Birthday,
            content: "تولد علی".into(),
            fire_time_utc: tz.local_to_utc(local_anchor),
            timezone: tz,
            calendar: CalendarSystem::Shamsi,
            repeat: Repeat::Yearly,
            meta: None,
        };
        let id = repos.reminders.insert(&reminder).await.unwrap();

        let rows = repos.reminders.list(5, ReminderStatus::Active).await.unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.content, "تولد علی");
            assert_eq!(row.repeat, Repeat::Yearly);
            assert_eq!(row.calendar, CalendarSystem::Shamsi);
        }

        let birthday = rows.iter().find(|r| r.category == Category::Birthday).unwrap();
        assert_eq!(birthday.id, id);
        let birthday_local = birthday.local_fire_time();
        assert_eq!(birthday_local.format("%H:%M").to_string(), "08:00");

        let pre_week = rows
            .iter()
            .find(|r| r.category == Category::BirthdayPreWeek)
            .unwrap();
        let pre_three = rows
            .iter()
            .find(|r| r.category == Category::BirthdayPreThree)
            .unwrap();
        assert_eq!(
            pre_week.local_fire_time().date(),
            birthday_local.date() - Duration::days(7)
        );
        assert_eq!(
            pre_three.local_fire_time().date(),
            birthday_local.date() - Duration::days(3)
        );
        for pre in [pre_week, pre_three] {
            assert_eq!(pre.local_fire_time().format("%H:%M").to_string(), "00:01");
        }
    }

    #[tokio::test]
    async fn imminent_birthday_pre_notices_roll_to_next_year() {
        let repos = setup().await;
        // Birthday tomorrow: this year's D-7 and D-3 are already gone.
        let local_anchor = truncate_to_minute(Utc::now().naive_utc() + Duration::days(1));
        let reminder = NewReminder {
            user_id: 6,
            category: Category::Birthday,
            content: "تولد مریم".into(),
            fire_time_utc: local_anchor,
            timezone: TzOffset::UTC,
            calendar: CalendarSystem::Gregorian,
            repeat: Repeat::Yearly,
            meta: None,
        };
        repos.reminders.insert(&reminder).await.unwrap();

        let now = truncate_to_minute(Utc::now().naive_utc());
        for row in repos.reminders.list(6, ReminderStatus::Active).await.unwrap() {
            assert!(row.fire_time_utc >= now, "{:?} is in the past", row);
        }
    }

    #[tokio::test]
    async fn installment_retries_count_and_settle_together() {
        let repos = setup().await;
        let base_id = repos
            .reminders
            .insert(&NewReminder {
                category: Category::Installment,
                repeat: Repeat::Monthly { day: None },
                ..new_reminder(7, -10)
            })
            .await
            .unwrap();
        for attempt in 1..=2i64 {
            repos
                .reminders
                .insert(&NewReminder {
                    category: Category::InstallmentRetry,
                    content: format!("Retry #{attempt}"),
                    meta: Some(serde_json::json!({ "base_id": base_id.as_i64() })),
                    ..new_reminder(7, 60 * attempt)
                })
                .await
                .unwrap();
        }

        assert_eq!(
            repos.reminders.count_installment_retries(base_id).await.unwrap(),
            2
        );

        let cancelled = repos
            .reminders
            .settle_installment(base_id, ReminderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 2);
        assert_eq!(
            repos.reminders.count_installment_retries(base_id).await.unwrap(),
            0
        );
        let base = repos.reminders.get(base_id).await.unwrap().unwrap();
        assert_eq!(base.status, ReminderStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_birthday_group_sweeps_all_three() {
        let repos = setup().await;
        let local_anchor = truncate_to_minute(Utc::now().naive_utc() + Duration::days(90));
        repos
            .reminders
            .insert(&NewReminder {
                user_id: 8,
                category: Category::Birthday,
                content: "تولد رضا".into(),
                fire_time_utc: local_anchor,
                timezone: TzOffset::UTC,
                calendar: CalendarSystem::Qamari,
                repeat: Repeat::Yearly,
                meta: None,
            })
            .await
            .unwrap();

        let cancelled = repos
            .reminders
            .cancel_birthday_group(8, "تولد رضا")
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 3);
        assert!(repos.reminders.list(8, ReminderStatus::Active).await.unwrap().is_empty());
        assert_eq!(
            repos.reminders.list(8, ReminderStatus::Cancelled).await.unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn cleanup_deletes_only_old_terminal_rows() {
        let repos = setup().await;
        let stale = repos.reminders.insert(&new_reminder(9, -60 * 24 * 40)).await.unwrap();
        repos
            .reminders
            .update_status(stale, ReminderStatus::Completed)
            .await
            .unwrap();
        let recent = repos.reminders.insert(&new_reminder(9, -60)).await.unwrap();
        repos
            .reminders
            .update_status(recent, ReminderStatus::Cancelled)
            .await
            .unwrap();
        let live = repos.reminders.insert(&new_reminder(9, -60 * 24 * 40)).await.unwrap();

        let deleted = repos.reminders.cleanup_old(30).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repos.reminders.get(stale).await.unwrap().is_none());
        assert!(repos.reminders.get(recent).await.unwrap().is_some());
        // Active rows are never cleaned up, however old.
        assert!(repos.reminders.get(live).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stats_count_by_status_and_category() {
        let repos = setup().await;
        repos.reminders.insert(&new_reminder(10, 10)).await.unwrap();
        repos
            .reminders
            .insert(&NewReminder {
                category: Category::Medicine,
                repeat: Repeat::Interval { value: 8, unit: IntervalUnit::Hours },
                ..new_reminder(10, 20)
            })
            .await
            .unwrap();
        let done = repos.reminders.insert(&new_reminder(11, 30)).await.unwrap();
        repos.reminders.update_status(done, ReminderStatus::Completed).await.unwrap();

        let stats = repos.reminders.stats(None).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.distinct_users, 2);
        assert!(stats.by_category.contains(&("medicine".to_string(), 1)));

        let stats = repos.reminders.stats(Some(10)).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.distinct_users, 1);
    }

    #[tokio::test]
    async fn update_fire_time_local_converts_through_row_offset() {
        let repos = setup().await;
        let tz: TzOffset = "+03:30".parse().unwrap();
        let id = repos
            .reminders
            .insert(&NewReminder { timezone: tz, ..new_reminder(12, 60) })
            .await
            .unwrap();

        let local = chrono::NaiveDate::from_ymd_opt(2099, 1, 11)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        repos.reminders.update_fire_time_local(id, local).await.unwrap();

        let stored = repos.reminders.get(id).await.unwrap().unwrap();
        assert_eq!(format_minute_local(&stored), "2099-01-11 08:00");
        assert_eq!(
            yadavar_domain::format_minute(stored.fire_time_utc),
            "2099-01-11 04:30"
        );
    }

    fn format_minute_local(reminder: &Reminder) -> String {
        yadavar_domain::format_minute(reminder.local_fire_time())
    }
}

use std::{convert::TryFrom, sync::Arc};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{FromRow, QueryBuilder, SqlitePool};
use tracing::{error, instrument, warn};
use yadavar_domain::{
    Category,
    ID,
    NewReminder,
    Reminder,
    ReminderStatus,
    ReminderUpdate,
    Repeat,
    calendar,
    format_minute,
    parse_minute,
};

use super::{IReminderRepo, StoreStats};
use crate::system::ISys;

pub struct SqliteReminderRepo {
    pool: SqlitePool,
    sys: Arc<dyn ISys>,
}

impl SqliteReminderRepo {
    pub fn new(pool: SqlitePool, sys: Arc<dyn ISys>) -> Self {
        Self { pool, sys }
    }
}

#[derive(Debug, FromRow, Clone)]
struct ReminderRaw {
    id: i64,
    user_id: i64,
    category: String,
    content: String,
    fire_time: String,
    timezone: String,
    calendar: String,
    repeat: String,
    status: String,
    meta: Option<String>,
}

impl TryFrom<ReminderRaw> for Reminder {
    type Error = anyhow::Error;

    fn try_from(r: ReminderRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: ID::new(r.id),
            user_id: r.user_id,
            category: Category::coerce(&r.category),
            content: r.content,
            fire_time_utc: parse_minute(&r.fire_time)
                .map_err(|e| anyhow::anyhow!("Unparseable fire_time {:?}: {e}", r.fire_time))?,
            timezone: r
                .timezone
                .parse()
                .map_err(|e| anyhow::anyhow!("Unparseable timezone {:?}: {e}", r.timezone))?,
            calendar: r
                .calendar
                .parse()
                .map_err(|e| anyhow::anyhow!("Unparseable calendar {:?}: {e}", r.calendar))?,
            repeat: Repeat::parse(&r.repeat),
            status: ReminderStatus::try_from(r.status)?,
            meta: r.meta.as_deref().and_then(|m| serde_json::from_str(m).ok()),
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, category, content, fire_time, timezone, calendar, repeat, status, meta \
     FROM reminders";

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default())
}

/// Keep rows out of the past at insert time: a pre-notice whose moment has
/// already gone this year belongs to next year's occurrence.
fn rolled_forward(
    date: NaiveDate,
    hour: u32,
    minute: u32,
    reminder: &NewReminder,
    now_utc: NaiveDateTime,
) -> (NaiveDate, NaiveDateTime) {
    let utc = reminder.timezone.local_to_utc(at(date, hour, minute));
    if utc >= now_utc {
        return (date, utc);
    }
    let next = calendar::add_years(date, 1, reminder.calendar).unwrap_or(date);
    (next, reminder.timezone.local_to_utc(at(next, hour, minute)))
}

fn discarding_malformed(rows: Vec<ReminderRaw>) -> Vec<Reminder> {
    rows.into_iter()
        .filter_map(|raw| {
            let id = raw.id;
            match Reminder::try_from(raw) {
                Ok(reminder) => Some(reminder),
                Err(e) => {
                    warn!("Skipping malformed reminder row {id}: {e:?}");
                    None
                }
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl IReminderRepo for SqliteReminderRepo {
    #[instrument(skip(self, reminder), fields(user_id = reminder.user_id, category = %reminder.category))]
    async fn insert(&self, reminder: &NewReminder) -> anyhow::Result<ID> {
        let now = self.sys.now_minute();
        let mut tx = self.pool.begin().await?;

        let is_birthday_group =
            reminder.category == Category::Birthday && reminder.repeat == Repeat::Yearly;

        // Birthdays are snapped to 08:00 local; the utterance's time of day
        // only served to anchor the date.
        let (fire_time_utc, pre_notices) = if is_birthday_group {
            let local_date = reminder.timezone.utc_to_local(reminder.fire_time_utc).date();
            let (anchor, birthday_utc) = rolled_forward(local_date, 8, 0, reminder, now);
            let pre_notices = [(Category::BirthdayPreWeek, 7), (Category::BirthdayPreThree, 3)]
                .into_iter()
                .map(|(category, days_before)| {
                    let date = anchor - Duration::days(days_before);
                    let (_, utc) = rolled_forward(date, 0, 1, reminder, now);
                    (category, utc)
                })
                .collect();
            (birthday_utc, pre_notices)
        } else {
            (reminder.fire_time_utc, Vec::new())
        };

        let meta = reminder.meta.as_ref().map(|m| m.to_string());
        let result = sqlx::query(
            "INSERT INTO reminders (user_id, category, content, fire_time, timezone, calendar, repeat, status, meta) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8)",
        )
        .bind(reminder.user_id)
        .bind(reminder.category.as_str())
        .bind(&reminder.content)
        .bind(format_minute(fire_time_utc))
        .bind(reminder.timezone.to_string())
        .bind(reminder.calendar.as_str())
        .bind(reminder.repeat.canonical())
        .bind(&meta)
        .execute(&mut *tx)
        .await
        .inspect_err(|err| {
            error!("Unable to insert reminder for user {}: {err:?}", reminder.user_id);
        })?;
        let id = ID::new(result.last_insert_rowid());

        for (category, utc) in pre_notices {
            sqlx::query(
                "INSERT INTO reminders (user_id, category, content, fire_time, timezone, calendar, repeat, status, meta) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8)",
            )
            .bind(reminder.user_id)
            .bind(category.as_str())
            .bind(&reminder.content)
            .bind(format_minute(utc))
            .bind(reminder.timezone.to_string())
            .bind(reminder.calendar.as_str())
            .bind(Repeat::Yearly.canonical())
            .bind(&meta)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: ID) -> anyhow::Result<Option<Reminder>> {
        let row = sqlx::query_as::<_, ReminderRaw>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Reminder::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, user_id: i64, status: ReminderStatus) -> anyhow::Result<Vec<Reminder>> {
        let status: String = status.into();
        let rows = sqlx::query_as::<_, ReminderRaw>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 AND status = ?2 ORDER BY fire_time ASC"
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(discarding_malformed(rows))
    }

    #[instrument(skip(self))]
    async fn all_active(&self) -> anyhow::Result<Vec<Reminder>> {
        let rows = sqlx::query_as::<_, ReminderRaw>(&format!(
            "{SELECT_COLUMNS} WHERE status = 'active' ORDER BY fire_time ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(discarding_malformed(rows))
    }

    #[instrument(skip(self))]
    async fn due(&self, now_utc: NaiveDateTime, limit: u32) -> anyhow::Result<Vec<Reminder>> {
        let rows = sqlx::query_as::<_, ReminderRaw>(&format!(
            "{SELECT_COLUMNS} WHERE status = 'active' AND fire_time <= ?1 \
             ORDER BY fire_time ASC LIMIT ?2"
        ))
        .bind(format_minute(now_utc))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        // A malformed row must never crash the scheduler; it is skipped and
        // logged instead.
        Ok(discarding_malformed(rows))
    }

    #[instrument(skip(self))]
    async fn count_active(&self, user_id: i64) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reminders WHERE user_id = ?1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: ID, status: ReminderStatus) -> anyhow::Result<bool> {
        // Transitions are monotonic: terminal rows never change again.
        let status: String = status.into();
        let result = sqlx::query(
            "UPDATE reminders SET status = ?1 WHERE id = ?2 AND status = 'active'",
        )
        .bind(status)
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn update_fire_time_utc(&self, id: ID, fire_time_utc: NaiveDateTime) -> anyhow::Result<()> {
        sqlx::query("UPDATE reminders SET fire_time = ?1 WHERE id = ?2")
            .bind(format_minute(fire_time_utc))
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_fire_time_local(&self, id: ID, local: NaiveDateTime) -> anyhow::Result<()> {
        let timezone: Option<String> =
            sqlx::query_scalar("SELECT timezone FROM reminders WHERE id = ?1")
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await?;
        let timezone = timezone.ok_or_else(|| anyhow::anyhow!("No reminder with id {id}"))?;
        let offset: yadavar_domain::TzOffset = timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("Row {id} has unparseable timezone: {e}"))?;
        self.update_fire_time_utc(id, offset.local_to_utc(local)).await
    }

    #[instrument(skip(self, update))]
    async fn update_fields(&self, id: ID, update: &ReminderUpdate) -> anyhow::Result<()> {
        if update.category.is_none()
            && update.content.is_none()
            && update.fire_time_utc.is_none()
            && update.repeat.is_none()
        {
            return Ok(());
        }
        let mut builder = QueryBuilder::new("UPDATE reminders SET ");
        let mut fields = builder.separated(", ");
        if let Some(category) = &update.category {
            fields.push("category = ");
            fields.push_bind_unseparated(category.as_str());
        }
        if let Some(content) = &update.content {
            fields.push("content = ");
            fields.push_bind_unseparated(content.clone());
        }
        if let Some(fire_time_utc) = &update.fire_time_utc {
            fields.push("fire_time = ");
            fields.push_bind_unseparated(format_minute(*fire_time_utc));
        }
        if let Some(repeat) = &update.repeat {
            fields.push("repeat = ");
            fields.push_bind_unseparated(repeat.canonical());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id.as_i64());
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_installment_retries(&self, base_id: ID) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reminders \
             WHERE category = 'installment_retry' AND status = 'active' \
             AND CAST(json_extract(meta, '$.base_id') AS INTEGER) = ?1",
        )
        .bind(base_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn settle_installment(
        &self,
        base_id: ID,
        status: ReminderStatus,
    ) -> anyhow::Result<Vec<ID>> {
        // The base transition and the retry sweep commit together.
        let status: String = status.into();
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE reminders SET status = ?1 WHERE id = ?2 AND status = 'active'")
            .bind(status)
            .bind(base_id.as_i64())
            .execute(&mut *tx)
            .await?;
        let retry_ids: Vec<i64> = sqlx::query_scalar(
            "UPDATE reminders SET status = 'cancelled' \
             WHERE category = 'installment_retry' AND status = 'active' \
             AND CAST(json_extract(meta, '$.base_id') AS INTEGER) = ?1 \
             RETURNING id",
        )
        .bind(base_id.as_i64())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(retry_ids.into_iter().map(ID::new).collect())
    }

    #[instrument(skip(self, content))]
    async fn cancel_birthday_group(&self, user_id: i64, content: &str) -> anyhow::Result<Vec<ID>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "UPDATE reminders SET status = 'cancelled' \
             WHERE user_id = ?1 AND content = ?2 AND status = 'active' \
             AND category IN ('birthday', 'birthday_pre_week', 'birthday_pre_three') \
             RETURNING id",
        )
        .bind(user_id)
        .bind(content)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(ID::new).collect())
    }

    #[instrument(skip(self))]
    async fn cleanup_old(&self, days: u32) -> anyhow::Result<u64> {
        let cutoff = self.sys.now_minute() - Duration::days(days as i64);
        let result = sqlx::query(
            "DELETE FROM reminders \
             WHERE status IN ('completed', 'cancelled') AND fire_time < ?1",
        )
        .bind(format_minute(cutoff))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn stats(&self, user_id: Option<i64>) -> anyhow::Result<StoreStats> {
        let counts_sql = "SELECT COUNT(*), \
             COUNT(CASE WHEN status = 'active' THEN 1 END), \
             COUNT(CASE WHEN status = 'completed' THEN 1 END), \
             COUNT(CASE WHEN status = 'cancelled' THEN 1 END), \
             COUNT(DISTINCT user_id) \
             FROM reminders";
        let categories_sql = "SELECT category, COUNT(*) FROM reminders \
             WHERE status != 'cancelled'";

        let (counts, by_category): ((i64, i64, i64, i64, i64), Vec<(String, i64)>) =
            match user_id {
                Some(user_id) => (
                    sqlx::query_as(&format!("{counts_sql} WHERE user_id = ?1"))
                        .bind(user_id)
                        .fetch_one(&self.pool)
                        .await?,
                    sqlx::query_as(&format!(
                        "{categories_sql} AND user_id = ?1 GROUP BY category ORDER BY category"
                    ))
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?,
                ),
                None => (
                    sqlx::query_as(counts_sql).fetch_one(&self.pool).await?,
                    sqlx::query_as(&format!("{categories_sql} GROUP BY category ORDER BY category"))
                        .fetch_all(&self.pool)
                        .await?,
                ),
            };

        Ok(StoreStats {
            total: counts.0,
            active: counts.1,
            completed: counts.2,
            cancelled: counts.3,
            distinct_users: counts.4,
            by_category,
        })
    }
}

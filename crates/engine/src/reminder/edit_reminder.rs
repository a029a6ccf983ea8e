use std::sync::Arc;

use chrono::{Duration, Timelike};
use tracing::info;
use yadavar_domain::{
    ID,
    Reminder,
    ReminderStatus,
    ReminderUpdate,
    parse::parse_hhmm,
    calendar,
    sanitize_content,
};
use yadavar_infra::YadavarContext;

use crate::{error::EngineError, session::SessionStore, shared::usecase::UseCase};

/// Select a reminder as the edit target; the follow-up utterance is applied
/// by `EditReminderUseCase`. The target is held in session state with a TTL.
pub struct BeginEditUseCase {
    pub user_id: i64,
    pub reminder_id: ID,
    pub session: Arc<SessionStore>,
}

impl std::fmt::Debug for BeginEditUseCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeginEditUseCase")
            .field("user_id", &self.user_id)
            .field("reminder_id", &self.reminder_id)
            .finish()
    }
}

#[async_trait::async_trait]
impl UseCase for BeginEditUseCase {
    type Response = Reminder;
    type Error = EngineError;

    const NAME: &'static str = "BeginEdit";

    async fn execute(&mut self, ctx: &YadavarContext) -> Result<Self::Response, Self::Error> {
        let reminder = owned_active_reminder(ctx, self.user_id, self.reminder_id).await?;
        self.session.begin_edit(self.user_id, self.reminder_id).await;
        Ok(reminder)
    }
}

/// Apply a free-text edit to a reminder. Only the fields the parser detects
/// as changed are touched; the rest keep their current values.
pub struct EditReminderUseCase {
    pub user_id: i64,
    /// Explicit target; falls back to the session's pending edit.
    pub reminder_id: Option<ID>,
    pub utterance: String,
    pub session: Arc<SessionStore>,
}

impl std::fmt::Debug for EditReminderUseCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditReminderUseCase")
            .field("user_id", &self.user_id)
            .field("reminder_id", &self.reminder_id)
            .field("utterance", &self.utterance)
            .finish()
    }
}

#[async_trait::async_trait]
impl UseCase for EditReminderUseCase {
    type Response = Reminder;
    type Error = EngineError;

    const NAME: &'static str = "EditReminder";

    async fn execute(&mut self, ctx: &YadavarContext) -> Result<Self::Response, Self::Error> {
        if !self.session.check_rate_limit(self.user_id).await {
            return Err(EngineError::RateLimited);
        }

        let target = match self.reminder_id {
            Some(id) => id,
            None => self
                .session
                .take_pending_edit(self.user_id)
                .await
                .ok_or_else(|| EngineError::NotFound("no reminder selected for editing".into()))?,
        };
        let current = owned_active_reminder(ctx, self.user_id, target).await?;

        let delta = ctx
            .parser
            .parse_edit(&current, &self.utterance)
            .await
            .ok_or(EngineError::AiError)?;
        if delta.is_empty() {
            return Ok(current);
        }

        let mut update = ReminderUpdate {
            category: delta.category(),
            content: delta
                .content
                .as_deref()
                .map(|c| sanitize_content(c, ctx.config.max_content_length))
                .filter(|c| !c.is_empty()),
            repeat: delta.repeat(),
            fire_time_utc: None,
        };

        // A changed time or date re-anchors the fire instant; everything
        // else leaves the schedule untouched.
        if delta.time.is_some() || delta.specific_date.is_some() {
            let now_local = current.timezone.utc_to_local(ctx.sys.now_minute());
            let current_local = current.local_fire_time();

            let date = match &delta.specific_date {
                Some(specific) => match (specific.day, specific.month) {
                    (Some(day), Some(month)) => {
                        let cal = specific.calendar_system(current.calendar);
                        calendar::resolve_date(day, month, specific.year, cal, now_local.date())
                            .unwrap_or_else(|| current_local.date())
                    }
                    _ => current_local.date(),
                },
                None => current_local.date(),
            };
            let (hour, minute) = delta
                .time
                .as_deref()
                .and_then(parse_hhmm)
                .unwrap_or((current_local.hour(), current_local.minute()));
            let mut local = date
                .and_hms_opt(hour, minute, 0)
                .unwrap_or(current_local);
            if local <= now_local {
                local += Duration::days(1);
            }
            update.fire_time_utc = Some(current.timezone.local_to_utc(local));
        }

        ctx.repos.reminders.update_fields(target, &update).await?;
        let updated = ctx
            .repos
            .reminders
            .get(target)
            .await?
            .ok_or(EngineError::InternalError)?;
        info!("Edited reminder {} for user {}", target, self.user_id);
        Ok(updated)
    }
}

async fn owned_active_reminder(
    ctx: &YadavarContext,
    user_id: i64,
    id: ID,
) -> Result<Reminder, EngineError> {
    let reminder = ctx
        .repos
        .reminders
        .get(id)
        .await?
        .filter(|r| r.user_id == user_id && r.status == ReminderStatus::Active)
        .ok_or_else(|| EngineError::NotFound(format!("reminder {id}")))?;
    Ok(reminder)
}

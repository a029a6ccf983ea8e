use std::sync::Arc;

use tracing::info;
use yadavar_domain::{NewReminder, Reminder, ReminderStatus, sanitize_content};
use yadavar_infra::{ParseMessage, YadavarContext};

use super::sync_bucket;
use crate::{
    error::EngineError,
    session::SessionStore,
    shared::usecase::{Subscriber, UseCase},
};

/// Turn one utterance into stored reminders: rate-limit, parse, bound, and
/// insert. Birthday groups are expanded by the store itself.
pub struct CreateReminderUseCase {
    pub user_id: i64,
    pub utterance: String,
    pub session: Arc<SessionStore>,
}

impl std::fmt::Debug for CreateReminderUseCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateReminderUseCase")
            .field("user_id", &self.user_id)
            .field("utterance", &self.utterance)
            .finish()
    }
}

#[derive(Debug)]
pub struct CreatedReminders {
    pub user_id: i64,
    pub reminders: Vec<Reminder>,
}

#[async_trait::async_trait]
impl UseCase for CreateReminderUseCase {
    type Response = CreatedReminders;
    type Error = EngineError;

    const NAME: &'static str = "CreateReminder";

    async fn execute(&mut self, ctx: &YadavarContext) -> Result<Self::Response, Self::Error> {
        if !self.session.check_rate_limit(self.user_id).await {
            return Err(EngineError::RateLimited);
        }

        let doc = ctx.repos.user_docs.get(self.user_id).await?;
        let outcome = ctx
            .parser
            .parse(
                &doc.settings.language,
                doc.settings.timezone,
                doc.settings.calendar,
                &self.utterance,
            )
            .await;

        match outcome.message {
            Some(ParseMessage::AiError) => return Err(EngineError::AiError),
            Some(ParseMessage::PastDateError { detected, current }) => {
                return Err(EngineError::PastDate { detected, current });
            }
            None => {}
        }

        let active = ctx.repos.reminders.count_active(self.user_id).await?;
        if active + outcome.reminders.len() as i64 > ctx.config.max_reminders_per_user as i64 {
            return Err(EngineError::TooManyReminders);
        }

        let mut created = Vec::with_capacity(outcome.reminders.len());
        for materialized in outcome.reminders {
            let new_reminder = NewReminder {
                user_id: self.user_id,
                category: materialized.category,
                content: sanitize_content(&materialized.content, ctx.config.max_content_length),
                fire_time_utc: materialized.fire_time_utc,
                timezone: doc.settings.timezone,
                // The calendar at insert time anchors every later advance.
                calendar: doc.settings.calendar,
                repeat: materialized.repeat,
                meta: None,
            };
            let id = ctx.repos.reminders.insert(&new_reminder).await?;
            let stored = ctx
                .repos
                .reminders
                .get(id)
                .await?
                .ok_or(EngineError::InternalError)?;
            info!(
                "Created {} reminder {} for user {} firing at {}",
                stored.category, stored.id, self.user_id, stored.fire_time_utc
            );
            created.push(stored);
        }

        Ok(CreatedReminders { user_id: self.user_id, reminders: created })
    }

    fn subscribers() -> Vec<Box<dyn Subscriber<Self>>> {
        vec![Box::new(SyncUserDocOnCreate)]
    }
}

/// Mirrors freshly created ids into the user document's active bucket.
struct SyncUserDocOnCreate;

#[async_trait::async_trait]
impl Subscriber<CreateReminderUseCase> for SyncUserDocOnCreate {
    async fn notify(&self, e: &CreatedReminders, ctx: &YadavarContext) {
        let ids: Vec<_> = e.reminders.iter().map(|r| r.id).collect();
        sync_bucket(ctx, e.user_id, &ids, ReminderStatus::Active).await;
    }
}

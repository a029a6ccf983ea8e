use yadavar_domain::{Reminder, ReminderStatus, format_local};
use yadavar_infra::YadavarContext;

use crate::{error::EngineError, shared::usecase::UseCase};

/// A reminder together with its rendered schedule, in the row's own zone
/// and the user's current calendar and language.
#[derive(Debug, Clone)]
pub struct ReminderView {
    pub reminder: Reminder,
    pub local_time: String,
    pub repeat: String,
}

#[derive(Debug)]
pub struct ListRemindersUseCase {
    pub user_id: i64,
    pub status: ReminderStatus,
}

#[async_trait::async_trait]
impl UseCase for ListRemindersUseCase {
    type Response = Vec<ReminderView>;
    type Error = EngineError;

    const NAME: &'static str = "ListReminders";

    async fn execute(&mut self, ctx: &YadavarContext) -> Result<Self::Response, Self::Error> {
        let doc = ctx.repos.user_docs.get(self.user_id).await?;
        let rows = ctx
            .repos
            .reminders
            .list(self.user_id, self.status.clone())
            .await?;
        Ok(rows
            .into_iter()
            .map(|reminder| {
                let local_time = format_local(
                    reminder.local_fire_time(),
                    doc.settings.calendar,
                    &doc.settings.language,
                );
                let repeat = reminder.repeat.display(&doc.settings.language);
                ReminderView { reminder, local_time, repeat }
            })
            .collect())
    }
}

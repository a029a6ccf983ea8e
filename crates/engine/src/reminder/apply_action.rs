use tracing::info;
use yadavar_domain::{Category, ID, ReminderStatus};
use yadavar_infra::YadavarContext;

use super::sync_bucket;
use crate::{error::EngineError, shared::usecase::UseCase};

/// What a notification action ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// "Taken": the occurrence is acknowledged, the schedule is untouched.
    Acknowledged,
    /// "Paid": the installment completed, retries swept.
    Completed { cancelled_retries: Vec<ID> },
    /// "Stop": the reminder (and any linked rows) cancelled.
    Cancelled { ids: Vec<ID> },
}

/// Apply a `taken_<id>` / `paid_<id>` / `stop_<id>` callback coming back
/// from a notification.
#[derive(Debug)]
pub struct ApplyActionUseCase {
    pub user_id: i64,
    pub callback: String,
}

#[async_trait::async_trait]
impl UseCase for ApplyActionUseCase {
    type Response = ActionOutcome;
    type Error = EngineError;

    const NAME: &'static str = "ApplyAction";

    async fn execute(&mut self, ctx: &YadavarContext) -> Result<Self::Response, Self::Error> {
        let (action, id) = self
            .callback
            .split_once('_')
            .and_then(|(action, raw_id)| raw_id.parse::<ID>().ok().map(|id| (action, id)))
            .ok_or_else(|| EngineError::NotFound(self.callback.clone()))?;

        let reminder = ctx
            .repos
            .reminders
            .get(id)
            .await?
            .filter(|r| r.user_id == self.user_id)
            .ok_or_else(|| EngineError::NotFound(format!("reminder {id}")))?;

        match action {
            "taken" => {
                info!("User {} acknowledged reminder {id}", self.user_id);
                Ok(ActionOutcome::Acknowledged)
            }
            "paid" => {
                // A retry row settles the installment it chases. The base
                // transition and the retry sweep land in one transaction.
                let base_id = reminder.installment_base_id().unwrap_or(id);
                let cancelled_retries = ctx
                    .repos
                    .reminders
                    .settle_installment(base_id, ReminderStatus::Completed)
                    .await?;
                sync_bucket(ctx, self.user_id, &[base_id], ReminderStatus::Completed).await;
                sync_bucket(ctx, self.user_id, &cancelled_retries, ReminderStatus::Cancelled).await;
                info!("User {} settled installment {base_id}", self.user_id);
                Ok(ActionOutcome::Completed { cancelled_retries })
            }
            "stop" => {
                let ids = match reminder.category {
                    Category::Birthday
                    | Category::BirthdayPreWeek
                    | Category::BirthdayPreThree => {
                        // Stopping any of the trio silences all of it.
                        ctx.repos
                            .reminders
                            .cancel_birthday_group(self.user_id, &reminder.content)
                            .await?
                    }
                    Category::Installment | Category::InstallmentRetry | Category::Bill => {
                        let base_id = reminder.installment_base_id().unwrap_or(id);
                        let mut ids = ctx
                            .repos
                            .reminders
                            .settle_installment(base_id, ReminderStatus::Cancelled)
                            .await?;
                        ids.push(base_id);
                        ids
                    }
                    _ => {
                        ctx.repos
                            .reminders
                            .update_status(id, ReminderStatus::Cancelled)
                            .await?;
                        vec![id]
                    }
                };
                sync_bucket(ctx, self.user_id, &ids, ReminderStatus::Cancelled).await;
                info!("User {} stopped reminder {id} ({} rows)", self.user_id, ids.len());
                Ok(ActionOutcome::Cancelled { ids })
            }
            _ => Err(EngineError::NotFound(self.callback.clone())),
        }
    }
}

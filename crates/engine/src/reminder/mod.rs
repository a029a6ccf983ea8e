mod apply_action;
mod create_reminder;
mod edit_reminder;
mod list_reminders;

pub use apply_action::{ActionOutcome, ApplyActionUseCase};
pub use create_reminder::{CreateReminderUseCase, CreatedReminders};
pub use edit_reminder::{BeginEditUseCase, EditReminderUseCase};
pub use list_reminders::{ListRemindersUseCase, ReminderView};
use tracing::warn;
use yadavar_domain::{ID, ReminderStatus};
use yadavar_infra::YadavarContext;

/// Mirror a status transition into the user document's id buckets. Bucket
/// drift is tolerable, so failures only log.
pub(crate) async fn sync_bucket(
    ctx: &YadavarContext,
    user_id: i64,
    ids: &[ID],
    status: ReminderStatus,
) {
    if ids.is_empty() {
        return;
    }
    let ids = ids.to_vec();
    let result = ctx
        .repos
        .user_docs
        .update(user_id, &move |doc| {
            for id in &ids {
                match status {
                    ReminderStatus::Active => doc.reminders.add_active(*id),
                    ReminderStatus::Completed => doc.reminders.mark_completed(*id),
                    ReminderStatus::Cancelled => doc.reminders.mark_cancelled(*id),
                }
            }
        })
        .await;
    if let Err(e) = result {
        warn!("Failed to sync reminder buckets for user {user_id}: {e:?}");
    }
}

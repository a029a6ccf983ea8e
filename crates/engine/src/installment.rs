use chrono::Duration;
use tracing::info;
use yadavar_domain::{Category, NewReminder, Reminder, Repeat};
use yadavar_infra::YadavarContext;

/// Retries allowed per unpaid installment occurrence.
const MAX_RETRIES: i64 = 3;

/// An `installment` fired and nobody acted yet: chase it with a one-shot
/// retry tomorrow. The base resumes its own cadence via the scheduler's
/// normal advance; the retry chain continues independently, one per day,
/// each retry scheduling the next until the chain is exhausted or a
/// paid/stop action sweeps it.
pub(crate) async fn on_installment_fired(
    ctx: &YadavarContext,
    base: &Reminder,
) -> anyhow::Result<()> {
    let live = ctx.repos.reminders.count_installment_retries(base.id).await?;
    if live >= MAX_RETRIES {
        return Ok(());
    }
    insert_retry(ctx, base, base.id, live + 1).await
}

/// A retry fired (and was completed as any one-shot): schedule the next
/// attempt unless this was the last one.
pub(crate) async fn on_installment_retry_fired(
    ctx: &YadavarContext,
    retry: &Reminder,
) -> anyhow::Result<()> {
    let attempt = retry
        .meta
        .as_ref()
        .and_then(|meta| meta.get("attempt"))
        .and_then(|attempt| attempt.as_i64())
        .unwrap_or(MAX_RETRIES);
    if attempt >= MAX_RETRIES {
        info!("Installment retry chain for reminder {} exhausted", retry.id);
        return Ok(());
    }
    let Some(base_id) = retry.installment_base_id() else {
        return Ok(());
    };
    insert_retry(ctx, retry, base_id, attempt + 1).await
}

async fn insert_retry(
    ctx: &YadavarContext,
    after: &Reminder,
    base_id: yadavar_domain::ID,
    attempt: i64,
) -> anyhow::Result<()> {
    let fire_local = after.local_fire_time() + Duration::days(1);
    let retry = NewReminder {
        user_id: after.user_id,
        category: Category::InstallmentRetry,
        content: after.content.clone(),
        fire_time_utc: after.timezone.local_to_utc(fire_local),
        timezone: after.timezone,
        calendar: after.calendar,
        repeat: Repeat::None,
        meta: Some(serde_json::json!({ "base_id": base_id.as_i64(), "attempt": attempt })),
    };
    let id = ctx.repos.reminders.insert(&retry).await?;
    info!(
        "Created installment retry {attempt}/{MAX_RETRIES} ({id}) for reminder {base_id}"
    );
    Ok(())
}

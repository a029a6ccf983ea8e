use std::sync::Arc;

use tokio::{
    sync::{Semaphore, watch},
    task::{JoinHandle, JoinSet},
    time::interval,
};
use tracing::{debug, error, info, warn};
use yadavar_domain::{Category, Reminder, ReminderStatus};
use yadavar_infra::YadavarContext;

use crate::{
    installment,
    notify::{DispatchOutcome, Notifier},
    reminder::sync_bucket,
};

/// Start the polling scheduler and the cleanup task. Both stop when the
/// shutdown signal flips; the handles are awaited by the caller within its
/// grace period.
pub fn start_jobs(
    ctx: YadavarContext,
    notifier: Arc<Notifier>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    vec![
        start_fire_job(ctx.clone(), notifier, shutdown.clone()),
        start_cleanup_job(ctx, shutdown),
    ]
}

/// The 60-second tick that locates due reminders and fans dispatches out.
fn start_fire_job(
    ctx: YadavarContext,
    notifier: Arc<Notifier>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(ctx.config.dispatch_concurrency));
        let mut tick = interval(ctx.config.tick);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    run_tick_once(&ctx, &notifier, &semaphore).await;
                }
            }
        }
        info!("Scheduler loop stopped");
    })
}

/// Hourly sweep of aged terminal rows, with a stats line for operators.
fn start_cleanup_job(ctx: YadavarContext, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(ctx.config.cleanup_interval);
        // The first `interval` tick is immediate; skip it so the sweep runs
        // one period after boot.
        tick.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    match ctx.repos.reminders.cleanup_old(ctx.config.cleanup_retention_days).await {
                        Ok(0) => {}
                        Ok(deleted) => info!("Cleaned up {deleted} old reminders"),
                        Err(e) => error!("Cleanup failed: {e:?}"),
                    }
                    match ctx.repos.reminders.stats(None).await {
                        Ok(stats) => info!(
                            "Store stats - total: {}, active: {}, users: {}",
                            stats.total, stats.active, stats.distinct_users
                        ),
                        Err(e) => error!("Stats query failed: {e:?}"),
                    }
                }
            }
        }
        info!("Cleanup loop stopped");
    })
}

/// One scheduler tick: fetch the due batch (oldest first) and dispatch it
/// under the concurrency bound. Dispatches are issued in ascending
/// fire-time order but may complete out of order; each advance commits
/// independently.
pub async fn run_tick_once(ctx: &YadavarContext, notifier: &Arc<Notifier>, semaphore: &Arc<Semaphore>) {
    let now = ctx.sys.now_minute();
    // Transient store errors get one retry with a short backoff; after that
    // the whole batch waits for the next tick.
    let due = match ctx.repos.reminders.due(now, ctx.config.batch_limit).await {
        Ok(due) => due,
        Err(first) => {
            warn!("Due query failed ({first:?}); retrying once");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            match ctx.repos.reminders.due(now, ctx.config.batch_limit).await {
                Ok(due) => due,
                Err(e) => {
                    error!("Due query failed again: {e:?}");
                    return;
                }
            }
        }
    };
    if due.is_empty() {
        return;
    }
    info!("Processing {} due reminders", due.len());

    let mut dispatches = JoinSet::new();
    for reminder in due {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let ctx = ctx.clone();
        let notifier = notifier.clone();
        dispatches.spawn(async move {
            let _permit = permit;
            process_due_reminder(&ctx, &notifier, reminder).await;
        });
    }
    while let Some(result) = dispatches.join_next().await {
        if let Err(e) = result {
            error!("Dispatch task failed: {e:?}");
        }
    }
}

async fn process_due_reminder(ctx: &YadavarContext, notifier: &Notifier, reminder: Reminder) {
    let language = match ctx.repos.user_docs.get(reminder.user_id).await {
        Ok(doc) => doc.settings.language,
        Err(e) => {
            warn!("No settings for user {} ({e}); using defaults", reminder.user_id);
            ctx.config.default_language.clone()
        }
    };

    match notifier.send(&reminder, &language).await {
        DispatchOutcome::Sent => {
            if let Err(e) = advance_after_fire(ctx, &reminder).await {
                error!("Failed to advance reminder {}: {e:?}", reminder.id);
            }
        }
        DispatchOutcome::Failed { terminal: true } => {
            // The recipient is gone; the row would otherwise stay due forever.
            info!("Cancelling reminder {} for unreachable user {}", reminder.id, reminder.user_id);
            if let Err(e) = ctx
                .repos
                .reminders
                .update_status(reminder.id, ReminderStatus::Cancelled)
                .await
            {
                error!("Failed to cancel reminder {}: {e:?}", reminder.id);
            }
            sync_bucket(ctx, reminder.user_id, &[reminder.id], ReminderStatus::Cancelled).await;
        }
        DispatchOutcome::Failed { terminal: false } => {
            // Leave the row due; the next tick retries. At-least-once, never
            // silently dropped.
            warn!("Dispatch of reminder {} failed; will retry next tick", reminder.id);
        }
    }
}

/// Post-dispatch bookkeeping: category policies first, then the generic
/// advance-or-retire rule.
pub async fn advance_after_fire(ctx: &YadavarContext, reminder: &Reminder) -> anyhow::Result<()> {
    match reminder.category {
        Category::Installment => {
            installment::on_installment_fired(ctx, reminder).await?;
            advance_or_retire(ctx, reminder).await
        }
        Category::InstallmentRetry => {
            advance_or_retire(ctx, reminder).await?;
            installment::on_installment_retry_fired(ctx, reminder).await
        }
        _ => advance_or_retire(ctx, reminder).await,
    }
}

/// After a successful fire: one-shots complete; recurring rows move to
/// their next occurrence, computed on the local wall-clock in the calendar
/// persisted on the row.
async fn advance_or_retire(ctx: &YadavarContext, reminder: &Reminder) -> anyhow::Result<()> {
    if !reminder.repeat.is_recurring() {
        ctx.repos
            .reminders
            .update_status(reminder.id, ReminderStatus::Completed)
            .await?;
        sync_bucket(ctx, reminder.user_id, &[reminder.id], ReminderStatus::Completed).await;
        debug!("Completed one-time reminder {}", reminder.id);
        return Ok(());
    }

    let local = reminder.local_fire_time();
    match reminder.repeat.next_after(local, reminder.calendar) {
        Some(next_local) => {
            let next_utc = reminder.timezone.local_to_utc(next_local);
            ctx.repos.reminders.update_fire_time_utc(reminder.id, next_utc).await?;
            debug!("Advanced reminder {} to {}", reminder.id, next_utc);
        }
        None => {
            // A recurring pattern with no next occurrence is malformed.
            warn!("No next occurrence for reminder {}; cancelling", reminder.id);
            ctx.repos
                .reminders
                .update_status(reminder.id, ReminderStatus::Cancelled)
                .await?;
            sync_bucket(ctx, reminder.user_id, &[reminder.id], ReminderStatus::Cancelled).await;
        }
    }
    Ok(())
}

use chrono::{Duration, NaiveDateTime};
use tracing::{info, warn};
use yadavar_domain::{CalendarSystem, Repeat, ReminderStatus};
use yadavar_infra::YadavarContext;

use crate::reminder::sync_bucket;

/// Guard for pathological overdue spans (a daily reminder untouched for
/// decades); rows that exceed it are cancelled rather than looped on.
const MAX_ADVANCE_STEPS: usize = 10_000;

/// Cold-start repair, run before the scheduler's first tick: every active
/// row that came due while the process was down is rolled to its next
/// future occurrence; overdue one-shots are retired. Returns the number of
/// rows touched.
pub async fn reconcile_overdue(ctx: &YadavarContext) -> anyhow::Result<u64> {
    let now = ctx.sys.now_minute();
    let active = ctx.repos.reminders.all_active().await?;
    let mut fixed = 0u64;

    for reminder in active {
        if reminder.fire_time_utc > now {
            continue;
        }

        if !reminder.repeat.is_recurring() {
            if ctx
                .repos
                .reminders
                .update_status(reminder.id, ReminderStatus::Cancelled)
                .await?
            {
                sync_bucket(ctx, reminder.user_id, &[reminder.id], ReminderStatus::Cancelled)
                    .await;
                fixed += 1;
            }
            continue;
        }

        let now_local = reminder.timezone.utc_to_local(now);
        match next_future_occurrence(
            reminder.local_fire_time(),
            &reminder.repeat,
            reminder.calendar,
            now_local,
        ) {
            Some(next_local) => {
                let next_utc = reminder.timezone.local_to_utc(next_local);
                ctx.repos.reminders.update_fire_time_utc(reminder.id, next_utc).await?;
                fixed += 1;
            }
            None => {
                warn!("Could not roll reminder {} forward; cancelling", reminder.id);
                ctx.repos
                    .reminders
                    .update_status(reminder.id, ReminderStatus::Cancelled)
                    .await?;
                sync_bucket(ctx, reminder.user_id, &[reminder.id], ReminderStatus::Cancelled)
                    .await;
                fixed += 1;
            }
        }
    }

    info!("Reconciled {fixed} overdue reminders");
    Ok(fixed)
}

/// Smallest occurrence strictly after `now_local`. Fixed intervals advance
/// in closed form (skip the whole periods missed); everything else steps
/// through `next_after`.
fn next_future_occurrence(
    base_local: NaiveDateTime,
    repeat: &Repeat,
    calendar: CalendarSystem,
    now_local: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if let Repeat::Interval { value, unit } = repeat {
        if *value == 0 {
            return None;
        }
        let period = unit.duration(*value).num_minutes().max(1);
        let elapsed = (now_local - base_local).num_minutes();
        if elapsed < 0 {
            return Some(base_local);
        }
        let periods_passed = elapsed / period;
        return Some(base_local + Duration::minutes((periods_passed + 1) * period));
    }

    let mut next = base_local;
    for _ in 0..MAX_ADVANCE_STEPS {
        next = repeat.next_after(next, calendar)?;
        if next > now_local {
            return Some(next);
        }
    }
    None
}

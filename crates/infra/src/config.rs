use std::time::Duration;

use tracing::warn;
use yadavar_domain::{CalendarSystem, TzOffset};
use yadavar_utils::config::APP_CONFIG;

/// Runtime configuration, resolved once from the environment-backed
/// `APP_CONFIG`. Malformed defaults degrade with a warning instead of
/// refusing to start; only genuinely required settings are enforced in
/// `setup_context`.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_language: String,
    pub default_timezone: TzOffset,
    pub default_calendar: CalendarSystem,

    /// Seconds between due-reminder polls.
    pub tick: Duration,
    /// Due rows processed per tick.
    pub batch_limit: u32,
    /// Parallel notification dispatches per tick.
    pub dispatch_concurrency: usize,
    pub cleanup_interval: Duration,
    pub cleanup_retention_days: u32,
    pub shutdown_grace: Duration,

    pub notification_strategy: String,
    pub notification_max_retries: u32,
    pub notification_retry_delay: Duration,

    pub max_content_length: usize,
    pub max_utterance_length: usize,
    pub max_city_length: usize,
    pub max_reminders_per_user: u32,
    pub requests_per_minute: u32,

    pub pending_ttl: Duration,
    pub rate_window_ttl: Duration,
}

impl Config {
    pub fn new() -> Self {
        let default_timezone = APP_CONFIG
            .default_timezone
            .parse::<TzOffset>()
            .unwrap_or_else(|e| {
                warn!("Invalid YADAVAR__DEFAULT_TIMEZONE ({e}); falling back to +00:00");
                TzOffset::UTC
            });
        let default_calendar = APP_CONFIG
            .default_calendar
            .parse::<CalendarSystem>()
            .unwrap_or_else(|e| {
                warn!("Invalid YADAVAR__DEFAULT_CALENDAR ({e}); falling back to gregorian");
                CalendarSystem::Gregorian
            });

        Self {
            default_language: APP_CONFIG.default_language.clone(),
            default_timezone,
            default_calendar,
            tick: Duration::from_secs(APP_CONFIG.scheduler.tick_secs.max(1)),
            batch_limit: APP_CONFIG.scheduler.batch_limit,
            dispatch_concurrency: (APP_CONFIG.scheduler.dispatch_concurrency.max(1)) as usize,
            cleanup_interval: Duration::from_secs(APP_CONFIG.scheduler.cleanup_interval_secs.max(1)),
            cleanup_retention_days: APP_CONFIG.scheduler.cleanup_retention_days,
            shutdown_grace: Duration::from_secs(APP_CONFIG.scheduler.shutdown_grace_secs),
            notification_strategy: APP_CONFIG.notification.strategy.clone(),
            notification_max_retries: APP_CONFIG.notification.max_retries,
            notification_retry_delay: Duration::from_secs(
                APP_CONFIG.notification.retry_delay_secs,
            ),
            max_content_length: APP_CONFIG.limits.max_content_length,
            max_utterance_length: APP_CONFIG.limits.max_utterance_length,
            max_city_length: APP_CONFIG.limits.max_city_length,
            max_reminders_per_user: APP_CONFIG.limits.max_reminders_per_user,
            requests_per_minute: APP_CONFIG.limits.requests_per_minute,
            pending_ttl: Duration::from_secs(APP_CONFIG.session.pending_ttl_secs),
            rate_window_ttl: Duration::from_secs(APP_CONFIG.session.rate_window_ttl_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

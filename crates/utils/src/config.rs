use std::sync::LazyLock;

use config::Config;
use serde::Deserialize;

/// Application configuration (main)
#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct AppConfig {
    /// The database URL
    /// Default is sqlite://data/yadavar.db
    /// Env var: YADAVAR__DATABASE_URL
    pub database_url: String,

    /// The Tokio runtime flavor ("multi_thread" or "current_thread")
    /// Default is "multi_thread"
    /// Env var: YADAVAR__TOKIO_RUNTIME
    pub tokio_runtime: String,

    /// Language used for users that have not completed setup
    /// Default is "fa"
    /// Env var: YADAVAR__DEFAULT_LANGUAGE
    pub default_language: String,

    /// Fixed UTC offset used for users that have not completed setup
    /// Default is "+00:00"
    /// Env var: YADAVAR__DEFAULT_TIMEZONE
    pub default_timezone: String,

    /// Calendar used for users that have not completed setup
    /// One of "gregorian", "shamsi", "qamari"
    /// Default is "gregorian"
    /// Env var: YADAVAR__DEFAULT_CALENDAR
    pub default_calendar: String,

    /// Scheduler config
    pub scheduler: SchedulerConfig,

    /// Notification config
    pub notification: NotificationConfig,

    /// Natural-language parser config
    pub ai: AiConfig,

    /// Per-user limits
    pub limits: LimitsConfig,

    /// In-memory session state config
    pub session: SessionConfig,
}

/// Scheduler configuration
#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct SchedulerConfig {
    /// Seconds between due-reminder polls
    /// Default is 60
    /// Env var: YADAVAR__SCHEDULER__TICK_SECS
    pub tick_secs: u64,

    /// Maximum number of due rows processed per tick
    /// Default is 500
    /// Env var: YADAVAR__SCHEDULER__BATCH_LIMIT
    pub batch_limit: u32,

    /// Maximum number of concurrent notification dispatches
    /// Default is 30
    /// Env var: YADAVAR__SCHEDULER__DISPATCH_CONCURRENCY
    pub dispatch_concurrency: u32,

    /// Seconds between cleanup passes over terminal rows
    /// Default is 3600
    /// Env var: YADAVAR__SCHEDULER__CLEANUP_INTERVAL_SECS
    pub cleanup_interval_secs: u64,

    /// Days a completed/cancelled row is kept before cleanup deletes it
    /// Default is 30
    /// Env var: YADAVAR__SCHEDULER__CLEANUP_RETENTION_DAYS
    pub cleanup_retention_days: u32,

    /// Seconds in-flight dispatches are given to finish on shutdown
    /// Default is 5
    /// Env var: YADAVAR__SCHEDULER__SHUTDOWN_GRACE_SECS
    pub shutdown_grace_secs: u64,
}

/// Notification configuration
#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct NotificationConfig {
    /// Delivery strategy: "standard", "silent" or "priority"
    /// Default is "standard"
    /// Env var: YADAVAR__NOTIFICATION__STRATEGY
    pub strategy: String,

    /// Attempts made by the "priority" strategy
    /// Default is 3
    /// Env var: YADAVAR__NOTIFICATION__MAX_RETRIES
    pub max_retries: u32,

    /// Seconds between "priority" strategy attempts
    /// Default is 1
    /// Env var: YADAVAR__NOTIFICATION__RETRY_DELAY_SECS
    pub retry_delay_secs: u64,

    /// Webhook URL notifications are POSTed to
    /// Required unless the strategy is "silent"
    /// Env var: YADAVAR__NOTIFICATION__WEBHOOK_URL
    pub webhook_url: Option<String>,

    /// Key sent in the `yadavar-webhook-key` header
    /// Env var: YADAVAR__NOTIFICATION__WEBHOOK_KEY
    pub webhook_key: Option<String>,
}

/// Natural-language parser configuration
#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct AiConfig {
    /// Chat-completions endpoint
    /// Default is https://openrouter.ai/api/v1/chat/completions
    /// Env var: YADAVAR__AI__ENDPOINT
    pub endpoint: String,

    /// API key for the endpoint
    /// Required at startup
    /// Env var: YADAVAR__AI__KEY
    pub key: Option<String>,

    /// Model identifier
    /// Default is "gpt-4o"
    /// Env var: YADAVAR__AI__MODEL
    pub model: String,

    /// Token cap for parse replies
    /// Default is 800
    /// Env var: YADAVAR__AI__MAX_TOKENS
    pub max_tokens: u32,

    /// Sampling temperature
    /// Default is 0.1
    /// Env var: YADAVAR__AI__TEMPERATURE
    pub temperature: f64,

    /// Upper bound in seconds for one parser call (including the retry)
    /// Default is 30
    /// Env var: YADAVAR__AI__TIMEOUT_SECS
    pub timeout_secs: u64,
}

/// Per-user limits
#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct LimitsConfig {
    /// Longest stored reminder content, in characters
    /// Default is 500
    /// Env var: YADAVAR__LIMITS__MAX_CONTENT_LENGTH
    pub max_content_length: usize,

    /// Longest utterance passed to the parser, in characters
    /// Default is 1000
    /// Env var: YADAVAR__LIMITS__MAX_UTTERANCE_LENGTH
    pub max_utterance_length: usize,

    /// Longest city name accepted by timezone detection
    /// Default is 50
    /// Env var: YADAVAR__LIMITS__MAX_CITY_LENGTH
    pub max_city_length: usize,

    /// Active reminders a single user may hold
    /// Default is 100
    /// Env var: YADAVAR__LIMITS__MAX_REMINDERS_PER_USER
    pub max_reminders_per_user: u32,

    /// Parse requests allowed per user per minute
    /// Default is 20
    /// Env var: YADAVAR__LIMITS__REQUESTS_PER_MINUTE
    pub requests_per_minute: u32,
}

/// In-memory session state configuration
#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct SessionConfig {
    /// Seconds a pending edit target is kept
    /// Default is 600
    /// Env var: YADAVAR__SESSION__PENDING_TTL_SECS
    pub pending_ttl_secs: u64,

    /// Seconds an idle rate-limit window is kept
    /// Default is 3600
    /// Env var: YADAVAR__SESSION__RATE_WINDOW_TTL_SECS
    pub rate_window_ttl_secs: u64,
}

/// Parse the configuration from the environment variables
/// and return the configuration object
///
/// This function will panic if the configuration is not valid !
///
/// This is called by the `APP_CONFIG` global variable (LazyLock)
fn parse_config() -> AppConfig {
    #[allow(clippy::expect_used)]
    let config = Config::builder()
        .add_source(
            config::Environment::with_prefix("YADAVAR")
                .try_parsing(true)
                .separator("__"),
        )
        .set_default("database_url", "sqlite://data/yadavar.db")
        .expect("Failed to set default database_url")
        .set_default("tokio_runtime", "multi_thread")
        .expect("Failed to set default tokio_runtime")
        .set_default("default_language", "fa")
        .expect("Failed to set default default_language")
        .set_default("default_timezone", "+00:00")
        .expect("Failed to set default default_timezone")
        .set_default("default_calendar", "gregorian")
        .expect("Failed to set default default_calendar")
        .set_default("scheduler.tick_secs", 60)
        .expect("Failed to set default scheduler.tick_secs")
        .set_default("scheduler.batch_limit", 500)
        .expect("Failed to set default scheduler.batch_limit")
        .set_default("scheduler.dispatch_concurrency", 30)
        .expect("Failed to set default scheduler.dispatch_concurrency")
        .set_default("scheduler.cleanup_interval_secs", 3600)
        .expect("Failed to set default scheduler.cleanup_interval_secs")
        .set_default("scheduler.cleanup_retention_days", 30)
        .expect("Failed to set default scheduler.cleanup_retention_days")
        .set_default("scheduler.shutdown_grace_secs", 5)
        .expect("Failed to set default scheduler.shutdown_grace_secs")
        .set_default("notification.strategy", "standard")
        .expect("Failed to set default notification.strategy")
        .set_default("notification.max_retries", 3)
        .expect("Failed to set default notification.max_retries")
        .set_default("notification.retry_delay_secs", 1)
        .expect("Failed to set default notification.retry_delay_secs")
        .set_default(
            "ai.endpoint",
            "https://openrouter.ai/api/v1/chat/completions",
        )
        .expect("Failed to set default ai.endpoint")
        .set_default("ai.model", "gpt-4o")
        .expect("Failed to set default ai.model")
        .set_default("ai.max_tokens", 800)
        .expect("Failed to set default ai.max_tokens")
        .set_default("ai.temperature", 0.1)
        .expect("Failed to set default ai.temperature")
        .set_default("ai.timeout_secs", 30)
        .expect("Failed to set default ai.timeout_secs")
        .set_default("limits.max_content_length", 500)
        .expect("Failed to set default limits.max_content_length")
        .set_default("limits.max_utterance_length", 1000)
        .expect("Failed to set default limits.max_utterance_length")
        .set_default("limits.max_city_length", 50)
        .expect("Failed to set default limits.max_city_length")
        .set_default("limits.max_reminders_per_user", 100)
        .expect("Failed to set default limits.max_reminders_per_user")
        .set_default("limits.requests_per_minute", 20)
        .expect("Failed to set default limits.requests_per_minute")
        .set_default("session.pending_ttl_secs", 600)
        .expect("Failed to set default session.pending_ttl_secs")
        .set_default("session.rate_window_ttl_secs", 3600)
        .expect("Failed to set default session.rate_window_ttl_secs")
        .build()
        .expect("Failed to build the configuration object");

    #[allow(clippy::expect_used)]
    let config = config
        .try_deserialize()
        .expect("Failed to deserialize the configuration object");

    config
}

// This is a global variable that will be initialized once
// and will be available throughout the application
// Using global variable is bad practice, but for **immutable** environment variables
// it is acceptable
pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(parse_config);

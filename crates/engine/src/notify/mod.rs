mod payload;

use std::{str::FromStr, sync::Arc, time::Duration};

pub use payload::build_payload;
use tracing::{error, info, warn};
use yadavar_domain::Reminder;
use yadavar_infra::{Config, DeliveryError, INotificationTransport};

/// How a dispatch ended. A non-terminal failure keeps the row due so the
/// next tick retries it; a terminal one cancels the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed { terminal: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    Standard,
    /// Log only; for dry runs and tests.
    Silent,
    /// `Standard` wrapped in a bounded retry with fixed backoff.
    Priority,
}

impl FromStr for StrategyKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "standard" => Ok(StrategyKind::Standard),
            "silent" => Ok(StrategyKind::Silent),
            "priority" => Ok(StrategyKind::Priority),
            _ => Err(()),
        }
    }
}

/// Strategy-based notification dispatcher.
pub struct Notifier {
    strategy: StrategyKind,
    transport: Arc<dyn INotificationTransport>,
    max_retries: u32,
    retry_delay: Duration,
}

impl Notifier {
    pub fn new(
        strategy: StrategyKind,
        transport: Arc<dyn INotificationTransport>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self { strategy, transport, max_retries, retry_delay }
    }

    pub fn from_config(config: &Config, transport: Arc<dyn INotificationTransport>) -> Self {
        let strategy = config
            .notification_strategy
            .parse()
            .unwrap_or_else(|_| {
                warn!(
                    "Unknown notification strategy {:?}; using standard",
                    config.notification_strategy
                );
                StrategyKind::Standard
            });
        Self::new(
            strategy,
            transport,
            config.notification_max_retries,
            config.notification_retry_delay,
        )
    }

    pub async fn send(&self, reminder: &Reminder, language: &str) -> DispatchOutcome {
        match self.strategy {
            StrategyKind::Silent => {
                info!(
                    "Silent notification: {} reminder {} for user {}",
                    reminder.category, reminder.id, reminder.user_id
                );
                DispatchOutcome::Sent
            }
            StrategyKind::Standard => self.deliver_once(reminder, language).await,
            StrategyKind::Priority => {
                for attempt in 1..=self.max_retries.max(1) {
                    match self.deliver_once(reminder, language).await {
                        DispatchOutcome::Sent => return DispatchOutcome::Sent,
                        DispatchOutcome::Failed { terminal: true } => {
                            return DispatchOutcome::Failed { terminal: true };
                        }
                        DispatchOutcome::Failed { terminal: false } => {
                            warn!(
                                "Notification attempt {attempt} failed for user {}",
                                reminder.user_id
                            );
                            if attempt < self.max_retries {
                                tokio::time::sleep(self.retry_delay).await;
                            }
                        }
                    }
                }
                error!(
                    "All {} notification attempts failed for user {}",
                    self.max_retries, reminder.user_id
                );
                DispatchOutcome::Failed { terminal: false }
            }
        }
    }

    async fn deliver_once(&self, reminder: &Reminder, language: &str) -> DispatchOutcome {
        let payload = build_payload(reminder, language);
        match self.transport.deliver(reminder.user_id, &payload).await {
            Ok(()) => {
                info!(
                    "Sent {} reminder {} to user {}",
                    reminder.category, reminder.id, reminder.user_id
                );
                DispatchOutcome::Sent
            }
            Err(e) => {
                error!("Failed to notify user {}: {e}", reminder.user_id);
                DispatchOutcome::Failed { terminal: matches!(e, DeliveryError::Blocked(_)) }
            }
        }
    }
}

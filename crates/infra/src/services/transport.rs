use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error};
use yadavar_domain::NotificationPayload;

#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The transport could not deliver right now; the row stays due and the
    /// scheduler retries on a later tick.
    #[error("transport refused the notification: {0}")]
    Refused(String),
    /// The recipient is gone (blocked the bot, deleted the account); the
    /// reminder is cancelled.
    #[error("recipient unreachable: {0}")]
    Blocked(String),
}

impl DeliveryError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryError::Blocked(_))
    }
}

/// The chat transport the dispatcher hands payloads to. The real messenger
/// adapter lives outside this service; over here it is only a webhook.
#[async_trait::async_trait]
pub trait INotificationTransport: Send + Sync {
    async fn deliver(&self, user_id: i64, payload: &NotificationPayload)
    -> Result<(), DeliveryError>;
}

/// POSTs payloads to the configured webhook, authenticated by a shared key
/// header.
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
    key: Option<String>,
}

impl WebhookTransport {
    pub fn new(url: String, key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, url, key })
    }
}

#[async_trait::async_trait]
impl INotificationTransport for WebhookTransport {
    async fn deliver(
        &self,
        user_id: i64,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        let mut request = self.client.post(&self.url).json(&serde_json::json!({
            "user_id": user_id,
            "text": payload.text,
            "actions": payload.actions,
        }));
        if let Some(key) = &self.key {
            request = request.header("yadavar-webhook-key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Refused(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // The receiver reports a dead recipient with 403/410.
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::GONE => {
                error!("Recipient {user_id} is unreachable");
                Err(DeliveryError::Blocked(format!("status {}", response.status())))
            }
            status => Err(DeliveryError::Refused(format!("status {status}"))),
        }
    }
}

/// Logs instead of delivering. Used by the `silent` strategy and by tests.
pub struct LogTransport;

#[async_trait::async_trait]
impl INotificationTransport for LogTransport {
    async fn deliver(
        &self,
        user_id: i64,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        debug!("Notification for user {user_id}: {}", payload.text);
        Ok(())
    }
}

use std::time::Duration;

use anyhow::anyhow;
use serde::Deserialize;
use tracing::error;

/// Chat-completions call the parser rides on. Behind a trait so tests feed
/// canned replies from a lookup table instead of a network.
#[async_trait::async_trait]
pub trait IChatApi: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> anyhow::Result<String>;
}

pub struct ChatApi {
    client: reqwest::Client,
    endpoint: String,
    key: String,
    model: String,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl ChatApi {
    pub fn new(
        endpoint: String,
        key: String,
        model: String,
        temperature: f64,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint, key, model, temperature })
    }
}

#[async_trait::async_trait]
impl IChatApi for ChatApi {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": user_prompt },
                ],
                "max_tokens": max_tokens,
                "temperature": self.temperature,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Parser endpoint returned status {status}");
            return Err(anyhow!("parser endpoint returned status {status}"));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .first()
            .map(|choice| choice.message.content.trim())
            .ok_or_else(|| anyhow!("parser endpoint returned no choices"))?;
        Ok(strip_code_fences(content))
    }
}

/// Models habitually wrap their JSON in markdown fences.
pub(super) fn strip_code_fences(content: &str) -> String {
    let mut content = content.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim().to_string()
}

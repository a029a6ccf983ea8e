mod api;

use std::{sync::Arc, time::Duration};

pub use api::{ChatApi, IChatApi};
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{error, warn};
use yadavar_domain::{
    CalendarSystem,
    Category,
    MaterializeError,
    ParsedReminder,
    RawParsedReminder,
    Reminder,
    ReminderDelta,
    Repeat,
    TzOffset,
    format_minute,
    resolve_fire_time,
};

use crate::system::ISys;

const REMINDER_SYSTEM_PROMPT: &str =
    "You are a multilingual reminder pattern parser that outputs JSON.";

const EDIT_SYSTEM_PROMPT: &str = "You are an edit analyzer that outputs JSON.";

const TIMEZONE_SYSTEM_PROMPT: &str = "You are a timezone detector that outputs JSON.";

fn reminder_prompt(language: &str, calendar: CalendarSystem, utterance: &str) -> String {
    format!(
        "Extract every reminder from the user text. Reply with JSON only:\n\
         {{\"reminders\":[{{\"category\":\"general|medicine|birthday|installment|appointment|work|exercise|prayer|shopping|call|study|bill\",\
         \"content\":\"short cleaned text\",\"time\":\"HH:MM or null\",\
         \"specific_date\":{{\"day\":n,\"month\":n,\"year\":n,\"calendar\":\"gregorian|shamsi|qamari\"}},\
         \"relative_days\":n,\"relative_minutes\":n,\"today\":bool,\
         \"repeat\":{{\"type\":\"none|daily|weekly|monthly|yearly|interval\",\"value\":n,\"unit\":\"minutes|hours|days\",\"day\":n,\"weekday\":n}}}}]}}\n\
         Omit fields you cannot infer. The user speaks {language} and uses the {calendar} calendar.\n\
         Text: {utterance}"
    )
}

fn edit_prompt(current: &Reminder, utterance: &str) -> String {
    format!(
        "A reminder currently has content={:?}, local time={:?}, category={:?}, repeat={}.\n\
         The user wants to change it: {utterance}\n\
         Reply with JSON holding ONLY the fields that change:\n\
         {{\"content\":\"...\",\"time\":\"HH:MM\",\"specific_date\":{{\"day\":n,\"month\":n,\"year\":n,\"calendar\":\"...\"}},\"category\":\"...\",\"repeat\":{{...}}}}",
        current.content,
        format_minute(current.local_fire_time()),
        current.category.as_str(),
        current.repeat.canonical(),
    )
}

fn timezone_prompt(city: &str) -> String {
    format!(
        "Identify the city in this text and its fixed UTC offset. \
         Reply with JSON {{\"city\":\"CanonicalName\",\"timezone\":\"±HH:MM\"}} or null if there is no city.\n\
         Text: {city}"
    )
}

/// Why a parse produced no reminders.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseMessage {
    /// The service failed or returned unusable output. Never fabricate times.
    AiError,
    /// The utterance named a concrete moment that already passed.
    PastDateError { detected: String, current: String },
}

/// A reminder with its fire instant fully materialized in UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedReminder {
    pub category: Category,
    pub content: String,
    pub fire_time_utc: NaiveDateTime,
    pub repeat: Repeat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub reminders: Vec<MaterializedReminder>,
    pub message: Option<ParseMessage>,
}

impl ParseOutcome {
    fn ai_error() -> Self {
        Self { reminders: Vec::new(), message: Some(ParseMessage::AiError) }
    }
}

/// The natural-language parser the engine consumes: a pure function from
/// utterance (plus per-user context) to materialized reminders.
#[async_trait::async_trait]
pub trait INlParser: Send + Sync {
    async fn parse(
        &self,
        language: &str,
        timezone: TzOffset,
        calendar: CalendarSystem,
        utterance: &str,
    ) -> ParseOutcome;

    /// Edit mode: a delta over an existing reminder. Unmentioned fields stay.
    async fn parse_edit(&self, current: &Reminder, utterance: &str) -> Option<ReminderDelta>;

    /// Free-text city to `(canonical_city, ±HH:MM)`.
    async fn parse_timezone(&self, city: &str) -> Option<(String, TzOffset)>;
}

pub struct LlmParser {
    api: Arc<dyn IChatApi>,
    sys: Arc<dyn ISys>,
    max_utterance_chars: usize,
    max_city_chars: usize,
    /// Token cap for full parse replies; edit and timezone replies are small
    /// and use fixed lower caps.
    max_tokens: u32,
    /// Upper bound over the whole call, the one retry included.
    time_budget: Duration,
}

impl LlmParser {
    pub fn new(
        api: Arc<dyn IChatApi>,
        sys: Arc<dyn ISys>,
        max_utterance_chars: usize,
        max_city_chars: usize,
        max_tokens: u32,
        time_budget: Duration,
    ) -> Self {
        Self { api, sys, max_utterance_chars, max_city_chars, max_tokens, time_budget }
    }

    /// One transport retry, the whole exchange bounded by the time budget.
    async fn call_with_retry(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        let attempts = async {
            match self.api.complete(system_prompt, user_prompt, max_tokens).await {
                Ok(content) => Ok(content),
                Err(first) => {
                    warn!("Parser call failed, retrying once: {first:?}");
                    self.api.complete(system_prompt, user_prompt, max_tokens).await
                }
            }
        };
        tokio::time::timeout(self.time_budget, attempts)
            .await
            .map_err(|_| anyhow::anyhow!("parser call timed out"))?
    }
}

#[async_trait::async_trait]
impl INlParser for LlmParser {
    async fn parse(
        &self,
        language: &str,
        timezone: TzOffset,
        calendar: CalendarSystem,
        utterance: &str,
    ) -> ParseOutcome {
        let utterance: String = utterance.chars().take(self.max_utterance_chars).collect();
        let prompt = reminder_prompt(language, calendar, &utterance);

        let content = match self
            .call_with_retry(REMINDER_SYSTEM_PROMPT, &prompt, self.max_tokens)
            .await
        {
            Ok(content) => content,
            Err(e) => {
                error!("Parser unavailable: {e:?}");
                return ParseOutcome::ai_error();
            }
        };
        let Some(value) = parse_json_lenient(&content) else {
            warn!("Parser returned unusable output");
            return ParseOutcome::ai_error();
        };

        // Either a {"reminders":[...]} envelope or a single bare object.
        let raw_objects: Vec<Value> = match value.get("reminders").and_then(Value::as_array) {
            Some(array) => array.clone(),
            None => vec![value],
        };

        let now_local = timezone.utc_to_local(self.sys.now_minute());
        let mut reminders = Vec::new();
        let mut first_past: Option<(NaiveDateTime, NaiveDateTime)> = None;

        for raw in raw_objects {
            let Ok(raw) = serde_json::from_value::<RawParsedReminder>(raw) else {
                continue;
            };
            let Some(parsed) = ParsedReminder::from_raw(raw) else {
                continue;
            };
            match resolve_fire_time(&parsed, now_local, calendar) {
                Ok(local) => reminders.push(MaterializedReminder {
                    category: parsed.category,
                    content: parsed.content,
                    fire_time_utc: timezone.local_to_utc(local),
                    repeat: parsed.repeat,
                }),
                Err(MaterializeError::PastDate { detected, current }) => {
                    if first_past.is_none() {
                        first_past = Some((detected, current));
                    }
                }
            }
        }

        if !reminders.is_empty() {
            ParseOutcome { reminders, message: None }
        } else if let Some((detected, current)) = first_past {
            ParseOutcome {
                reminders: Vec::new(),
                message: Some(ParseMessage::PastDateError {
                    detected: format_minute(detected),
                    current: format_minute(current),
                }),
            }
        } else {
            warn!("No valid reminders in parser reply");
            ParseOutcome::ai_error()
        }
    }

    async fn parse_edit(&self, current: &Reminder, utterance: &str) -> Option<ReminderDelta> {
        let utterance: String = utterance.chars().take(self.max_utterance_chars).collect();
        let prompt = edit_prompt(current, &utterance);
        let content = match self.call_with_retry(EDIT_SYSTEM_PROMPT, &prompt, 300).await {
            Ok(content) => content,
            Err(e) => {
                error!("Edit parse failed: {e:?}");
                return None;
            }
        };
        let value = parse_json_lenient(&content)?;
        serde_json::from_value(value).ok()
    }

    async fn parse_timezone(&self, city: &str) -> Option<(String, TzOffset)> {
        let city: String = city.chars().take(self.max_city_chars).collect();
        let prompt = timezone_prompt(&city);
        let content = match self.call_with_retry(TIMEZONE_SYSTEM_PROMPT, &prompt, 100).await {
            Ok(content) => content,
            Err(e) => {
                error!("Timezone detection failed: {e:?}");
                return None;
            }
        };
        if content.eq_ignore_ascii_case("null") || content.is_empty() {
            return None;
        }
        let value = parse_json_lenient(&content)?;
        let canonical: String = value.get("city")?.as_str()?.chars().take(self.max_city_chars).collect();
        let offset = value.get("timezone")?.as_str()?.parse::<TzOffset>().ok()?;
        Some((canonical, offset))
    }
}

/// Parse model JSON, tolerating the classic truncation where closing braces
/// fell off the end of the reply.
fn parse_json_lenient(content: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(content) {
        return Some(value);
    }
    let open = content.matches('{').count();
    let close = content.matches('}').count();
    if open > close {
        let repaired = format!("{}{}", content.trim(), "}".repeat(open - close));
        if let Ok(value) = serde_json::from_str(&repaired) {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_json_repairs_missing_braces() {
        assert!(parse_json_lenient(r#"{"a": {"b": 1}}"#).is_some());
        let repaired = parse_json_lenient(r#"{"a": {"b": 1"#).unwrap();
        assert_eq!(repaired["a"]["b"], 1);
        assert!(parse_json_lenient("not json at all").is_none());
    }
}

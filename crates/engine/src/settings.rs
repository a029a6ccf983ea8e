use tracing::info;
use yadavar_domain::{CalendarSystem, UserDocument};
use yadavar_infra::YadavarContext;

use crate::{error::EngineError, shared::usecase::UseCase};

/// Resolve a free-text city name to a fixed offset and store it on the
/// user's settings. Completing this step finishes setup.
#[derive(Debug)]
pub struct DetectTimezoneUseCase {
    pub user_id: i64,
    pub city_text: String,
}

#[derive(Debug)]
pub struct DetectedTimezone {
    pub city: String,
    pub document: UserDocument,
}

#[async_trait::async_trait]
impl UseCase for DetectTimezoneUseCase {
    type Response = DetectedTimezone;
    type Error = EngineError;

    const NAME: &'static str = "DetectTimezone";

    async fn execute(&mut self, ctx: &YadavarContext) -> Result<Self::Response, Self::Error> {
        let (city, offset) = ctx
            .parser
            .parse_timezone(&self.city_text)
            .await
            .ok_or(EngineError::AiError)?;

        let document = ctx
            .repos
            .user_docs
            .update(self.user_id, &move |doc| {
                doc.settings.timezone = offset;
                doc.settings.setup_complete = true;
            })
            .await?;
        info!("User {} timezone set to {offset} ({city})", self.user_id);
        Ok(DetectedTimezone { city, document })
    }
}

/// Change language or calendar preferences; untouched fields stay.
/// Existing reminders keep the offset and calendar they were created with.
#[derive(Debug)]
pub struct UpdateSettingsUseCase {
    pub user_id: i64,
    pub language: Option<String>,
    pub calendar: Option<CalendarSystem>,
}

#[async_trait::async_trait]
impl UseCase for UpdateSettingsUseCase {
    type Response = UserDocument;
    type Error = EngineError;

    const NAME: &'static str = "UpdateSettings";

    async fn execute(&mut self, ctx: &YadavarContext) -> Result<Self::Response, Self::Error> {
        let language = self.language.clone();
        let calendar = self.calendar;
        let document = ctx
            .repos
            .user_docs
            .update(self.user_id, &move |doc| {
                if let Some(language) = &language {
                    doc.settings.language = language.clone();
                }
                if let Some(calendar) = calendar {
                    doc.settings.calendar = calendar;
                }
            })
            .await?;
        Ok(document)
    }
}

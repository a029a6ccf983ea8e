use thiserror::Error;

/// Custom error types for the Yadavar engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Internal error")]
    InternalError,
    #[error("The parser could not understand the request")]
    AiError,
    #[error("Resolved date {detected} is already past (now {current})")]
    PastDate { detected: String, current: String },
    #[error("Too many requests, slow down")]
    RateLimited,
    #[error("Active reminder limit reached")]
    TooManyReminders,
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Internal error: {e:?}");
        EngineError::InternalError
    }
}

mod error;
mod installment;
pub mod notify;
pub mod reconcile;
pub mod reminder;
pub mod scheduler;
pub mod session;
pub mod settings;
mod shared;

pub use error::EngineError;
pub use shared::usecase::{Subscriber, UseCase, execute};

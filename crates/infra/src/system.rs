use chrono::{DateTime, NaiveDateTime, Utc};
use yadavar_domain::truncate_to_minute;

/// Clock abstraction so usecases and the scheduler can be driven at a fixed
/// instant in tests.
pub trait ISys: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC wall-clock at the store's minute resolution.
    fn now_minute(&self) -> NaiveDateTime {
        truncate_to_minute(self.now().naive_utc())
    }
}

pub struct RealSys;

impl ISys for RealSys {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

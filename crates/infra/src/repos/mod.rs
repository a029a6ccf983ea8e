mod reminder;
mod user_doc;

use std::{str::FromStr, sync::Arc, time::Duration};

pub use reminder::{IReminderRepo, SqliteReminderRepo, StoreStats};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
pub use user_doc::{DocDefaults, IUserDocRepo, SqliteUserDocRepo};

use crate::{Config, system::ISys};

#[derive(Clone)]
pub struct Repos {
    pub reminders: Arc<dyn IReminderRepo>,
    pub user_docs: Arc<dyn IUserDocRepo>,
    pool: SqlitePool,
}

impl Repos {
    pub async fn create_sqlite(
        database_url: &str,
        config: &Config,
        sys: Arc<dyn ISys>,
    ) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            // WAL survives a crash mid-transaction and lets readers run
            // alongside the single writer.
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        // An in-memory database exists per connection, so tests must not
        // fan out over a pool.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        let defaults = DocDefaults {
            language: config.default_language.clone(),
            timezone: config.default_timezone,
            calendar: config.default_calendar,
        };
        Ok(Self {
            reminders: Arc::new(SqliteReminderRepo::new(pool.clone(), sys)),
            user_docs: Arc::new(SqliteUserDocRepo::new(pool.clone(), defaults)),
            pool,
        })
    }

    /// Flush and close the store; the last write lands before process exit.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

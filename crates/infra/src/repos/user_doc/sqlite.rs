use std::{collections::HashMap, sync::Arc};

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{instrument, warn};
use yadavar_domain::{CalendarSystem, TzOffset, UserDocument};

use super::IUserDocRepo;

/// Deployment defaults applied to documents that do not exist yet (or were
/// found corrupt).
#[derive(Debug, Clone)]
pub struct DocDefaults {
    pub language: String,
    pub timezone: TzOffset,
    pub calendar: CalendarSystem,
}

pub struct SqliteUserDocRepo {
    pool: SqlitePool,
    defaults: DocDefaults,
    // One async lock per user serializes read-modify-write cycles; documents
    // are never shared between users.
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SqliteUserDocRepo {
    pub fn new(pool: SqlitePool, defaults: DocDefaults) -> Self {
        Self {
            pool,
            defaults,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }

    fn default_document(&self, user_id: i64) -> UserDocument {
        UserDocument::with_defaults(
            user_id,
            &self.defaults.language,
            self.defaults.timezone,
            self.defaults.calendar,
        )
    }

    async fn load(&self, user_id: i64) -> anyhow::Result<UserDocument> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT document FROM user_docs WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(raw) = raw else {
            return Ok(self.default_document(user_id));
        };
        match serde_json::from_str(&raw) {
            Ok(document) => Ok(document),
            Err(e) => {
                // A corrupt document is replaced with defaults rather than
                // propagated.
                warn!("Corrupt user document for {user_id} ({e}); resetting to defaults");
                let document = self.default_document(user_id);
                self.persist(&document).await?;
                Ok(document)
            }
        }
    }

    async fn persist(&self, document: &UserDocument) -> anyhow::Result<()> {
        let raw = serde_json::to_string(document)?;
        sqlx::query(
            "INSERT INTO user_docs (user_id, document) VALUES (?1, ?2) \
             ON CONFLICT (user_id) DO UPDATE SET document = excluded.document",
        )
        .bind(document.user_id)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IUserDocRepo for SqliteUserDocRepo {
    #[instrument(skip(self))]
    async fn get(&self, user_id: i64) -> anyhow::Result<UserDocument> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        self.load(user_id).await
    }

    #[instrument(skip(self, document), fields(user_id = document.user_id))]
    async fn save(&self, document: &UserDocument) -> anyhow::Result<()> {
        let lock = self.user_lock(document.user_id).await;
        let _guard = lock.lock().await;
        self.persist(document).await
    }

    #[instrument(skip(self, mutate))]
    async fn update(
        &self,
        user_id: i64,
        mutate: &(dyn for<'a> Fn(&'a mut UserDocument) + Send + Sync),
    ) -> anyhow::Result<UserDocument> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        let mut document = self.load(user_id).await?;
        mutate(&mut document);
        self.persist(&document).await?;
        Ok(document)
    }
}

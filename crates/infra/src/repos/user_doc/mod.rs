mod sqlite;

pub use sqlite::{DocDefaults, SqliteUserDocRepo};
use yadavar_domain::UserDocument;

#[async_trait::async_trait]
pub trait IUserDocRepo: Send + Sync {
    /// Load a user's document, materializing defaults for unknown users and
    /// replacing corrupt ones.
    async fn get(&self, user_id: i64) -> anyhow::Result<UserDocument>;
    async fn save(&self, document: &UserDocument) -> anyhow::Result<()>;
    /// Atomic read-modify-write under the per-user lock.
    async fn update(
        &self,
        user_id: i64,
        mutate: &(dyn for<'a> Fn(&'a mut UserDocument) + Send + Sync),
    ) -> anyhow::Result<UserDocument>;
}

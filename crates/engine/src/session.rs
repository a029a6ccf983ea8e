use std::sync::Arc;

use moka::future::Cache;
use tokio::sync::Mutex;
use yadavar_domain::ID;
use yadavar_infra::Config;

/// In-memory per-user session state: the reminder a user is currently
/// editing and their request-rate windows. Entries expire on their own
/// (pending edits after a short TTL, idle rate windows after an hour), so
/// the containers never grow with the user base.
pub struct SessionStore {
    pending_edits: Cache<i64, ID>,
    rate_windows: Cache<i64, Arc<Mutex<Vec<std::time::Instant>>>>,
    requests_per_minute: u32,
}

impl SessionStore {
    pub fn new(config: &Config) -> Self {
        Self {
            pending_edits: Cache::builder().time_to_live(config.pending_ttl).build(),
            rate_windows: Cache::builder().time_to_idle(config.rate_window_ttl).build(),
            requests_per_minute: config.requests_per_minute,
        }
    }

    /// Remember which reminder the user is editing.
    pub async fn begin_edit(&self, user_id: i64, reminder_id: ID) {
        self.pending_edits.insert(user_id, reminder_id).await;
    }

    /// Claim (and clear) the user's pending edit target.
    pub async fn take_pending_edit(&self, user_id: i64) -> Option<ID> {
        let id = self.pending_edits.get(&user_id).await;
        if id.is_some() {
            self.pending_edits.invalidate(&user_id).await;
        }
        id
    }

    /// Sliding one-minute window per user. Returns false when the budget for
    /// this minute is spent.
    pub async fn check_rate_limit(&self, user_id: i64) -> bool {
        let window = self
            .rate_windows
            .get_with(user_id, async { Arc::new(Mutex::new(Vec::new())) })
            .await;
        let mut stamps = window.lock().await;
        let now = std::time::Instant::now();
        stamps.retain(|stamp| now.duration_since(*stamp).as_secs() < 60);
        if stamps.len() >= self.requests_per_minute as usize {
            return false;
        }
        stamps.push(now);
        true
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

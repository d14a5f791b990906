//! Per-user state registry.
//!
//! Each user's [`UserState`] sits behind its own async mutex. A pipeline run
//! holds that mutex from analysis to commit, so reflections for one user are
//! applied one at a time while other users proceed in parallel.

pub mod audit;
pub mod repository;
pub mod state;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::MirrorConfig;
use crate::error::RepositoryError;

pub use audit::{AuditRecord, AuditSink, InMemoryAuditSink, LogAuditSink};
pub use repository::{InMemoryRepository, JsonFileRepository, StateRepository};
pub use state::UserState;

pub type UserHandle = Arc<Mutex<UserState>>;

#[derive(Debug)]
pub struct UserStateStore {
    users: DashMap<String, UserHandle>,
    repository: Arc<dyn StateRepository>,
    config: MirrorConfig,
}

impl UserStateStore {
    pub fn new(config: MirrorConfig, repository: Arc<dyn StateRepository>) -> Self {
        Self {
            users: DashMap::new(),
            repository,
            config,
        }
    }

    pub fn in_memory(config: MirrorConfig) -> Self {
        Self::new(config, Arc::new(InMemoryRepository::new()))
    }

    pub fn repository(&self) -> &Arc<dyn StateRepository> {
        &self.repository
    }

    /// The user's state handle, loading it from the repository on first
    /// access. Unknown users start with empty state.
    pub async fn handle(&self, user_id: &str) -> Result<UserHandle, RepositoryError> {
        if let Some(handle) = self.users.get(user_id) {
            return Ok(Arc::clone(handle.value()));
        }

        // No map guard may be held across the load.
        let state = match self.repository.load(user_id).await? {
            Some(mut state) => {
                log::debug!("loaded stored state for user {}", user_id);
                state.apply_config(&self.config);
                state
            }
            None => UserState::new(&self.config),
        };
        let handle = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(state)));
        Ok(Arc::clone(handle.value()))
    }

    /// The handle if the user has already been loaded.
    pub fn get(&self, user_id: &str) -> Option<UserHandle> {
        self.users.get(user_id).map(|h| Arc::clone(h.value()))
    }

    pub async fn save(&self, user_id: &str, state: &UserState) -> Result<(), RepositoryError> {
        self.repository.save(user_id, state).await
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisInput;
    use crate::evolution::TrackerSettings;

    #[tokio::test]
    async fn test_handle_is_shared_per_user() {
        let store = UserStateStore::in_memory(MirrorConfig::default());
        let a = store.handle("u1").await.unwrap();
        let b = store.handle("u1").await.unwrap();
        let c = store.handle("u2").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(store.user_count(), 2);
    }

    #[tokio::test]
    async fn test_first_access_loads_from_repository() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut stored = UserState::new(&MirrorConfig::default());
        stored.ingest("hello there", &AnalysisInput::default()).unwrap();
        repo.save("u1", &stored).await.unwrap();

        let store = UserStateStore::new(MirrorConfig::default(), repo);
        assert!(store.get("u1").is_none());
        let handle = store.handle("u1").await.unwrap();
        assert_eq!(handle.lock().await.tracker.history().len(), 1);
    }

    #[tokio::test]
    async fn test_loaded_state_uses_current_config() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(JsonFileRepository::new(dir.path()));
        let old = MirrorConfig {
            loop_window: 3,
            ..MirrorConfig::default()
        };
        let mut stored = UserState::new(&old);
        stored.ingest("hello there", &AnalysisInput::default()).unwrap();
        repo.save("u1", &stored).await.unwrap();

        let mut current = MirrorConfig {
            loop_window: 9,
            ..MirrorConfig::default()
        };
        current.tension.pair_weight = 0.4;
        let store = UserStateStore::new(current.clone(), repo);
        let handle = store.handle("u1").await.unwrap();
        let state = handle.lock().await;
        assert_eq!(state.tracker.history().len(), 1);
        assert_eq!(state.tracker.settings().loop_window, 9);
        assert_eq!(state.graph.params().pair_weight, 0.4);
    }

    #[tokio::test]
    async fn test_in_memory_reload_uses_current_config() {
        let repo = Arc::new(InMemoryRepository::new());
        let old = MirrorConfig {
            avoidance_word_limit: 3,
            ..MirrorConfig::default()
        };
        repo.save("u1", &UserState::new(&old)).await.unwrap();

        let store = UserStateStore::new(MirrorConfig::default(), repo);
        let handle = store.handle("u1").await.unwrap();
        assert_eq!(
            handle.lock().await.tracker.settings(),
            &TrackerSettings::from(&MirrorConfig::default())
        );
    }
}

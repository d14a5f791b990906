//! Persistence of per-user state.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::UserState;
use crate::error::RepositoryError;

/// Loads a user's state on first access and saves it after each committed
/// reflection.
#[async_trait]
pub trait StateRepository: Send + Sync + Debug {
    /// `None` when the user has never been seen.
    async fn load(&self, user_id: &str) -> Result<Option<UserState>, RepositoryError>;

    async fn save(&self, user_id: &str, state: &UserState) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    states: RwLock<HashMap<String, UserState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[async_trait]
impl StateRepository for InMemoryRepository {
    async fn load(&self, user_id: &str) -> Result<Option<UserState>, RepositoryError> {
        Ok(self.states.read().get(user_id).cloned())
    }

    async fn save(&self, user_id: &str, state: &UserState) -> Result<(), RepositoryError> {
        self.states.write().insert(user_id.to_string(), state.clone());
        Ok(())
    }
}

/// One pretty-printed JSON document per user inside `directory`.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    directory: PathBuf,
}

impl JsonFileRepository {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File for a user. Characters outside `[A-Za-z0-9_-]` are replaced so a
    /// user id can never escape the directory.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.directory.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl StateRepository for JsonFileRepository {
    async fn load(&self, user_id: &str) -> Result<Option<UserState>, RepositoryError> {
        let path = self.path_for(user_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepositoryError(format!("read {:?}: {}", path, e))),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| RepositoryError(format!("parse {:?}: {}", path, e)))
    }

    async fn save(&self, user_id: &str, state: &UserState) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| RepositoryError(format!("create {:?}: {}", self.directory, e)))?;
        let path = self.path_for(user_id);
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| RepositoryError(format!("serialize state for {}: {}", user_id, e)))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| RepositoryError(format!("write {:?}: {}", path, e)))
    }
}

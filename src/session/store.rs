// Copyright (c) 2025 - Cowboy AI, Inc.
//! Persisted session state
//!
//! Layout (JSON):
//!
//! ```text
//! {
//!   "actor": "u-1",
//!   "versions": { "accounts/acc-1": { "entityId": ..., "observedVersion": ..., "observedAt": ... } },
//!   "failures": [ { "id": ..., "commandType": ..., ... } ]
//! }
//! ```
//!
//! Everything hangs off the single `actor` marker, so a changed marker
//! invalidates the whole snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::actor::ActorId;
use crate::retry_queue::FailedAttempt;
use crate::version_guard::VersionCache;

/// Local state store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateStoreError {
    #[error("State store I/O error: {0}")]
    Io(String),

    #[error("State serialization error: {0}")]
    Serialization(String),
}

pub type StateStoreResult<T> = Result<T, StateStoreError>;

/// Everything a session persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub actor: Option<ActorId>,
    #[serde(default)]
    pub versions: VersionCache,
    #[serde(default)]
    pub failures: Vec<FailedAttempt>,
}

/// Client-local storage for a [`SessionSnapshot`]
#[async_trait]
pub trait LocalStateStore: Send + Sync {
    /// Load the last saved snapshot, if any
    async fn load(&self) -> StateStoreResult<Option<SessionSnapshot>>;

    /// Replace the saved snapshot
    async fn save(&self, snapshot: &SessionSnapshot) -> StateStoreResult<()>;
}

/// Keeps the snapshot in memory only
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    snapshot: RwLock<Option<SessionSnapshot>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl LocalStateStore for InMemoryStateStore {
    async fn load(&self) -> StateStoreResult<Option<SessionSnapshot>> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> StateStoreResult<()> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }
}

/// JSON file, replaced atomically on every save
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LocalStateStore for FileStateStore {
    async fn load(&self) -> StateStoreResult<Option<SessionSnapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateStoreError::Io(e.to_string())),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StateStoreError::Serialization(e.to_string()))
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> StateStoreResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StateStoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StateStoreError::Io(e.to_string()))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| StateStoreError::Io(e.to_string()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StateStoreError::Io(e.to_string()))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Session state saved");
        Ok(())
    }
}

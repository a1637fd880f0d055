// Copyright (c) 2025 - Cowboy AI, Inc.
//! Session-scoped per-actor state
//!
//! The version cache and the retry queue belong to whoever is acting on
//! this client. [`SessionContext`] owns both, together with the identity
//! they belong to, and enforces one lifecycle rule:
//!
//! ```text
//! observe(A)  ──► First      empty state, owned by A
//! observe(A)  ──► Unchanged  state kept
//! observe(B)  ──► Changed    state cleared, now owned by B
//! ```
//!
//! One actor's cached versions and parked failures never reach another.
//! Every mutation saves a snapshot while the write lock is held; a failing
//! save is logged and never blocks the operator.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actor::ActorId;
use crate::clock::Clock;
use crate::commands::CommandType;
use crate::projection::{EntityRef, VersionToken};
use crate::retry_queue::{FailedAttempt, LocalRetryQueue, RetryQueueConfig};
use crate::version_guard::{VersionCache, VersionRecord};

pub mod store;

pub use store::{
    FileStateStore, InMemoryStateStore, LocalStateStore, SessionSnapshot, StateStoreError,
    StateStoreResult,
};

/// Result of reporting the current actor to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorObservation {
    /// No actor was known; state starts empty
    First,
    /// Same actor as last time
    Unchanged,
    /// A different actor; the previous actor's state was cleared
    Changed { previous: ActorId },
}

#[derive(Debug)]
struct SessionState {
    actor: Option<ActorId>,
    versions: VersionCache,
    failures: LocalRetryQueue,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            actor: self.actor.clone(),
            versions: self.versions.clone(),
            failures: self.failures.entries().to_vec(),
        }
    }
}

/// Per-actor version cache and retry queue
pub struct SessionContext {
    state: RwLock<SessionState>,
    store: Arc<dyn LocalStateStore>,
    clock: Arc<dyn Clock>,
}

impl SessionContext {
    /// Empty session
    pub fn new(store: Arc<dyn LocalStateStore>, retry: RetryQueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(SessionState {
                actor: None,
                versions: VersionCache::new(),
                failures: LocalRetryQueue::new(retry),
            }),
            store,
            clock,
        }
    }

    /// Session seeded from the store's last snapshot
    ///
    /// An unreadable snapshot is logged and ignored. The restored state is
    /// still owned by the actor it was saved for; observing anyone else
    /// clears it.
    pub async fn restore(
        store: Arc<dyn LocalStateStore>,
        retry: RetryQueueConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let snapshot = match store.load().await {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session state");
                SessionSnapshot::default()
            }
        };

        let mut failures = LocalRetryQueue::from_entries(retry, snapshot.failures);
        failures.prune(clock.now());

        Self {
            state: RwLock::new(SessionState {
                actor: snapshot.actor,
                versions: snapshot.versions,
                failures,
            }),
            store,
            clock,
        }
    }

    async fn persist(&self, state: &SessionState) {
        if let Err(e) = self.store.save(&state.snapshot()).await {
            warn!(error = %e, "Failed to persist session state");
        }
    }

    /// Report the resolved actor; clears all state when it changed
    pub async fn observe_actor(&self, actor: &ActorId) -> ActorObservation {
        let mut state = self.state.write().await;
        let observation = match state.actor.as_ref() {
            None => ActorObservation::First,
            Some(current) if current == actor => return ActorObservation::Unchanged,
            Some(previous) => ActorObservation::Changed {
                previous: previous.clone(),
            },
        };

        if let ActorObservation::Changed { previous } = &observation {
            info!(
                previous = %previous,
                actor = %actor,
                versions = state.versions.len(),
                failures = state.failures.len(),
                "Actor changed; clearing session state"
            );
            state.versions.clear();
            state.failures.clear();
        }

        state.actor = Some(actor.clone());
        self.persist(&state).await;
        observation
    }

    pub async fn actor(&self) -> Option<ActorId> {
        self.state.read().await.actor.clone()
    }

    /// Forget the actor and everything owned by it
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.actor = None;
        state.versions.clear();
        state.failures.clear();
        self.persist(&state).await;
        info!("Session state reset");
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.snapshot()
    }

    /// Record the version shown to the operator
    pub async fn observe_version(&self, entity: &EntityRef, version: VersionToken) -> VersionRecord {
        let mut state = self.state.write().await;
        let record = state
            .versions
            .observe(entity, version, self.clock.now())
            .clone();
        self.persist(&state).await;
        record
    }

    pub async fn expected_version(&self, entity: &EntityRef) -> Option<VersionToken> {
        self.state.read().await.versions.expected(entity).cloned()
    }

    pub async fn version_record(&self, entity: &EntityRef) -> Option<VersionRecord> {
        self.state.read().await.versions.get(entity).cloned()
    }

    pub async fn invalidate_version(&self, entity: &EntityRef) {
        let mut state = self.state.write().await;
        if state.versions.invalidate(entity).is_some() {
            self.persist(&state).await;
        }
    }

    /// Park a failed attempt; returns its entry id
    pub async fn record_failure(
        &self,
        command_type: CommandType,
        entity_id: &str,
        params: Value,
        error_message: &str,
    ) -> Uuid {
        let mut state = self.state.write().await;
        let id = state
            .failures
            .record(command_type, entity_id, params, error_message, self.clock.now());
        self.persist(&state).await;
        id
    }

    pub async fn failure(&self, id: Uuid) -> Option<FailedAttempt> {
        self.state.read().await.failures.get(id).cloned()
    }

    pub async fn remove_failure(&self, id: Uuid) -> Option<FailedAttempt> {
        let mut state = self.state.write().await;
        let removed = state.failures.remove(id);
        if removed.is_some() {
            self.persist(&state).await;
        }
        removed
    }

    /// Drop a stale entry after the same command succeeded
    pub async fn resolve_failure(&self, command_type: CommandType, entity_id: &str) -> Option<FailedAttempt> {
        let mut state = self.state.write().await;
        let removed = state.failures.remove_for(command_type, entity_id);
        if removed.is_some() {
            self.persist(&state).await;
        }
        removed
    }

    /// Unexpired failures, newest first
    pub async fn list_failures(&self) -> Vec<FailedAttempt> {
        self.state.read().await.failures.list_active(self.clock.now())
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.failures.clear();
        self.persist(&state).await;
    }
}

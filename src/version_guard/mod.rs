// Copyright (c) 2025 - Cowboy AI, Inc.
//! Version Guard
//!
//! Optimistic concurrency check run before a mutation is published: the
//! version token the client last observed must equal the token currently
//! stored in the read model.
//!
//! # Fail-open policy
//!
//! The guard is a user-experience safety net, not a correctness guarantee.
//! It never blocks an otherwise legitimate action because it could not
//! decide:
//!
//! | Situation                         | Result                         |
//! |-----------------------------------|--------------------------------|
//! | no expected version supplied      | skipped (valid)                |
//! | entity missing from the store     | skipped (valid), warning       |
//! | store unreachable / query failed  | skipped (valid), warning       |
//! | tokens equal                      | valid                          |
//! | tokens differ                     | conflict with both tokens      |
//!
//! Tightening any of the skipped rows to a rejection changes product
//! behavior and must be a deliberate decision.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{BridgeError, BridgeResult, FailureContext};
use crate::projection::{EntityRef, ProjectionStore, VersionToken};

pub mod cache;

pub use cache::{VersionCache, VersionRecord};

/// Why a version check was not performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoExpectedVersion,
    EntityNotFound,
    StoreError(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoExpectedVersion => write!(f, "no expected version"),
            SkipReason::EntityNotFound => write!(f, "entity not found"),
            SkipReason::StoreError(e) => write!(f, "store error: {}", e),
        }
    }
}

/// Outcome of a version check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// Stored version equals the expected one
    Valid,

    /// Check not performed; treated as valid
    Skipped(SkipReason),

    /// Entity changed since the client observed it
    Conflict {
        current: VersionToken,
        expected: VersionToken,
    },
}

impl VersionCheck {
    pub fn is_valid(&self) -> bool {
        !matches!(self, VersionCheck::Conflict { .. })
    }

    /// Turn a conflict into a [`BridgeError::Conflict`]
    pub fn into_result(self, entity: &EntityRef, context: &FailureContext) -> BridgeResult<()> {
        match self {
            VersionCheck::Conflict { current, expected } => Err(BridgeError::Conflict {
                entity: entity.clone(),
                expected,
                current,
                context: context.clone(),
            }),
            VersionCheck::Valid | VersionCheck::Skipped(_) => Ok(()),
        }
    }
}

/// Compares observed version tokens against the read model
#[derive(Clone)]
pub struct VersionGuard {
    store: Arc<dyn ProjectionStore>,
}

impl VersionGuard {
    pub fn new(store: Arc<dyn ProjectionStore>) -> Self {
        Self { store }
    }

    /// Check `entity` against the token the client last observed
    pub async fn check(&self, entity: &EntityRef, expected: Option<&VersionToken>) -> VersionCheck {
        let Some(expected) = expected else {
            debug!(entity = %entity, "No expected version; skipping check");
            return VersionCheck::Skipped(SkipReason::NoExpectedVersion);
        };

        let document = match self.store.find_by_id(&entity.collection, &entity.id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!(entity = %entity, "Entity not in projection store; skipping version check");
                return VersionCheck::Skipped(SkipReason::EntityNotFound);
            }
            Err(e) => {
                warn!(entity = %entity, error = %e, "Version check failed open");
                return VersionCheck::Skipped(SkipReason::StoreError(e.to_string()));
            }
        };

        if document.version == *expected {
            VersionCheck::Valid
        } else {
            info!(
                entity = %entity,
                expected = %expected,
                current = %document.version,
                "Version conflict"
            );
            VersionCheck::Conflict {
                current: document.version,
                expected: expected.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::projection::{InMemoryProjectionStore, ProjectionDocument};

    async fn guard_with(version: &str) -> VersionGuard {
        let store = InMemoryProjectionStore::new();
        store
            .upsert("accounts", ProjectionDocument::new("acc-1", version))
            .await;
        VersionGuard::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_equal_tokens_are_valid() {
        let guard = guard_with("V1").await;
        let check = guard
            .check(&EntityRef::new("accounts", "acc-1"), Some(&VersionToken::new("V1")))
            .await;
        assert_eq!(check, VersionCheck::Valid);
    }

    #[tokio::test]
    async fn test_conflict_becomes_error() {
        let guard = guard_with("V2").await;
        let entity = EntityRef::new("accounts", "acc-1");
        let check = guard.check(&entity, Some(&VersionToken::new("V1"))).await;
        assert!(!check.is_valid());

        let err = check
            .into_result(&entity, &FailureContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_missing_entity_is_skipped() {
        let guard = guard_with("V1").await;
        let check = guard
            .check(&EntityRef::new("accounts", "acc-404"), Some(&VersionToken::new("V1")))
            .await;
        assert_eq!(check, VersionCheck::Skipped(SkipReason::EntityNotFound));
        assert!(check.is_valid());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Projection read side
//!
//! The ledger's projector materializes events into read-optimized documents
//! some time after they are appended. This module only ever *reads* those
//! documents:
//!
//! ```text
//! EventStream ──(external projector)──► ProjectionStore
//!                                            │ query / find_by_id
//!                                            ▼
//!                              ProjectionPoller, VersionGuard
//! ```
//!
//! Documents may be rewritten by the projector while they are being read.
//! Readers re-check their predicate on every attempt instead of assuming a
//! document is stable.

pub mod filter;
pub mod memory;
pub mod nats_kv;
pub mod poller;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use filter::{FieldCondition, ProjectionFilter, ProjectionMatch};
pub use memory::InMemoryProjectionStore;
pub use nats_kv::KvProjectionStore;

/// Opaque, comparable marker of a document's last write
///
/// Tokens are compared for exact equality only; no ordering or numeric
/// meaning is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Reference to a document in a read-model collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub collection: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Read-model document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionDocument {
    /// Business identifier (account id, request id, ...)
    pub id: String,

    /// Changes on every write by the projector
    pub version: VersionToken,

    /// Remaining document fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ProjectionDocument {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: VersionToken::new(version),
            fields: Map::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Field value; `id` and `version` resolve to the envelope fields
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "version" => Some(Value::String(self.version.as_str().to_string())),
            _ => self.fields.get(name).cloned(),
        }
    }
}

/// Errors reported by a projection store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached; reads may succeed later
    #[error("Projection store unavailable: {0}")]
    Unavailable(String),

    /// Query can never succeed as issued
    #[error("Invalid projection query: {0}")]
    InvalidQuery(String),

    /// Stored document could not be decoded
    #[error("Failed to decode projection document: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether a later attempt of the same query may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for projection store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to projection documents
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Documents matching every condition of the filter, at most `limit` of them
    async fn query(&self, filter: &ProjectionFilter, limit: usize) -> StoreResult<Vec<ProjectionDocument>>;

    /// Document by id
    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<ProjectionDocument>>;
}

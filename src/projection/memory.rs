// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory projection store
//!
//! Holds documents per collection, ordered by id. Useful for embedding
//! hosts and tests; the host (or a test) plays the projector by calling
//! [`InMemoryProjectionStore::upsert`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ProjectionDocument, ProjectionFilter, ProjectionStore, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct InMemoryProjectionStore {
    collections: RwLock<HashMap<String, BTreeMap<String, ProjectionDocument>>>,
}

impl InMemoryProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document
    pub async fn upsert(&self, collection: &str, document: ProjectionDocument) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(document.id.clone(), document);
    }

    pub async fn remove(&self, collection: &str, id: &str) -> Option<ProjectionDocument> {
        self.collections
            .write()
            .await
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProjectionStore for InMemoryProjectionStore {
    async fn query(&self, filter: &ProjectionFilter, limit: usize) -> StoreResult<Vec<ProjectionDocument>> {
        if filter.collection.is_empty() {
            return Err(StoreError::InvalidQuery("collection must not be empty".to_string()));
        }

        let collections = self.collections.read().await;
        let Some(documents) = collections.get(&filter.collection) else {
            return Ok(Vec::new());
        };

        Ok(documents
            .values()
            .filter(|doc| filter.matches(doc))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<ProjectionDocument>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS KV-backed projection store
//!
//! The projector keeps one KV bucket per read-model collection
//! (`<prefix>_<collection>`), keyed by document id. Values are JSON objects
//! with an `id` and a `version`; when the projector omits `version`, the KV
//! revision stands in as the version token.

use std::collections::HashMap;

use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    ProjectionDocument, ProjectionFilter, ProjectionStore, StoreError, StoreResult, VersionToken,
};

/// Default bucket name prefix
pub const DEFAULT_BUCKET_PREFIX: &str = "LEDGER_PROJECTION";

pub struct KvProjectionStore {
    jetstream: jetstream::Context,
    bucket_prefix: String,
    buckets: Mutex<HashMap<String, kv::Store>>,
}

impl KvProjectionStore {
    pub fn new(jetstream: jetstream::Context, bucket_prefix: impl Into<String>) -> Self {
        Self {
            jetstream,
            bucket_prefix: bucket_prefix.into(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn bucket_name(&self, collection: &str) -> String {
        format!("{}_{}", self.bucket_prefix, collection)
    }

    async fn bucket(&self, collection: &str) -> StoreResult<kv::Store> {
        if collection.is_empty() {
            return Err(StoreError::InvalidQuery("collection must not be empty".to_string()));
        }

        let mut buckets = self.buckets.lock().await;
        if let Some(store) = buckets.get(collection) {
            return Ok(store.clone());
        }

        let name = self.bucket_name(collection);
        let store = self
            .jetstream
            .get_key_value(name.clone())
            .await
            .map_err(|e| StoreError::Unavailable(format!("bucket {}: {}", name, e)))?;

        debug!(bucket = %name, "Opened projection bucket");
        buckets.insert(collection.to_string(), store.clone());
        Ok(store)
    }

    async fn read_entry(&self, store: &kv::Store, key: &str) -> StoreResult<Option<ProjectionDocument>> {
        let entry = store
            .entry(key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match entry {
            Some(entry) if matches!(entry.operation, kv::Operation::Put) => {
                decode_document(key, &entry.value, entry.revision).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// Decode a KV value into a document
pub fn decode_document(key: &str, bytes: &[u8], revision: u64) -> StoreResult<ProjectionDocument> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Decode(format!("{}: {}", key, e)))?;

    let Value::Object(mut fields) = value else {
        return Err(StoreError::Decode(format!("{}: document is not an object", key)));
    };

    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        None => key.to_string(),
        Some(other) => return Err(StoreError::Decode(format!("{}: invalid id {}", key, other))),
    };

    let version = match fields.remove("version") {
        Some(Value::String(token)) => VersionToken::new(token),
        Some(Value::Number(n)) => VersionToken::new(n.to_string()),
        None | Some(Value::Null) => VersionToken::new(revision.to_string()),
        Some(other) => {
            return Err(StoreError::Decode(format!("{}: invalid version {}", key, other)))
        }
    };

    Ok(ProjectionDocument {
        id,
        version,
        fields,
    })
}

#[async_trait]
impl ProjectionStore for KvProjectionStore {
    async fn query(&self, filter: &ProjectionFilter, limit: usize) -> StoreResult<Vec<ProjectionDocument>> {
        let store = self.bucket(&filter.collection).await?;

        let mut keys = store
            .keys()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut matches = Vec::new();
        while let Some(key) = keys.next().await {
            if matches.len() >= limit {
                break;
            }
            let key = key.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            if let Some(doc) = self.read_entry(&store, &key).await? {
                if filter.matches(&doc) {
                    matches.push(doc);
                }
            }
        }

        Ok(matches)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<ProjectionDocument>> {
        let store = self.bucket(collection).await?;
        self.read_entry(&store, id).await
    }
}

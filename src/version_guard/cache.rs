// Copyright (c) 2025 - Cowboy AI, Inc.
//! Client-held cache of observed entity versions

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::projection::{EntityRef, VersionToken};

/// Version of an entity as last observed by this client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    /// `collection/id`
    pub entity_id: String,
    pub observed_version: VersionToken,
    pub observed_at: DateTime<Utc>,
}

/// Observed versions keyed by entity
///
/// An entry is the latest version this client has *seen*, which may lag
/// behind the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionCache {
    records: BTreeMap<String, VersionRecord>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a version seen while loading an entity for display
    pub fn observe(&mut self, entity: &EntityRef, version: VersionToken, at: DateTime<Utc>) -> &VersionRecord {
        let key = entity.to_string();
        let record = VersionRecord {
            entity_id: key.clone(),
            observed_version: version,
            observed_at: at,
        };
        self.records.insert(key.clone(), record);
        &self.records[&key]
    }

    pub fn get(&self, entity: &EntityRef) -> Option<&VersionRecord> {
        self.records.get(&entity.to_string())
    }

    /// Token a mutation of `entity` should be checked against
    pub fn expected(&self, entity: &EntityRef) -> Option<&VersionToken> {
        self.get(entity).map(|record| &record.observed_version)
    }

    /// Forget an entity so a fresh version must be observed first
    pub fn invalidate(&mut self, entity: &EntityRef) -> Option<VersionRecord> {
        self.records.remove(&entity.to_string())
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &VersionRecord> {
        self.records.values()
    }
}

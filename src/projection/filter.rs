// Copyright (c) 2025 - Cowboy AI, Inc.
//! Projection filters and completion predicates

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ProjectionDocument;

/// `field == value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub equals: Value,
}

/// Conjunction of equality conditions within one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionFilter {
    pub collection: String,
    pub conditions: Vec<FieldCondition>,
}

impl ProjectionFilter {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            conditions: Vec::new(),
        }
    }

    /// Add a `field == value` condition
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(FieldCondition {
            field: field.into(),
            equals: value.into(),
        });
        self
    }

    pub fn matches(&self, document: &ProjectionDocument) -> bool {
        self.conditions
            .iter()
            .all(|c| document.field(&c.field).as_ref() == Some(&c.equals))
    }
}

impl fmt::Display for ProjectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collection)?;
        for (i, c) in self.conditions.iter().enumerate() {
            let joiner = if i == 0 { " where " } else { " and " };
            write!(f, "{}{} == {}", joiner, c.field, c.equals)?;
        }
        Ok(())
    }
}

/// Condition under which a command counts as applied
///
/// Creation-style commands wait for a document to exist; status
/// transitions wait for a known document to carry an expected value.
/// Both share the poller's retry skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionMatch {
    /// A document with `key_field == key` exists
    Exists {
        collection: String,
        key_field: String,
        key: String,
    },

    /// The document with `key_field == key` has `field == expected`
    FieldEquals {
        collection: String,
        key_field: String,
        key: String,
        field: String,
        expected: Value,
    },
}

impl ProjectionMatch {
    pub fn exists(
        collection: impl Into<String>,
        key_field: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        ProjectionMatch::Exists {
            collection: collection.into(),
            key_field: key_field.into(),
            key: key.into(),
        }
    }

    pub fn field_equals(
        collection: impl Into<String>,
        key_field: impl Into<String>,
        key: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<Value>,
    ) -> Self {
        ProjectionMatch::FieldEquals {
            collection: collection.into(),
            key_field: key_field.into(),
            key: key.into(),
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Key the poll is correlated on
    pub fn key(&self) -> &str {
        match self {
            ProjectionMatch::Exists { key, .. } | ProjectionMatch::FieldEquals { key, .. } => key,
        }
    }

    /// Store filter for one poll attempt
    pub fn filter(&self) -> ProjectionFilter {
        match self {
            ProjectionMatch::Exists {
                collection,
                key_field,
                key,
            } => ProjectionFilter::new(collection.clone()).field_eq(key_field.clone(), key.clone()),
            ProjectionMatch::FieldEquals {
                collection,
                key_field,
                key,
                field,
                expected,
            } => ProjectionFilter::new(collection.clone())
                .field_eq(key_field.clone(), key.clone())
                .field_eq(field.clone(), expected.clone()),
        }
    }

    /// Re-check a returned document against the predicate
    pub fn is_satisfied_by(&self, document: &ProjectionDocument) -> bool {
        self.filter().matches(document)
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Local retry queue
//!
//! Failed command attempts parked for an operator to retry or discard.
//! Entries are never resubmitted automatically; the queue only remembers
//! what went wrong and with which parameters.
//!
//! # Rules
//!
//! - One entry per `(command type, entity)`; a repeat failure updates it
//! - Entries older than the TTL are hidden from [`LocalRetryQueue::list_active`]
//!   and dropped on the next write
//! - At most `max_entries` are kept; the oldest go first
//!
//! Time is passed in by the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::commands::CommandType;

/// Retry queue limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryQueueConfig {
    /// Lifetime of an entry (default: 24 hours)
    pub ttl: Duration,

    /// Maximum number of entries (default: 50)
    pub max_entries: usize,
}

impl Default for RetryQueueConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            max_entries: 50,
        }
    }
}

/// A command attempt that did not complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAttempt {
    pub id: Uuid,
    pub command_type: CommandType,
    pub entity_id: String,
    /// Whatever the caller needs to rebuild the command
    pub params: Value,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
}

/// Bounded, TTL-pruned list of failed attempts
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRetryQueue {
    config: RetryQueueConfig,
    entries: Vec<FailedAttempt>,
}

impl LocalRetryQueue {
    pub fn new(config: RetryQueueConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    /// Rebuild from persisted entries, applying the current cap
    pub fn from_entries(config: RetryQueueConfig, entries: Vec<FailedAttempt>) -> Self {
        let mut queue = Self { config, entries };
        queue.enforce_cap();
        queue
    }

    pub fn config(&self) -> &RetryQueueConfig {
        &self.config
    }

    /// Record a failure and return the id of its entry
    pub fn record(
        &mut self,
        command_type: CommandType,
        entity_id: impl Into<String>,
        params: Value,
        error_message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Uuid {
        let entity_id = entity_id.into();
        let error_message = error_message.into();
        self.prune(now);

        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.command_type == command_type && e.entity_id == entity_id)
        {
            existing.params = params;
            existing.error_message = error_message;
            existing.created_at = now;
            existing.retry_count += 1;
            info!(
                id = %existing.id,
                command_type = %command_type,
                entity = %entity_id,
                retry_count = existing.retry_count,
                "Updated queued failure"
            );
            return existing.id;
        }

        let id = Uuid::now_v7();
        debug!(id = %id, command_type = %command_type, entity = %entity_id, "Queued failure");
        self.entries.push(FailedAttempt {
            id,
            command_type,
            entity_id,
            params,
            error_message,
            created_at: now,
            retry_count: 0,
        });
        self.enforce_cap();
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&FailedAttempt> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<FailedAttempt> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Remove the entry for `(command_type, entity_id)`, if any
    pub fn remove_for(&mut self, command_type: CommandType, entity_id: &str) -> Option<FailedAttempt> {
        let index = self
            .entries
            .iter()
            .position(|e| e.command_type == command_type && e.entity_id == entity_id)?;
        Some(self.entries.remove(index))
    }

    /// Unexpired entries, newest first
    pub fn list_active(&self, now: DateTime<Utc>) -> Vec<FailedAttempt> {
        let mut active = self
            .entries
            .iter()
            .filter(|e| !self.is_expired(e, now))
            .cloned()
            .collect::<Vec<_>>();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        active
    }

    /// Drop expired entries; returns how many were removed
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl();
        self.entries.retain(|e| now - e.created_at < ttl);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!(pruned, "Pruned expired failures");
        }
        pruned
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All stored entries, including expired ones not yet pruned
    pub fn entries(&self) -> &[FailedAttempt] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.ttl).unwrap_or(chrono::Duration::MAX)
    }

    fn is_expired(&self, entry: &FailedAttempt, now: DateTime<Utc>) -> bool {
        now - entry.created_at >= self.ttl()
    }

    fn enforce_cap(&mut self) {
        while self.entries.len() > self.config.max_entries {
            let Some(oldest) = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(i, _)| i)
            else {
                break;
            };
            let evicted = self.entries.remove(oldest);
            info!(
                id = %evicted.id,
                command_type = %evicted.command_type,
                entity = %evicted.entity_id,
                "Evicted oldest queued failure"
            );
        }
    }
}

impl Default for LocalRetryQueue {
    fn default() -> Self {
        Self::new(RetryQueueConfig::default())
    }
}

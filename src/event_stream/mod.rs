// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Stream Abstraction
//!
//! The ledger's command stream is append-only and is the single source of
//! truth for what happened. This crate only ever appends to it.
//!
//! # Architecture
//!
//! ```text
//! Command → EventPublisher → PublishedEvent → EventStream → Ledger
//!                                                  ↓
//!                                      Projector (external) → Read models
//! ```
//!
//! # Stream Requirements
//!
//! 1. **Append-Only**: events are never updated or deleted
//! 2. **Ordered**: every accepted event gets a stream sequence
//! 3. **Deduplicating**: an append repeating an idempotency key inside the
//!    duplicate window is acknowledged without a second write
//!
//! Keys embed the actor and a payload digest, so a repeated key inside the
//! window always means the same attempt was sent again.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::actor::{Actor, ActorId};
use crate::commands::CommandType;
use crate::idempotency::IdempotencyKey;

pub mod nats;

pub use nats::NatsEventStream;

/// Event stream errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The stream could not be reached or did not acknowledge
    #[error("Event stream unavailable: {0}")]
    Unavailable(String),

    #[error("Event serialization failed: {0}")]
    Serialization(String),

    /// The stream refused the append
    #[error("Event rejected by stream: {0}")]
    Rejected(String),
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Audit attributes stamped by the publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditInfo {
    pub display_name: String,
    pub role: String,
}

impl From<&Actor> for AuditInfo {
    fn from(actor: &Actor) -> Self {
        Self {
            display_name: actor.display_name.clone(),
            role: actor.role.clone(),
        }
    }
}

/// Durable record of an accepted command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedEvent {
    /// Unique event id, derived from the idempotency key
    pub event_id: Uuid,

    /// Key the resulting projection is located by
    pub correlation_key: String,

    #[serde(rename = "type")]
    pub command_type: CommandType,

    pub payload: Value,

    pub actor_id: ActorId,

    pub audit: AuditInfo,

    pub idempotency_key: IdempotencyKey,

    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReceipt {
    /// Stream sequence of the stored event
    pub sequence: u64,

    /// The append repeated an idempotency key and was collapsed
    pub duplicate: bool,
}

/// Append-only event stream (external collaborator)
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Durably append one event
    async fn append(&self, event: &PublishedEvent) -> StreamResult<AppendReceipt>;

    /// How long the stream remembers idempotency keys
    fn duplicate_window(&self) -> Duration;
}

#[derive(Debug)]
struct MemoryState {
    events: Vec<PublishedEvent>,
    seen: HashMap<IdempotencyKey, (u64, DateTime<Utc>)>,
    available: bool,
}

/// In-process stream with the same dedup semantics as JetStream
///
/// The duplicate window is measured on event timestamps, so tests driven by
/// a manual clock stay deterministic.
#[derive(Debug)]
pub struct InMemoryEventStream {
    duplicate_window: Duration,
    state: Mutex<MemoryState>,
}

impl InMemoryEventStream {
    pub fn new(duplicate_window: Duration) -> Self {
        Self {
            duplicate_window,
            state: Mutex::new(MemoryState {
                events: Vec::new(),
                seen: HashMap::new(),
                available: true,
            }),
        }
    }

    /// Stored events in append order
    pub async fn events(&self) -> Vec<PublishedEvent> {
        self.state.lock().await.events.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.events.len()
    }

    /// Simulate an outage
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }
}

impl Default for InMemoryEventStream {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait]
impl EventStream for InMemoryEventStream {
    async fn append(&self, event: &PublishedEvent) -> StreamResult<AppendReceipt> {
        let mut state = self.state.lock().await;
        if !state.available {
            return Err(StreamError::Unavailable("stream offline".to_string()));
        }

        let window = chrono::Duration::from_std(self.duplicate_window)
            .map_err(|e| StreamError::Rejected(e.to_string()))?;

        // Keys older than the window can never match again
        state.seen.retain(|_, (_, first_seen)| event.timestamp - *first_seen < window);

        if let Some((sequence, _)) = state.seen.get(&event.idempotency_key) {
            let sequence = *sequence;
            let stored = sequence
                .checked_sub(1)
                .and_then(|index| state.events.get(index as usize));
            if let Some(stored) = stored {
                if stored.payload != event.payload || stored.actor_id != event.actor_id {
                    return Err(StreamError::Rejected(format!(
                        "idempotency key {} reused for a different command",
                        event.idempotency_key
                    )));
                }
            }
            return Ok(AppendReceipt {
                sequence,
                duplicate: true,
            });
        }

        state.events.push(event.clone());
        let sequence = state.events.len() as u64;
        state
            .seen
            .insert(event.idempotency_key.clone(), (sequence, event.timestamp));

        Ok(AppendReceipt {
            sequence,
            duplicate: false,
        })
    }

    fn duplicate_window(&self) -> Duration {
        self.duplicate_window
    }
}

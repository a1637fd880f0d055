// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event publisher for ledger commands
//!
//! Turns a validated [`Command`] into a [`PublishedEvent`] and appends it to
//! the command stream:
//! - Schema validation before anything is sent
//! - Actor and audit fields from the [`ActorResolver`], never from the caller
//! - Event id derived from the idempotency key, which covers the actor and
//!   the payload, so only a true retry of one attempt collapses
//! - Returns as soon as the stream acknowledges; "accepted" means durably
//!   recorded, not applied

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actor::{Actor, ActorId, ActorResolver};
use crate::commands::Command;
use crate::errors::{BridgeError, BridgeResult};
use crate::event_stream::{AuditInfo, EventStream, PublishedEvent};
use crate::idempotency::{attempt_fingerprint, IdempotencyKey, IdempotencyKeyBuilder};

/// Status reported for an appended command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Accepted,
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub event_id: Uuid,
    pub correlation_key: String,
    pub status: PublishStatus,
    pub sequence: u64,
    /// The stream collapsed this append into an earlier one
    pub duplicate: bool,
    pub idempotency_key: IdempotencyKey,
}

/// Publishes commands to the ledger command stream
#[derive(Clone)]
pub struct EventPublisher {
    stream: Arc<dyn EventStream>,
    actors: Arc<dyn ActorResolver>,
    keys: IdempotencyKeyBuilder,
}

impl EventPublisher {
    /// Create a new event publisher
    pub fn new(stream: Arc<dyn EventStream>, actors: Arc<dyn ActorResolver>) -> Self {
        Self {
            stream,
            actors,
            keys: IdempotencyKeyBuilder::default(),
        }
        .with_key_builder(IdempotencyKeyBuilder::default())
    }

    /// Use a different idempotency bucket
    ///
    /// The bucket is narrowed to the stream's duplicate window when it is
    /// wider.
    pub fn with_key_builder(mut self, keys: IdempotencyKeyBuilder) -> Self {
        let window = self.stream.duplicate_window();
        let clamped = keys.clamped_to(window);
        if clamped != keys {
            warn!(
                bucket_ms = keys.bucket().as_millis() as u64,
                window_ms = window.as_millis() as u64,
                "Idempotency bucket wider than duplicate window, narrowing"
            );
        }
        self.keys = clamped;
        self
    }

    /// Idempotency key a command would be published with by `actor`
    pub fn idempotency_key(&self, command: &Command, actor: &ActorId) -> IdempotencyKey {
        let scope = command
            .correlation_key()
            .map(str::to_string)
            .or_else(|| command.entity().map(|entity| entity.to_string()))
            .unwrap_or_default();
        let fingerprint = attempt_fingerprint(actor, command.payload());
        self.keys
            .build(command.command_type(), &scope, &fingerprint, command.issued_at())
    }

    /// Validate, stamp the current actor and append
    pub async fn publish(&self, command: &Command) -> BridgeResult<PublishReceipt> {
        command.validate()?;
        let actor = self
            .actors
            .resolve()
            .await
            .map_err(|e| e.with_context(&command.failure_context()))?;
        self.publish_as(command, &actor).await
    }

    /// Publish on behalf of an already resolved actor
    pub(crate) async fn publish_as(&self, command: &Command, actor: &Actor) -> BridgeResult<PublishReceipt> {
        command.validate()?;

        let idempotency_key = self.idempotency_key(command, &actor.id);
        let event_id = idempotency_key.event_id();
        let correlation_key = command
            .correlation_key()
            .map(str::to_string)
            .unwrap_or_else(|| event_id.to_string());

        let event = PublishedEvent {
            event_id,
            correlation_key: correlation_key.clone(),
            command_type: command.command_type(),
            payload: command.payload().clone(),
            actor_id: actor.id.clone(),
            audit: AuditInfo::from(actor),
            idempotency_key: idempotency_key.clone(),
            timestamp: command.issued_at(),
        };

        debug!(
            command_type = %event.command_type,
            correlation_key = %correlation_key,
            idempotency_key = %idempotency_key,
            actor = %actor.id,
            "Publishing command"
        );

        let ack = self.stream.append(&event).await.map_err(|e| {
            warn!(
                command_type = %event.command_type,
                correlation_key = %correlation_key,
                error = %e,
                "Command append failed"
            );
            BridgeError::from(e).with_context(
                &command
                    .failure_context()
                    .with_correlation_key(correlation_key.clone()),
            )
        })?;

        info!(
            command_type = %event.command_type,
            event_id = %event_id,
            correlation_key = %correlation_key,
            sequence = ack.sequence,
            duplicate = ack.duplicate,
            "Command accepted"
        );

        Ok(PublishReceipt {
            event_id,
            correlation_key,
            status: PublishStatus::Accepted,
            sequence: ack.sequence,
            duplicate: ack.duplicate,
            idempotency_key,
        })
    }
}

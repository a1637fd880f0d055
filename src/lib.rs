// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ledger command bridge for the Composable Information Machine
//!
//! The ledger processes writes as an append-only command stream and
//! materializes read models asynchronously. Operators, on the other hand,
//! expect a definite answer when they submit a fee waiver or a write-off.
//! This crate bridges the two:
//!
//! ```text
//! Command ──► IdempotencyKeyBuilder ──► VersionGuard ──► EventPublisher
//!                                                            │ event id
//!                                                            ▼
//!                          Caller ◄── ProjectionPoller ◄── Projection store
//!                                          │ (timeout / conflict / unavailable)
//!                                          ▼
//!                                   LocalRetryQueue
//! ```
//!
//! The [`service::CommandBridge`] facade ties the components together and
//! owns the session-scoped per-actor state ([`session::SessionContext`]).

pub mod actor;
pub mod clock;
pub mod commands;
pub mod config;
pub mod errors;
pub mod event_stream;
pub mod idempotency;
pub mod jetstream;
pub mod nats;
pub mod projection;
pub mod publisher;
pub mod retry_queue;
pub mod service;
pub mod session;
pub mod state_machine;
pub mod subjects;
pub mod version_guard;

// Re-export commonly used types
pub use actor::{Actor, ActorId, ActorResolver, StaticActorResolver};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{Command, CommandType, FieldError, ValidationErrors};
pub use config::{BridgeConfig, ConfigError};
pub use errors::{BridgeError, BridgeResult, ErrorKind, FailureContext};
pub use event_stream::{EventStream, InMemoryEventStream, NatsEventStream, PublishedEvent};
pub use idempotency::{attempt_fingerprint, IdempotencyKey, IdempotencyKeyBuilder};
pub use projection::poller::{PollError, PollOptions, ProjectionPoller};
pub use projection::{
    EntityRef, InMemoryProjectionStore, KvProjectionStore, ProjectionDocument, ProjectionFilter,
    ProjectionMatch, ProjectionStore, StoreError, VersionToken,
};
pub use publisher::{EventPublisher, PublishReceipt};
pub use retry_queue::{FailedAttempt, LocalRetryQueue, RetryQueueConfig};
pub use service::{CommandBridge, CommandBridgeBuilder, ExecutionOutcome, MutationRequest};
pub use session::{ActorObservation, SessionContext};
pub use version_guard::{VersionCache, VersionCheck, VersionGuard, VersionRecord};

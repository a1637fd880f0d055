// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Layer for Ledger Commands
//!
//! This module provides the application service the host calls. It
//! orchestrates the bridge components around one mutation.
//!
//! # Architecture
//!
//! ```text
//! Host Request
//!     ↓
//! CommandBridge (this module)
//!     ↓
//! VersionGuard → EventPublisher → Event Stream (NATS JetStream)
//!                                      ↓
//!                          Projector (external) → Projection Store
//!                                                      ↓
//!                                              ProjectionPoller
//! ```
//!
//! # Design Principles
//!
//! 1. **Bounded waits**: every await has an attempt budget
//! 2. **Fail fast on input**: validation happens before any write
//! 3. **Ambiguity is explicit**: a timeout is reported as "unknown", not "failed"
//! 4. **Per-actor state**: version cache and retry queue live in the session
//!
//! # Example
//!
//! ```rust,ignore
//! use cim_ledger_bridge::{CommandBridge, Command, CommandType, MutationRequest};
//!
//! let bridge = CommandBridge::builder()
//!     .event_stream(stream)
//!     .projection_store(store)
//!     .actor_resolver(actors)
//!     .build()
//!     .await?;
//!
//! let outcome = bridge.execute(MutationRequest::new(command)).await?;
//! ```

pub mod command_bridge;

pub use command_bridge::{CommandBridge, CommandBridgeBuilder, ExecutionOutcome, MutationRequest};

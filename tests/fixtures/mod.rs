// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-ledger-bridge
//!
//! Deterministic collaborators and data for the integration tests.
//!
//! # Design Principles
//! - All test data is deterministic (no `Uuid::now_v7()` or `Utc::now()`)
//! - The projection store is scripted: tests decide what each poll sees
//! - Every query is counted so tests can assert polling stopped
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use cim_ledger_bridge::session::InMemoryStateStore;
use cim_ledger_bridge::{
    Actor, Command, CommandBridge, CommandType, InMemoryEventStream, InMemoryProjectionStore,
    ManualClock, PollOptions, ProjectionDocument, ProjectionFilter, ProjectionStore, StaticActorResolver,
    StoreError,
};
use cim_ledger_bridge::projection::StoreResult;

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

pub const ACCOUNT_ID: &str = "acc-1";
pub const REQUEST_ID: &str = "req-1";

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

pub fn alice() -> Actor {
    Actor::new("u-alice", "Alice Agent", "collections_agent")
}

pub fn bob() -> Actor {
    Actor::new("u-bob", "Bob Supervisor", "collections_supervisor")
}

/// Short budget so paused-clock tests stay readable
pub fn fast_poll(max_attempts: u32) -> PollOptions {
    PollOptions::new(max_attempts, Duration::from_millis(100)).with_initial_delay(Duration::ZERO)
}

pub fn write_off_request_payload() -> Value {
    json!({
        "accountId": ACCOUNT_ID,
        "amount": "1500.00",
        "reasonCode": "hardship",
        "notes": "customer in hospital"
    })
}

pub fn write_off_request() -> Command {
    Command::new(
        CommandType::RequestWriteOff,
        write_off_request_payload(),
        Some(REQUEST_ID.to_string()),
        fixed_timestamp(),
    )
    .expect("Invalid write-off request fixture")
}

pub fn approve_write_off() -> Command {
    Command::new(
        CommandType::ApproveWriteOff,
        json!({"requestId": REQUEST_ID, "comment": "approved per policy"}),
        Some(REQUEST_ID.to_string()),
        fixed_timestamp(),
    )
    .expect("Invalid approval fixture")
}

pub fn repayment() -> Command {
    Command::new(
        CommandType::RecordRepayment,
        json!({"accountId": ACCOUNT_ID, "amount": "250.00", "method": "bank_transfer"}),
        None,
        fixed_timestamp(),
    )
    .expect("Invalid repayment fixture")
}

/// Write-off request document as the projector materializes it
pub fn write_off_document(version: &str, status: &str) -> ProjectionDocument {
    ProjectionDocument::new(REQUEST_ID, version)
        .with_field("requestId", REQUEST_ID)
        .with_field("accountId", ACCOUNT_ID)
        .with_field("status", status)
}

pub fn account_document(version: &str) -> ProjectionDocument {
    ProjectionDocument::new(ACCOUNT_ID, version)
        .with_field("status", "active")
        .with_field("balance", "4210.55")
}

/// Projection store whose query results are scripted per attempt
///
/// Scripted responses are consumed first; afterwards queries fall through to
/// the backing in-memory documents.
#[derive(Default)]
pub struct ScriptedProjectionStore {
    script: Mutex<VecDeque<StoreResult<Vec<ProjectionDocument>>>>,
    documents: InMemoryProjectionStore,
    queries: AtomicUsize,
    find_error: Mutex<Option<StoreError>>,
}

impl ScriptedProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(responses: Vec<StoreResult<Vec<ProjectionDocument>>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    pub async fn upsert(&self, collection: &str, document: ProjectionDocument) {
        self.documents.upsert(collection, document).await;
    }

    pub fn fail_lookups(&self, error: StoreError) {
        *self.find_error.lock().unwrap() = Some(error);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectionStore for ScriptedProjectionStore {
    async fn query(&self, filter: &ProjectionFilter, limit: usize) -> StoreResult<Vec<ProjectionDocument>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => self.documents.query(filter, limit).await,
        }
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<ProjectionDocument>> {
        let error = self.find_error.lock().unwrap().clone();
        match error {
            Some(error) => Err(error),
            None => self.documents.find_by_id(collection, id).await,
        }
    }
}

/// Bridge wired to in-memory collaborators
pub struct TestBridge {
    pub bridge: CommandBridge,
    pub stream: Arc<InMemoryEventStream>,
    pub store: Arc<ScriptedProjectionStore>,
    pub actors: Arc<StaticActorResolver>,
    pub clock: Arc<ManualClock>,
    pub state: Arc<InMemoryStateStore>,
}

pub async fn test_bridge(store: ScriptedProjectionStore) -> TestBridge {
    let stream = Arc::new(InMemoryEventStream::default());
    let store = Arc::new(store);
    let actors = Arc::new(StaticActorResolver::new(alice()));
    let clock = Arc::new(ManualClock::new(fixed_timestamp()));
    let state = Arc::new(InMemoryStateStore::new());

    let bridge = CommandBridge::builder()
        .event_stream(stream.clone())
        .projection_store(store.clone())
        .actor_resolver(actors.clone())
        .state_store(state.clone())
        .clock(clock.clone())
        .poll_options(fast_poll(5))
        .build()
        .await
        .expect("Bridge fixture failed to build");

    TestBridge {
        bridge,
        stream,
        store,
        actors,
        clock,
        state,
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Projection poller behavior under a paused clock
//!
//! Each test scripts what the projection store returns per attempt and
//! asserts both the outcome and how many queries were issued.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::Instant;

use cim_ledger_bridge::{
    PollError, PollOptions, ProjectionDocument, ProjectionMatch, ProjectionPoller, StoreError,
};
use fixtures::*;

fn request_exists() -> ProjectionMatch {
    ProjectionMatch::exists("write_off_requests", "requestId", REQUEST_ID)
}

fn request_approved() -> ProjectionMatch {
    ProjectionMatch::field_equals("write_off_requests", "requestId", REQUEST_ID, "status", "approved")
}

fn poller(store: &Arc<ScriptedProjectionStore>) -> ProjectionPoller {
    ProjectionPoller::new(store.clone())
}

#[tokio::test(start_paused = true)]
async fn test_resolves_after_projection_lag() {
    let store = Arc::new(ScriptedProjectionStore::scripted(vec![
        Ok(vec![]),
        Ok(vec![]),
        Ok(vec![write_off_document("v1", "pending")]),
    ]));

    let document = poller(&store)
        .resolve(&request_exists(), &fast_poll(10))
        .await
        .unwrap();

    assert_eq!(document.id, REQUEST_ID);
    assert_eq!(document.field("status"), Some(serde_json::json!("pending")));
    assert_eq!(store.query_count(), 3);

    // Nothing polls once the match was returned
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.query_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_times_out_after_exact_budget() {
    let store = Arc::new(ScriptedProjectionStore::new());
    let options = PollOptions::new(3, Duration::from_millis(500)).with_initial_delay(Duration::from_millis(250));
    let started = Instant::now();

    let err = poller(&store).resolve(&request_exists(), &options).await.unwrap_err();

    assert_eq!(
        err,
        PollError::TimedOut {
            correlation_key: REQUEST_ID.to_string(),
            attempts: 3,
            last_error: None,
        }
    );
    assert_eq!(store.query_count(), 3);
    // initial delay plus two pauses; no pause after the final attempt
    assert!(started.elapsed() >= Duration::from_millis(1250));
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_zero_budget_still_polls_once() {
    let store = Arc::new(ScriptedProjectionStore::new());

    let err = poller(&store)
        .resolve(&request_exists(), &fast_poll(0))
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 1);
    assert_eq!(store.query_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_keep_polling() {
    let store = Arc::new(ScriptedProjectionStore::scripted(vec![
        Err(StoreError::Unavailable("connection reset".to_string())),
        Err(StoreError::Unavailable("connection reset".to_string())),
        Ok(vec![write_off_document("v1", "pending")]),
    ]));

    let document = poller(&store)
        .resolve(&request_exists(), &fast_poll(5))
        .await
        .unwrap();

    assert_eq!(document.version.as_str(), "v1");
    assert_eq!(store.query_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reports_last_query_error() {
    let store = Arc::new(ScriptedProjectionStore::scripted(vec![
        Ok(vec![]),
        Err(StoreError::Unavailable("kv bucket offline".to_string())),
    ]));

    let err = poller(&store)
        .resolve(&request_exists(), &fast_poll(2))
        .await
        .unwrap_err();

    match err {
        PollError::TimedOut {
            attempts, last_error, ..
        } => {
            assert_eq!(attempts, 2);
            assert!(last_error.unwrap().contains("kv bucket offline"));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_rejected_query_stops_immediately() {
    let store = Arc::new(ScriptedProjectionStore::scripted(vec![
        Ok(vec![]),
        Err(StoreError::InvalidQuery("unknown collection".to_string())),
    ]));

    let err = poller(&store)
        .resolve(&request_exists(), &fast_poll(10))
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Errored { attempt: 2, .. }));
    assert_eq!(err.correlation_key(), REQUEST_ID);
    assert_eq!(store.query_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_status_transition_waits_for_expected_value() {
    let store = Arc::new(ScriptedProjectionStore::scripted(vec![
        Ok(vec![write_off_document("v1", "pending")]),
        Ok(vec![write_off_document("v2", "approved")]),
    ]));

    let document = poller(&store)
        .resolve(&request_approved(), &fast_poll(5))
        .await
        .unwrap();

    assert_eq!(document.version.as_str(), "v2");
    assert_eq!(store.query_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_matches_return_first() {
    let duplicate = ProjectionDocument::new("req-1-copy", "v9")
        .with_field("requestId", REQUEST_ID)
        .with_field("status", "pending");
    let store = Arc::new(ScriptedProjectionStore::scripted(vec![Ok(vec![
        write_off_document("v1", "pending"),
        duplicate,
    ])]));

    let document = poller(&store)
        .resolve(&request_exists(), &fast_poll(5))
        .await
        .unwrap();

    assert_eq!(document.id, REQUEST_ID);
    assert_eq!(store.query_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_polling() {
    let store = Arc::new(ScriptedProjectionStore::new());

    let err = poller(&store)
        .resolve_until(
            &request_exists(),
            &fast_poll(10),
            tokio::time::sleep(Duration::from_millis(250)),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PollError::Cancelled {
            correlation_key: REQUEST_ID.to_string(),
            attempts: 3,
        }
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.query_count(), 3);
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Projection Poller
//!
//! Resolves "has my command been applied?" by repeatedly querying the
//! projection store until the expected document appears, the attempt
//! budget runs out, or the store rejects the query outright.
//!
//! ```text
//!            initial_delay
//!                 │
//!                 ▼
//!   ┌──────► query(filter) ──── match ─────► Found
//!   │             │
//!   │     no match / transient error
//!   │             │
//!   │      attempt < max ── no ───────────► TimedOut
//!   │             │ yes
//!   └── sleep(interval)        rejected ───► Errored
//! ```
//!
//! The sequencing lives in [`PollState`]; this module only performs the
//! queries and sleeps it asks for. Attempts never overlap, and dropping the
//! returned future (or firing the cancel future of
//! [`ProjectionPoller::resolve_until`]) drops any pending timer with it.
//!
//! `max_attempts × interval` is a practical deadline, not a guarantee: a
//! timeout means "not visible yet", never "the write failed".

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::{ProjectionDocument, ProjectionMatch, ProjectionStore, StoreError};
use crate::state_machine::{PollAction, PollInput, PollState, StateMachine};

/// Documents requested per attempt; more than one match is logged
const MATCH_PROBE_LIMIT: usize = 2;

/// Poll timing and budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Query attempts before giving up (at least one is always made)
    pub max_attempts: u32,

    /// Pause between attempts
    pub interval: Duration,

    /// Head start given to the projector before the first attempt
    pub initial_delay: Duration,

    /// Consecutive query errors after which a diagnostic warning is logged
    pub query_error_warn_threshold: u32,
}

impl PollOptions {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_query_error_warn_threshold(mut self, threshold: u32) -> Self {
        self.query_error_warn_threshold = threshold;
        self
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(500),
            initial_delay: Duration::from_millis(250),
            query_error_warn_threshold: 3,
        }
    }
}

/// Terminal poll failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    /// Budget spent without a match; the write may still become visible
    #[error("Projection for {correlation_key} not visible after {attempts} attempts")]
    TimedOut {
        correlation_key: String,
        attempts: u32,
        last_error: Option<String>,
    },

    /// The store rejected the query as unanswerable
    #[error("Projection query for {correlation_key} failed on attempt {attempt}: {source}")]
    Errored {
        correlation_key: String,
        attempt: u32,
        #[source]
        source: StoreError,
    },

    /// The caller stopped waiting
    #[error("Polling for {correlation_key} cancelled after {attempts} attempts")]
    Cancelled { correlation_key: String, attempts: u32 },
}

impl PollError {
    pub fn correlation_key(&self) -> &str {
        match self {
            PollError::TimedOut { correlation_key, .. }
            | PollError::Errored { correlation_key, .. }
            | PollError::Cancelled { correlation_key, .. } => correlation_key,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollError::TimedOut { attempts, .. } | PollError::Cancelled { attempts, .. } => *attempts,
            PollError::Errored { attempt, .. } => *attempt,
        }
    }
}

enum AttemptOutcome {
    Matched(ProjectionDocument),
    NoMatch,
    Failed(StoreError),
    Rejected(StoreError),
}

impl AttemptOutcome {
    fn input(&self) -> PollInput {
        match self {
            AttemptOutcome::Matched(_) => PollInput::Matched,
            AttemptOutcome::NoMatch => PollInput::NoMatch,
            AttemptOutcome::Failed(_) => PollInput::QueryFailed,
            AttemptOutcome::Rejected(_) => PollInput::QueryRejected,
        }
    }
}

/// Bounded poller over a projection store
#[derive(Clone)]
pub struct ProjectionPoller {
    store: Arc<dyn ProjectionStore>,
}

impl ProjectionPoller {
    pub fn new(store: Arc<dyn ProjectionStore>) -> Self {
        Self { store }
    }

    /// Poll until the predicate is satisfied or the budget is spent
    pub async fn resolve(
        &self,
        query: &ProjectionMatch,
        options: &PollOptions,
    ) -> Result<ProjectionDocument, PollError> {
        self.resolve_until(query, options, std::future::pending::<()>())
            .await
    }

    /// Like [`resolve`](Self::resolve), but stops as soon as `cancel` completes
    pub async fn resolve_until<C>(
        &self,
        query: &ProjectionMatch,
        options: &PollOptions,
        cancel: C,
    ) -> Result<ProjectionDocument, PollError>
    where
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let correlation_key = query.key().to_string();
        let filter = query.filter();
        let started = Instant::now();
        let mut state = PollState::start(options.max_attempts);
        let mut consecutive_errors: u32 = 0;
        let mut last_error: Option<String> = None;

        if !options.initial_delay.is_zero() {
            tokio::select! {
                _ = &mut cancel => {
                    return Err(PollError::Cancelled { correlation_key, attempts: 0 });
                }
                _ = sleep(options.initial_delay) => {}
            }
        }

        loop {
            let attempt = state.attempts();
            debug!(correlation_key = %correlation_key, attempt, filter = %filter, "Polling projection");

            let result = tokio::select! {
                _ = &mut cancel => {
                    return Err(PollError::Cancelled { correlation_key, attempts: attempt });
                }
                result = self.store.query(&filter, MATCH_PROBE_LIMIT) => result,
            };

            let outcome = match result {
                Ok(documents) => {
                    consecutive_errors = 0;
                    let mut matching = documents
                        .into_iter()
                        .filter(|doc| query.is_satisfied_by(doc))
                        .collect::<Vec<_>>();
                    if matching.len() > 1 {
                        warn!(
                            correlation_key = %correlation_key,
                            matches = matching.len(),
                            "Multiple projection documents matched; using the first"
                        );
                    }
                    if matching.is_empty() {
                        AttemptOutcome::NoMatch
                    } else {
                        AttemptOutcome::Matched(matching.swap_remove(0))
                    }
                }
                Err(err) if err.is_transient() => {
                    consecutive_errors += 1;
                    let threshold = options.query_error_warn_threshold;
                    if threshold > 0 && consecutive_errors % threshold == 0 {
                        warn!(
                            correlation_key = %correlation_key,
                            consecutive_errors,
                            error = %err,
                            "Projection queries keep failing; continuing to poll"
                        );
                    } else {
                        debug!(correlation_key = %correlation_key, attempt, error = %err, "Projection query failed");
                    }
                    last_error = Some(err.to_string());
                    AttemptOutcome::Failed(err)
                }
                Err(err) => AttemptOutcome::Rejected(err),
            };

            let (next, action) = match state.transition(&outcome.input()) {
                Ok(step) => step,
                Err(e) => {
                    return Err(PollError::Errored {
                        correlation_key,
                        attempt,
                        source: StoreError::InvalidQuery(e.to_string()),
                    })
                }
            };
            state = next;

            match (state, outcome) {
                (PollState::Found { attempts }, AttemptOutcome::Matched(document)) => {
                    info!(
                        correlation_key = %correlation_key,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Projection resolved"
                    );
                    return Ok(document);
                }
                (PollState::TimedOut { attempts }, _) => {
                    warn!(
                        correlation_key = %correlation_key,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        last_error = last_error.as_deref().unwrap_or("-"),
                        "Projection not visible within poll budget"
                    );
                    return Err(PollError::TimedOut {
                        correlation_key,
                        attempts,
                        last_error,
                    });
                }
                (PollState::Errored { attempts }, AttemptOutcome::Rejected(source)) => {
                    error!(
                        correlation_key = %correlation_key,
                        attempt = attempts,
                        error = %source,
                        "Projection query rejected"
                    );
                    return Err(PollError::Errored {
                        correlation_key,
                        attempt: attempts,
                        source,
                    });
                }
                (PollState::Polling { .. }, _) if action == PollAction::Retry => {
                    tokio::select! {
                        _ = &mut cancel => {
                            return Err(PollError::Cancelled { correlation_key, attempts: attempt });
                        }
                        _ = sleep(options.interval) => {}
                    }
                }
                (other, _) => {
                    return Err(PollError::Errored {
                        correlation_key,
                        attempt,
                        source: StoreError::InvalidQuery(format!("unexpected poll state {:?}", other)),
                    });
                }
            }
        }
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Projection Poll Lifecycle
//!
//! Bounded polling expressed as a Mealy machine, so that running out of
//! attempts is an ordinary terminal state rather than an error thrown from
//! inside a loop.
//!
//! # States
//!
//! - Polling: attempt `n` of `max` is in flight
//! - Found: a matching document was returned (terminal)
//! - TimedOut: the attempt budget is spent (terminal)
//! - Errored: the store rejected the query as unanswerable (terminal)
//!
//! # Inputs (attempt results)
//!
//! - Matched: Polling → Found
//! - NoMatch / QueryFailed: Polling(n) → Polling(n+1), or TimedOut when n = max
//! - QueryRejected: Polling → Errored
//!
//! A transient query failure counts as "no match": read-path hiccups say
//! nothing about whether the write succeeded.

use super::{StateMachine, TransitionError, TransitionResult};

/// Poll state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling { attempt: u32, max_attempts: u32 },
    Found { attempts: u32 },
    TimedOut { attempts: u32 },
    Errored { attempts: u32 },
}

/// Outcome of one query attempt (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInput {
    /// The query returned a document satisfying the predicate
    Matched,
    /// The query returned nothing usable
    NoMatch,
    /// The query failed with a transient error
    QueryFailed,
    /// The query failed with an error that will not go away
    QueryRejected,
}

/// What the driver does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    /// Sleep for the interval, then issue the next attempt
    Retry,
    /// Stop; the new state is terminal
    Stop,
}

impl PollState {
    /// Initial state; a budget of zero is treated as one attempt
    pub fn start(max_attempts: u32) -> Self {
        PollState::Polling {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Attempts issued so far (including the one in flight)
    pub fn attempts(&self) -> u32 {
        match *self {
            PollState::Polling { attempt, .. } => attempt,
            PollState::Found { attempts }
            | PollState::TimedOut { attempts }
            | PollState::Errored { attempts } => attempts,
        }
    }
}

impl StateMachine for PollState {
    type Input = PollInput;
    type Output = PollAction;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        let PollState::Polling {
            attempt,
            max_attempts,
        } = *self
        else {
            return Err(TransitionError::InvalidTransition {
                from: format!("{:?}", self),
                input: format!("{:?}", input),
            });
        };

        let next = match input {
            PollInput::Matched => (PollState::Found { attempts: attempt }, PollAction::Stop),
            PollInput::QueryRejected => (PollState::Errored { attempts: attempt }, PollAction::Stop),
            PollInput::NoMatch | PollInput::QueryFailed if attempt >= max_attempts => {
                (PollState::TimedOut { attempts: attempt }, PollAction::Stop)
            }
            PollInput::NoMatch | PollInput::QueryFailed => (
                PollState::Polling {
                    attempt: attempt + 1,
                    max_attempts,
                },
                PollAction::Retry,
            ),
        };

        Ok(next)
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling { .. })
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Pure, deterministic state machines. Transitions are functions of the
//! current state and an input; the caller performs whatever I/O the output
//! asks for. This keeps bounded workflows like projection polling testable
//! without timers or stores.
//!
//! # Mealy Machine
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```

pub mod poll_lifecycle;

pub use poll_lifecycle::{PollAction, PollInput, PollState};

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The state does not accept this input
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },
}

/// Trait for finite state machines
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions (use () if none)
    type Output;

    /// Attempt to transition to a new state given an input
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Check if a transition is valid without performing it
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Terminal states accept no further input
    fn is_terminal(&self) -> bool;
}

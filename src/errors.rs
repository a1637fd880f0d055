// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error taxonomy for bridge operations
//!
//! Every error surfaced to the host application falls into one of five
//! kinds. The kind decides what the operator is offered:
//!
//! | Kind          | Meaning                                  | Offer                 |
//! |---------------|------------------------------------------|-----------------------|
//! | `Validation`  | payload malformed, nothing was written   | fix the input         |
//! | `Conflict`    | entity changed since it was displayed    | refresh and resubmit  |
//! | `Unavailable` | stream or projection store unreachable   | try again / defer     |
//! | `Timeout`     | no definite answer within the deadline   | check back later      |
//! | `Unknown`     | anything else                            | report to support     |
//!
//! All variants carry a [`FailureContext`] so the rendered message can be
//! pasted into a support ticket as-is.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::commands::{CommandType, ValidationErrors};
use crate::event_stream::StreamError;
use crate::projection::poller::PollError;
use crate::projection::{EntityRef, StoreError, VersionToken};
use crate::session::StateStoreError;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Coarse classification of a [`BridgeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    Unavailable,
    Timeout,
    Unknown,
}

impl ErrorKind {
    /// Whether resubmitting the same command unchanged can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Unavailable | ErrorKind::Timeout)
    }

    /// Whether the failure may be parked in the local retry queue
    ///
    /// Validation failures need a corrected payload and unknown failures
    /// need a human to look at them, so neither is deferred.
    pub fn is_deferrable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Unavailable | ErrorKind::Timeout | ErrorKind::Conflict
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured context attached to every terminal error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    /// Command being executed, if known
    pub command_type: Option<CommandType>,

    /// Entity the command targets, rendered as `collection/id`
    pub entity_id: Option<String>,

    /// Correlation key of the conversation
    pub correlation_key: Option<String>,

    /// Event the ledger accepted, set once the append succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
}

impl FailureContext {
    /// Context for a command type
    pub fn for_command(command_type: CommandType) -> Self {
        Self {
            command_type: Some(command_type),
            ..Default::default()
        }
    }

    /// Set the entity
    pub fn with_entity(mut self, entity: impl ToString) -> Self {
        self.entity_id = Some(entity.to_string());
        self
    }

    /// Set the correlation key
    pub fn with_correlation_key(mut self, key: impl Into<String>) -> Self {
        self.correlation_key = Some(key.into());
        self
    }

    /// Set the accepted event
    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Fill fields that are missing here from `other`
    pub fn merged_with(mut self, other: &FailureContext) -> Self {
        if self.command_type.is_none() {
            self.command_type = other.command_type;
        }
        if self.entity_id.is_none() {
            self.entity_id = other.entity_id.clone();
        }
        if self.correlation_key.is_none() {
            self.correlation_key = other.correlation_key.clone();
        }
        if self.event_id.is_none() {
            self.event_id = other.event_id;
        }
        self
    }
}

impl fmt::Display for FailureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command={} entity={} correlation={}",
            self.command_type.map(|t| t.as_str()).unwrap_or("-"),
            self.entity_id.as_deref().unwrap_or("-"),
            self.correlation_key.as_deref().unwrap_or("-"),
        )?;
        if let Some(event_id) = self.event_id {
            write!(f, " event={}", event_id)?;
        }
        Ok(())
    }
}

/// Errors surfaced to the host application
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Command payload is malformed; nothing was appended
    #[error("Validation failed ({context}): {errors}")]
    Validation {
        errors: ValidationErrors,
        context: FailureContext,
    },

    /// Entity changed after the client observed it
    #[error("Version conflict on {entity} ({context}): expected {expected}, current {current}")]
    Conflict {
        entity: EntityRef,
        expected: VersionToken,
        current: VersionToken,
        context: FailureContext,
    },

    /// Event stream or projection store could not be reached
    #[error("Service unavailable ({context}): {message}")]
    Unavailable {
        message: String,
        context: FailureContext,
    },

    /// Polling exhausted its attempts; the write may still complete
    #[error("Outcome unknown after {attempts} attempts ({context}); check back later")]
    Timeout {
        attempts: u32,
        last_error: Option<String>,
        context: FailureContext,
    },

    /// Polling was cancelled by the caller; the write may still complete
    #[error("Wait cancelled after {attempts} attempts ({context}); outcome unknown")]
    Cancelled {
        attempts: u32,
        context: FailureContext,
    },

    /// Anything uncategorized
    #[error("Unexpected error ({context}): {message}")]
    Unknown {
        message: String,
        context: FailureContext,
    },
}

impl BridgeError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        BridgeError::Unavailable {
            message: message.into(),
            context: FailureContext::default(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        BridgeError::Unknown {
            message: message.into(),
            context: FailureContext::default(),
        }
    }

    /// Classification used for UI decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Validation { .. } => ErrorKind::Validation,
            BridgeError::Conflict { .. } => ErrorKind::Conflict,
            BridgeError::Unavailable { .. } => ErrorKind::Unavailable,
            BridgeError::Timeout { .. } | BridgeError::Cancelled { .. } => ErrorKind::Timeout,
            BridgeError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn context(&self) -> &FailureContext {
        match self {
            BridgeError::Validation { context, .. }
            | BridgeError::Conflict { context, .. }
            | BridgeError::Unavailable { context, .. }
            | BridgeError::Timeout { context, .. }
            | BridgeError::Cancelled { context, .. }
            | BridgeError::Unknown { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut FailureContext {
        match self {
            BridgeError::Validation { context, .. }
            | BridgeError::Conflict { context, .. }
            | BridgeError::Unavailable { context, .. }
            | BridgeError::Timeout { context, .. }
            | BridgeError::Cancelled { context, .. }
            | BridgeError::Unknown { context, .. } => context,
        }
    }

    /// Fill in context fields the error does not carry yet
    pub fn with_context(mut self, context: &FailureContext) -> Self {
        let current = std::mem::take(self.context_mut());
        *self.context_mut() = current.merged_with(context);
        self
    }

    /// Field-level details for validation failures
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            BridgeError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// One-line rendering suitable for a support ticket
    pub fn report(&self) -> String {
        format!("[{}] {}", self.kind(), self)
    }
}

impl From<StreamError> for BridgeError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Unavailable(message) => BridgeError::unavailable(message),
            other => BridgeError::unknown(other.to_string()),
        }
    }
}

impl From<PollError> for BridgeError {
    fn from(err: PollError) -> Self {
        let message = err.to_string();
        match err {
            PollError::TimedOut {
                correlation_key,
                attempts,
                last_error,
            } => BridgeError::Timeout {
                attempts,
                last_error,
                context: FailureContext::default().with_correlation_key(correlation_key),
            },
            PollError::Cancelled {
                correlation_key,
                attempts,
            } => BridgeError::Cancelled {
                attempts,
                context: FailureContext::default().with_correlation_key(correlation_key),
            },
            PollError::Errored {
                correlation_key, ..
            } => BridgeError::Unknown {
                message,
                context: FailureContext::default().with_correlation_key(correlation_key),
            },
        }
    }
}

impl From<StoreError> for BridgeError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            BridgeError::unavailable(err.to_string())
        } else {
            BridgeError::unknown(err.to_string())
        }
    }
}

impl From<StateStoreError> for BridgeError {
    fn from(err: StateStoreError) -> Self {
        BridgeError::unknown(err.to_string())
    }
}

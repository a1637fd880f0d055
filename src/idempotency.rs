// Copyright (c) 2025 - Cowboy AI, Inc.
//! Idempotency keys for command attempts
//!
//! A key is `<command type>:<scope>:<fingerprint>:<time bucket>`:
//! - scope: the business correlation key, or the target entity when there is none
//! - fingerprint: the acting user plus a digest of the payload
//! - bucket: the command's issue instant divided into coarse windows
//!
//! ```text
//! request_write_off:req-1:u-7#3f0c..:354301920   ← click
//! request_write_off:req-1:u-7#3f0c..:354301920   ← debounced double click, same key
//! request_write_off:req-1:u-7#3f0c..:354301921   ← resubmitted in the next bucket
//! record_repayment:accounts/acc-1:u-9#a41e..:354301920 ← someone else, same entity
//! ```
//!
//! The ledger collapses appends carrying a key it has already seen inside
//! its duplicate window, so benign retries of one attempt are applied once.
//! The bucket must not be wider than that window; see
//! [`IdempotencyKeyBuilder::clamped_to`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::actor::ActorId;
use crate::commands::CommandType;

/// Namespace for event ids derived from idempotency keys
pub const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c65_6467_6572_4272_6964_6765_4576_7431);

/// Namespace for payload digests
pub const PAYLOAD_DIGEST_NAMESPACE: Uuid = Uuid::from_u128(0x6c65_6467_6572_5061_796c_6f61_6444_6731);

/// Default width of a time bucket
pub const DEFAULT_BUCKET: Duration = Duration::from_secs(5);

/// Key the ledger uses to detect a retry of the same attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Event id for the attempt this key identifies
    ///
    /// Retries of one attempt map to one event id; distinct attempts have
    /// distinct keys and therefore distinct ids.
    pub fn event_id(&self) -> Uuid {
        Uuid::new_v5(&EVENT_ID_NAMESPACE, self.0.as_bytes())
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies who sent what: `<actor>#<payload digest>`
///
/// Object keys serialize in sorted order, so equal payloads always digest
/// the same.
pub fn attempt_fingerprint(actor: &ActorId, payload: &Value) -> String {
    let digest = Uuid::new_v5(&PAYLOAD_DIGEST_NAMESPACE, payload.to_string().as_bytes());
    format!("{}#{}", actor, &digest.simple().to_string()[..16])
}

/// Builds idempotency keys from command type, scope, fingerprint and issue time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyKeyBuilder {
    bucket_millis: i64,
}

impl IdempotencyKeyBuilder {
    /// Builder with the given bucket width (clamped to at least one millisecond)
    pub fn new(bucket: Duration) -> Self {
        let millis = i64::try_from(bucket.as_millis()).unwrap_or(i64::MAX);
        Self {
            bucket_millis: millis.max(1),
        }
    }

    /// Bucket width
    pub fn bucket(&self) -> Duration {
        Duration::from_millis(self.bucket_millis.unsigned_abs())
    }

    /// Narrow the bucket so it fits inside a stream's duplicate window
    ///
    /// Two instants in one bucket are then always less than a window apart,
    /// so a repeated key is always collapsed and never stored twice.
    pub fn clamped_to(self, duplicate_window: Duration) -> Self {
        if self.bucket() <= duplicate_window {
            self
        } else {
            Self::new(duplicate_window)
        }
    }

    /// Bucket index an instant falls into
    pub fn bucket_of(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp_millis().div_euclid(self.bucket_millis)
    }

    /// Build the key for one command attempt
    pub fn build(
        &self,
        command_type: CommandType,
        scope: &str,
        fingerprint: &str,
        at: DateTime<Utc>,
    ) -> IdempotencyKey {
        let scope = if scope.is_empty() { "-" } else { scope };
        let fingerprint = if fingerprint.is_empty() { "-" } else { fingerprint };
        IdempotencyKey(format!(
            "{}:{}:{}:{}",
            command_type.as_str(),
            scope,
            fingerprint,
            self.bucket_of(at)
        ))
    }
}

impl Default for IdempotencyKeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET)
    }
}

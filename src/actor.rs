// Copyright (c) 2025 - Cowboy AI, Inc.
//! Acting user resolution
//!
//! The bridge never trusts a caller-supplied actor. The publisher asks the
//! [`ActorResolver`] who is acting and stamps that identity onto the event,
//! and the session uses the same answer to detect actor changes.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::errors::BridgeResult;

/// Opaque identifier of an acting user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Acting user with the attributes attached for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub display_name: String,
    pub role: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            display_name: display_name.into(),
            role: role.into(),
        }
    }
}

/// Lookup of the current actor (session/auth collaborator)
#[async_trait]
pub trait ActorResolver: Send + Sync {
    /// Resolve the actor for the current request
    async fn resolve(&self) -> BridgeResult<Actor>;
}

/// Resolver returning a configured actor
///
/// Hosts that manage sign-in themselves call [`StaticActorResolver::switch_to`]
/// when the operator changes.
#[derive(Debug)]
pub struct StaticActorResolver {
    actor: RwLock<Actor>,
}

impl StaticActorResolver {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor: RwLock::new(actor),
        }
    }

    /// Replace the acting user
    pub async fn switch_to(&self, actor: Actor) {
        *self.actor.write().await = actor;
    }
}

#[async_trait]
impl ActorResolver for StaticActorResolver {
    async fn resolve(&self) -> BridgeResult<Actor> {
        Ok(self.actor.read().await.clone())
    }
}

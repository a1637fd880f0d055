// Copyright (c) 2025 - Cowboy AI, Inc.
//! Command Bridge
//!
//! Application service giving the host a synchronous answer for commands
//! the ledger applies asynchronously.
//!
//! # Execution flow
//!
//! ```text
//! resolve actor ─► observe actor on session ─► validate
//!       ─► version check (explicit token, else cached, else skipped)
//!       ─► publish (idempotency key, event id)
//!       ─► await projection (default predicate for the command type)
//!       ─► invalidate cached version ─► ExecutionOutcome
//! ```
//!
//! Failures come back as [`BridgeError`]s carrying the command type, entity
//! and correlation key. Nothing is retried in the background: deferring a
//! failure and retrying it later are explicit operator actions.
//!
//! A command that timed out after its append was accepted is parked with
//! the accepted event. Retrying it waits for that event's projection again
//! instead of appending a second command; [`CommandBridge::republish_failure`]
//! appends anew when the operator decides the first one is lost.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::actor::{Actor, ActorResolver};
use crate::clock::{Clock, SystemClock};
use crate::commands::{Command, CommandType};
use crate::config::BridgeConfig;
use crate::errors::{BridgeError, BridgeResult, FailureContext};
use crate::event_stream::EventStream;
use crate::idempotency::IdempotencyKeyBuilder;
use crate::projection::poller::{PollOptions, ProjectionPoller};
use crate::projection::{EntityRef, ProjectionDocument, ProjectionMatch, ProjectionStore, VersionToken};
use crate::publisher::{EventPublisher, PublishReceipt};
use crate::retry_queue::{FailedAttempt, RetryQueueConfig};
use crate::session::{
    ActorObservation, FileStateStore, InMemoryStateStore, LocalStateStore, SessionContext,
};
use crate::version_guard::{VersionCheck, VersionGuard, VersionRecord};

/// Entity placeholder for failures of commands without an entity
const NO_ENTITY: &str = "-";

/// Append the ledger accepted for a parked failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedAppend {
    event_id: Uuid,
    correlation_key: String,
}

impl AcceptedAppend {
    fn from_params(params: &Value) -> Option<Self> {
        params
            .get("published")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

/// What a parked failure keeps to rebuild its command
fn failure_params(command: &Command, error: &BridgeError) -> Value {
    let mut params = json!({
        "payload": command.payload(),
        "correlationKey": command.correlation_key(),
    });
    let context = error.context();
    if let (Some(event_id), Some(correlation_key)) = (context.event_id, context.correlation_key.clone()) {
        params["published"] = json!({
            "eventId": event_id,
            "correlationKey": correlation_key,
        });
    }
    params
}

/// A mutation to run end to end
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub command: Command,
    /// Token the operator last saw; the session cache is used when absent
    pub expected_version: Option<VersionToken>,
    /// Overrides the command type's completion predicate
    pub completion: Option<ProjectionMatch>,
    /// Overrides the bridge's default poll budget
    pub poll: Option<PollOptions>,
}

impl MutationRequest {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            expected_version: None,
            completion: None,
            poll: None,
        }
    }

    pub fn with_expected_version(mut self, version: impl Into<String>) -> Self {
        self.expected_version = Some(VersionToken::new(version));
        self
    }

    pub fn with_completion(mut self, completion: ProjectionMatch) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn with_poll(mut self, poll: PollOptions) -> Self {
        self.poll = Some(poll);
        self
    }
}

/// Successful end-to-end execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub event_id: Uuid,
    pub correlation_key: String,
    /// Projection showing the command applied
    pub document: ProjectionDocument,
    /// The stream collapsed the append into an earlier identical attempt
    pub duplicate: bool,
}

/// Synchronous facade over the ledger command stream and read models
pub struct CommandBridge {
    publisher: EventPublisher,
    poller: ProjectionPoller,
    guard: VersionGuard,
    store: Arc<dyn ProjectionStore>,
    actors: Arc<dyn ActorResolver>,
    session: Arc<SessionContext>,
    clock: Arc<dyn Clock>,
    poll: PollOptions,
}

impl CommandBridge {
    pub fn builder() -> CommandBridgeBuilder {
        CommandBridgeBuilder::new()
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn poll_options(&self) -> &PollOptions {
        &self.poll
    }

    async fn current_actor(&self, context: &FailureContext) -> BridgeResult<Actor> {
        let actor = self
            .actors
            .resolve()
            .await
            .map_err(|e| e.with_context(context))?;
        self.session.observe_actor(&actor.id).await;
        Ok(actor)
    }

    /// Resolve the actor and apply the session reset rule
    pub async fn observe_actor(&self) -> BridgeResult<ActorObservation> {
        let actor = self.actors.resolve().await?;
        Ok(self.session.observe_actor(&actor.id).await)
    }

    /// Forget the actor, its cached versions and its parked failures
    pub async fn sign_out(&self) {
        self.session.reset().await;
    }

    /// Validate and append a command without waiting for it to apply
    pub async fn submit_command(
        &self,
        command_type: CommandType,
        payload: Value,
        correlation_key: Option<String>,
    ) -> BridgeResult<PublishReceipt> {
        let command = Command::new(command_type, payload, correlation_key, self.clock.now())?;
        self.submit(&command).await
    }

    /// Append an already built command
    pub async fn submit(&self, command: &Command) -> BridgeResult<PublishReceipt> {
        command.validate()?;
        let actor = self.current_actor(&command.failure_context()).await?;
        self.publisher.publish_as(command, &actor).await
    }

    /// Poll until `query` is satisfied; `None` uses the default budget
    pub async fn await_projection(
        &self,
        query: &ProjectionMatch,
        options: Option<&PollOptions>,
    ) -> BridgeResult<ProjectionDocument> {
        let options = options.unwrap_or(&self.poll);
        Ok(self.poller.resolve(query, options).await?)
    }

    /// Like [`await_projection`](Self::await_projection), stopping when `cancel` completes
    pub async fn await_projection_until<C>(
        &self,
        query: &ProjectionMatch,
        options: Option<&PollOptions>,
        cancel: C,
    ) -> BridgeResult<ProjectionDocument>
    where
        C: Future<Output = ()>,
    {
        let options = options.unwrap_or(&self.poll);
        Ok(self.poller.resolve_until(query, options, cancel).await?)
    }

    /// Compare an observed token with the read model (fails open)
    pub async fn check_version(&self, entity: &EntityRef, expected: Option<&VersionToken>) -> VersionCheck {
        self.guard.check(entity, expected).await
    }

    /// Read an entity for display and remember the version shown
    pub async fn load_entity(&self, entity: &EntityRef) -> BridgeResult<Option<ProjectionDocument>> {
        let context = FailureContext::default().with_entity(entity);
        self.current_actor(&context).await?;

        let document = self
            .store
            .find_by_id(&entity.collection, &entity.id)
            .await
            .map_err(|e| BridgeError::from(e).with_context(&context))?;

        if let Some(document) = &document {
            self.session
                .observe_version(entity, document.version.clone())
                .await;
        }
        Ok(document)
    }

    /// Remember a version the host displayed by other means
    pub async fn observe_version(&self, entity: &EntityRef, version: VersionToken) -> VersionRecord {
        self.session.observe_version(entity, version).await
    }

    pub async fn record_failure(
        &self,
        command_type: CommandType,
        entity_id: &str,
        params: Value,
        error_message: &str,
    ) -> Uuid {
        self.session
            .record_failure(command_type, entity_id, params, error_message)
            .await
    }

    /// Active failures, newest first
    pub async fn list_failures(&self) -> Vec<FailedAttempt> {
        self.session.list_failures().await
    }

    pub async fn clear_failures(&self) {
        self.session.clear_failures().await
    }

    /// Drop one parked failure; returns whether it existed
    pub async fn discard_failure(&self, id: Uuid) -> bool {
        self.session.remove_failure(id).await.is_some()
    }

    /// Park a failed command for a later operator retry
    ///
    /// Only unavailable, timed-out and conflicting commands are parked;
    /// `None` means the error kind is not deferrable.
    pub async fn defer_failure(&self, command: &Command, error: &BridgeError) -> Option<Uuid> {
        if !error.kind().is_deferrable() {
            return None;
        }

        let entity_id = command
            .entity()
            .map(|entity| entity.to_string())
            .unwrap_or_else(|| NO_ENTITY.to_string());

        Some(
            self.session
                .record_failure(
                    command.command_type(),
                    &entity_id,
                    failure_params(command, error),
                    &error.report(),
                )
                .await,
        )
    }

    /// Run a mutation end to end
    pub async fn execute(&self, request: MutationRequest) -> BridgeResult<ExecutionOutcome> {
        let MutationRequest {
            command,
            expected_version,
            completion,
            poll,
        } = request;
        let context = command.failure_context();

        let actor = self.current_actor(&context).await?;
        command.validate()?;

        let entity = command.entity();
        if let Some(entity) = &entity {
            let expected = match expected_version {
                Some(token) => Some(token),
                None => self.session.expected_version(entity).await,
            };
            self.guard
                .check(entity, expected.as_ref())
                .await
                .into_result(entity, &context)?;
        }

        let receipt = self.publisher.publish_as(&command, &actor).await?;
        let context = context
            .with_correlation_key(receipt.correlation_key.clone())
            .with_event_id(receipt.event_id);

        let completion = completion.unwrap_or_else(|| {
            command
                .command_type()
                .completion(&receipt.correlation_key)
        });
        let options = poll.as_ref().unwrap_or(&self.poll);

        let document = self
            .poller
            .resolve(&completion, options)
            .await
            .map_err(|e| {
                let err = BridgeError::from(e).with_context(&context);
                warn!(error = %err.report(), "Command outcome not confirmed");
                err
            })?;

        if let Some(entity) = &entity {
            self.session.invalidate_version(entity).await;
            self.session
                .resolve_failure(command.command_type(), &entity.to_string())
                .await;
        }

        info!(
            command_type = %command.command_type(),
            event_id = %receipt.event_id,
            correlation_key = %receipt.correlation_key,
            document = %document.id,
            "Command applied"
        );

        Ok(ExecutionOutcome {
            event_id: receipt.event_id,
            correlation_key: receipt.correlation_key,
            document,
            duplicate: receipt.duplicate,
        })
    }

    /// Wait for an accepted append to show up in the read model
    async fn confirm_accepted(&self, command: &Command, accepted: &AcceptedAppend) -> BridgeResult<ExecutionOutcome> {
        let context = command
            .failure_context()
            .with_correlation_key(accepted.correlation_key.clone())
            .with_event_id(accepted.event_id);
        self.current_actor(&context).await?;

        let completion = command.command_type().completion(&accepted.correlation_key);
        let document = self
            .poller
            .resolve(&completion, &self.poll)
            .await
            .map_err(|e| BridgeError::from(e).with_context(&context))?;

        if let Some(entity) = command.entity() {
            self.session.invalidate_version(&entity).await;
        }

        info!(
            command_type = %command.command_type(),
            event_id = %accepted.event_id,
            correlation_key = %accepted.correlation_key,
            document = %document.id,
            "Accepted command confirmed"
        );

        Ok(ExecutionOutcome {
            event_id: accepted.event_id,
            correlation_key: accepted.correlation_key.clone(),
            document,
            duplicate: false,
        })
    }

    /// Operator-confirmed retry of a parked failure
    ///
    /// When the ledger already accepted the command, only its projection is
    /// awaited again; otherwise the command is executed anew. The entry is
    /// removed on success. On failure its message is replaced and its retry
    /// count incremented.
    pub async fn retry_failure(&self, id: Uuid) -> BridgeResult<ExecutionOutcome> {
        self.run_failure(id, false).await
    }

    /// Append a parked command again even if the ledger accepted it before
    ///
    /// For when the operator has established the earlier append was lost.
    pub async fn republish_failure(&self, id: Uuid) -> BridgeResult<ExecutionOutcome> {
        self.run_failure(id, true).await
    }

    async fn run_failure(&self, id: Uuid, republish: bool) -> BridgeResult<ExecutionOutcome> {
        let failure = self
            .session
            .failure(id)
            .await
            .ok_or_else(|| BridgeError::unknown(format!("no queued failure {}", id)))?;

        let context = FailureContext::for_command(failure.command_type).with_entity(&failure.entity_id);
        let payload = failure.params.get("payload").cloned().unwrap_or(Value::Null);
        let correlation_key = failure
            .params
            .get("correlationKey")
            .and_then(Value::as_str)
            .map(str::to_string);

        let command = match Command::new(failure.command_type, payload, correlation_key, self.clock.now()) {
            Ok(command) => command,
            Err(e) => {
                let e = e.with_context(&context);
                self.session
                    .record_failure(failure.command_type, &failure.entity_id, failure.params, &e.report())
                    .await;
                return Err(e);
            }
        };

        let accepted = if republish {
            None
        } else {
            AcceptedAppend::from_params(&failure.params)
        };

        let result = match &accepted {
            Some(accepted) => {
                info!(
                    id = %id,
                    command_type = %failure.command_type,
                    event_id = %accepted.event_id,
                    "Awaiting queued command already accepted"
                );
                self.confirm_accepted(&command, accepted).await
            }
            None => {
                info!(
                    id = %id,
                    command_type = %failure.command_type,
                    entity = %failure.entity_id,
                    republish,
                    "Retrying queued failure"
                );
                self.execute(MutationRequest::new(command.clone())).await
            }
        };

        match result {
            Ok(outcome) => {
                self.session.remove_failure(id).await;
                Ok(outcome)
            }
            Err(e) => {
                let params = match accepted {
                    Some(_) => failure.params,
                    None => failure_params(&command, &e),
                };
                self.session
                    .record_failure(failure.command_type, &failure.entity_id, params, &e.report())
                    .await;
                Err(e)
            }
        }
    }
}

/// Builder for [`CommandBridge`]
pub struct CommandBridgeBuilder {
    stream: Option<Arc<dyn EventStream>>,
    store: Option<Arc<dyn ProjectionStore>>,
    actors: Option<Arc<dyn ActorResolver>>,
    state_store: Option<Arc<dyn LocalStateStore>>,
    clock: Arc<dyn Clock>,
    poll: PollOptions,
    keys: IdempotencyKeyBuilder,
    retry_queue: RetryQueueConfig,
}

impl CommandBridgeBuilder {
    pub fn new() -> Self {
        Self {
            stream: None,
            store: None,
            actors: None,
            state_store: None,
            clock: Arc::new(SystemClock),
            poll: PollOptions::default(),
            keys: IdempotencyKeyBuilder::default(),
            retry_queue: RetryQueueConfig::default(),
        }
    }

    /// Take poll, idempotency, retry queue and state file settings from config
    pub fn config(mut self, config: &BridgeConfig) -> Self {
        self.poll = config.poll.clone();
        self.keys = IdempotencyKeyBuilder::new(config.idempotency_bucket);
        self.retry_queue = config.retry_queue;
        if let Some(path) = &config.state_path {
            self.state_store = Some(Arc::new(FileStateStore::new(path.clone())));
        }
        self
    }

    pub fn event_stream(mut self, stream: Arc<dyn EventStream>) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn projection_store(mut self, store: Arc<dyn ProjectionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn actor_resolver(mut self, actors: Arc<dyn ActorResolver>) -> Self {
        self.actors = Some(actors);
        self
    }

    /// Where session state is persisted (in memory when unset)
    pub fn state_store(mut self, state_store: Arc<dyn LocalStateStore>) -> Self {
        self.state_store = Some(state_store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn idempotency(mut self, keys: IdempotencyKeyBuilder) -> Self {
        self.keys = keys;
        self
    }

    pub fn retry_queue(mut self, retry_queue: RetryQueueConfig) -> Self {
        self.retry_queue = retry_queue;
        self
    }

    /// Build the bridge, restoring any persisted session state
    pub async fn build(self) -> BridgeResult<CommandBridge> {
        let stream = self
            .stream
            .ok_or_else(|| BridgeError::unknown("event stream not set"))?;
        let store = self
            .store
            .ok_or_else(|| BridgeError::unknown("projection store not set"))?;
        let actors = self
            .actors
            .ok_or_else(|| BridgeError::unknown("actor resolver not set"))?;
        let state_store = self
            .state_store
            .unwrap_or_else(|| Arc::new(InMemoryStateStore::new()));

        let session = SessionContext::restore(state_store, self.retry_queue, self.clock.clone()).await;

        Ok(CommandBridge {
            publisher: EventPublisher::new(stream, actors.clone()).with_key_builder(self.keys),
            poller: ProjectionPoller::new(store.clone()),
            guard: VersionGuard::new(store.clone()),
            store,
            actors,
            session: Arc::new(session),
            clock: self.clock,
            poll: self.poll,
        })
    }
}

impl Default for CommandBridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

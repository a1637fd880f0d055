// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream Event Stream
//!
//! Appends published events to the ledger's command stream. Each message
//! carries the idempotency key in the `Nats-Msg-Id` header, so JetStream's
//! duplicate window collapses retries of one attempt into a single write.
//! The key includes a digest of the payload, so a collapsed append never
//! hides a different command.

use std::time::Duration;

use async_nats::header::NATS_MESSAGE_ID;
use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;
use tracing::debug;

use super::{AppendReceipt, EventStream, PublishedEvent, StreamError, StreamResult};
use crate::jetstream::{create_command_stream, JetStreamConfig};
use crate::nats::{NatsClient, NatsConfig};
use crate::subjects::SubjectBuilder;

/// JetStream-backed command stream
///
/// # Example
///
/// ```rust,no_run
/// use cim_ledger_bridge::event_stream::NatsEventStream;
/// use cim_ledger_bridge::jetstream::JetStreamConfig;
/// use cim_ledger_bridge::nats::NatsConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let stream = NatsEventStream::connect(NatsConfig::default(), JetStreamConfig::default()).await?;
///     Ok(())
/// }
/// ```
pub struct NatsEventStream {
    jetstream: jetstream::Context,
    subjects: SubjectBuilder,
    duplicate_window: Duration,
}

impl NatsEventStream {
    /// Connect and make sure the command stream exists
    pub async fn connect(nats: NatsConfig, stream: JetStreamConfig) -> StreamResult<Self> {
        let client = NatsClient::new(nats).await?;
        Self::with_context(client.jetstream(), stream).await
    }

    /// Use an existing JetStream context
    pub async fn with_context(
        jetstream: jetstream::Context,
        config: JetStreamConfig,
    ) -> StreamResult<Self> {
        let subjects = SubjectBuilder::new(config.subject_prefix.clone());
        let duplicate_window = config.duplicate_window;
        create_command_stream(jetstream.clone(), config).await?;
        Ok(Self {
            jetstream,
            subjects,
            duplicate_window,
        })
    }
}

#[async_trait]
impl EventStream for NatsEventStream {
    async fn append(&self, event: &PublishedEvent) -> StreamResult<AppendReceipt> {
        let subject = self.subjects.command(event.command_type);

        let payload = serde_json::to_vec(event)
            .map_err(|e| StreamError::Serialization(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(NATS_MESSAGE_ID, event.idempotency_key.as_str());

        let ack = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .map_err(|e| StreamError::Unavailable(e.to_string()))?
            .await
            .map_err(|e| StreamError::Unavailable(e.to_string()))?;

        debug!(
            subject = %subject,
            stream = %ack.stream,
            sequence = ack.sequence,
            duplicate = ack.duplicate,
            "Event appended"
        );

        Ok(AppendReceipt {
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }

    fn duplicate_window(&self) -> Duration {
        self.duplicate_window
    }
}

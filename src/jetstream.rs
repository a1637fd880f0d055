// Copyright (c) 2025 - Cowboy AI, Inc.

//! JetStream configuration and setup for the ledger command stream
//!
//! The command stream captures every subject under the command prefix and
//! keeps a duplicate window, inside which JetStream drops messages whose
//! `Nats-Msg-Id` it has already stored.
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_ledger_bridge::jetstream::{JetStreamConfig, create_command_stream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = async_nats::connect("nats://localhost:4222").await?;
//!     let jetstream = async_nats::jetstream::new(client);
//!
//!     let stream = create_command_stream(jetstream, JetStreamConfig::default()).await?;
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_nats::jetstream::{self, stream::Stream};
use tracing::info;

use crate::event_stream::{StreamError, StreamResult};
use crate::subjects::{SubjectBuilder, COMMAND_ROOT};

/// Configuration for the ledger command stream
#[derive(Debug, Clone, PartialEq)]
pub struct JetStreamConfig {
    /// Stream name
    pub stream_name: String,

    /// Subjects this stream will capture (defaults to "ledger.commands.>")
    pub subjects: Vec<String>,

    /// Prefix that command subjects are published under
    pub subject_prefix: String,

    /// Window in which repeated message ids are dropped (default: 2 minutes)
    pub duplicate_window: Duration,

    /// Maximum age of messages (default: 90 days)
    pub max_age: Duration,

    /// Maximum bytes stored in stream (default: 10GB)
    pub max_bytes: i64,

    /// Storage type (File or Memory)
    pub storage: StorageType,

    /// Number of replicas (for clustered NATS)
    pub replicas: usize,

    /// Retention policy
    pub retention: RetentionPolicy,
}

impl Default for JetStreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "LEDGER_COMMANDS".to_string(),
            subjects: vec![SubjectBuilder::new(COMMAND_ROOT).wildcard()],
            subject_prefix: COMMAND_ROOT.to_string(),
            duplicate_window: Duration::from_secs(120),
            max_age: Duration::from_secs(90 * 24 * 60 * 60), // 90 days
            max_bytes: 10 * 1024 * 1024 * 1024, // 10 GB
            storage: StorageType::File,
            replicas: 1,
            retention: RetentionPolicy::Limits,
        }
    }
}

/// Storage type for JetStream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// File-based storage (persistent across restarts)
    File,
    /// Memory-based storage (faster, but lost on restart)
    Memory,
}

/// Retention policy for stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Limits-based retention (based on max_age and max_bytes)
    Limits,
    /// Interest-based retention (messages kept while there are consumers)
    Interest,
    /// Work queue retention (messages deleted after acknowledgment)
    WorkQueue,
}

/// Create or fetch the command stream
///
/// Idempotent: an existing stream with the same name is returned as is.
pub async fn create_command_stream(
    jetstream: jetstream::Context,
    config: JetStreamConfig,
) -> StreamResult<Stream> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let retention = match config.retention {
        RetentionPolicy::Limits => jetstream::stream::RetentionPolicy::Limits,
        RetentionPolicy::Interest => jetstream::stream::RetentionPolicy::Interest,
        RetentionPolicy::WorkQueue => jetstream::stream::RetentionPolicy::WorkQueue,
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.subjects,
        max_age: config.max_age,
        max_bytes: config.max_bytes,
        duplicate_window: config.duplicate_window,
        storage,
        num_replicas: config.replicas,
        retention,
        ..Default::default()
    };

    let stream = jetstream
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| StreamError::Unavailable(e.to_string()))?;

    info!(stream = %config.stream_name, "Command stream ready");

    Ok(stream)
}

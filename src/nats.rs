// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS connection for the command stream and projection buckets

use async_nats::{jetstream, Client, ConnectOptions};
use std::time::Duration;
use tracing::info;

use crate::event_stream::{StreamError, StreamResult};

/// Configuration for NATS connection
#[derive(Debug, Clone, PartialEq)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "ledger-bridge".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Connected NATS client
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect with the given configuration
    pub async fn new(config: NatsConfig) -> StreamResult<Self> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| StreamError::Unavailable(e.to_string()))?;

        info!(servers = ?config.servers, "Connected to NATS");

        Ok(Self { client })
    }

    /// JetStream context over this connection
    pub fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }

    /// Get the underlying NATS client for advanced operations
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ledger Bridge operator tool
//!
//! Submits ledger commands over NATS and waits for the read model to show
//! them applied.
//!
//! Usage:
//!
//! ```text
//! ledger-bridge submit <type> <payload-json> [correlation-key]
//! ledger-bridge await <collection> <key-field> <key> [<field> <expected-json>]
//! ledger-bridge failures
//! ledger-bridge retry <failure-id>
//! ledger-bridge republish <failure-id>
//! ```
//!
//! `retry` waits again for a command the ledger already accepted;
//! `republish` appends it anew.
//!
//! Prerequisites:
//! 1. NATS server with JetStream running (LEDGER_BRIDGE_NATS_URL, default localhost:4222)
//! 2. Acting operator set via LEDGER_BRIDGE_ACTOR_ID (plus optional
//!    LEDGER_BRIDGE_ACTOR_NAME and LEDGER_BRIDGE_ACTOR_ROLE)
//! 3. LEDGER_BRIDGE_STATE_PATH set to keep the retry queue between runs

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use cim_ledger_bridge::nats::NatsClient;
use cim_ledger_bridge::{
    Actor, BridgeConfig, Command, CommandBridge, CommandType, KvProjectionStore,
    MutationRequest, NatsEventStream, ProjectionMatch, StaticActorResolver,
};

const USAGE: &str = "usage:
  ledger-bridge submit <type> <payload-json> [correlation-key]
  ledger-bridge await <collection> <key-field> <key> [<field> <expected-json>]
  ledger-bridge failures
  ledger-bridge retry <failure-id>
  ledger-bridge republish <failure-id>";

fn actor_from_env() -> Result<Actor> {
    let id = std::env::var("LEDGER_BRIDGE_ACTOR_ID")
        .context("LEDGER_BRIDGE_ACTOR_ID not set")?;
    let name = std::env::var("LEDGER_BRIDGE_ACTOR_NAME").unwrap_or_else(|_| id.clone());
    let role = std::env::var("LEDGER_BRIDGE_ACTOR_ROLE").unwrap_or_else(|_| "operator".to_string());
    Ok(Actor::new(id, name, role))
}

async fn connect(config: &BridgeConfig) -> Result<CommandBridge> {
    let client = NatsClient::new(config.nats.clone())
        .await
        .context("Failed to connect to NATS")?;
    let jetstream = client.jetstream();

    let stream = NatsEventStream::with_context(jetstream.clone(), config.stream.clone())
        .await
        .context("Failed to set up command stream")?;
    let store = KvProjectionStore::new(jetstream, config.kv_bucket_prefix.clone());
    let actors = StaticActorResolver::new(actor_from_env()?);

    let bridge = CommandBridge::builder()
        .config(config)
        .event_stream(Arc::new(stream))
        .projection_store(Arc::new(store))
        .actor_resolver(Arc::new(actors))
        .build()
        .await?;

    bridge.observe_actor().await?;
    Ok(bridge)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn submit(bridge: &CommandBridge, args: &[String]) -> Result<()> {
    let [command_type, payload, rest @ ..] = args else {
        bail!(USAGE);
    };
    let command_type: CommandType = command_type.parse()?;
    let payload: Value = serde_json::from_str(payload).context("payload is not valid JSON")?;
    let correlation_key = rest.first().cloned();

    let command = Command::new(command_type, payload, correlation_key, chrono::Utc::now())?;

    match bridge.execute(MutationRequest::new(command.clone())).await {
        Ok(outcome) => print_json(&outcome),
        Err(e) => {
            if let Some(id) = bridge.defer_failure(&command, &e).await {
                warn!(failure_id = %id, "Parked for retry");
            }
            Err(anyhow::Error::new(e).context("command not confirmed"))
        }
    }
}

async fn await_projection(bridge: &CommandBridge, args: &[String]) -> Result<()> {
    let query = match args {
        [collection, key_field, key] => ProjectionMatch::exists(collection, key_field, key),
        [collection, key_field, key, field, expected] => {
            let expected: Value = serde_json::from_str(expected)
                .unwrap_or_else(|_| Value::String(expected.clone()));
            ProjectionMatch::field_equals(collection, key_field, key, field, expected)
        }
        _ => bail!(USAGE),
    };

    let document = bridge.await_projection(&query, None).await?;
    print_json(&document)
}

fn failure_id(args: &[String]) -> Result<Uuid> {
    let [id] = args else {
        bail!(USAGE);
    };
    id.parse().context("failure id is not a UUID")
}

async fn retry(bridge: &CommandBridge, args: &[String]) -> Result<()> {
    let outcome = bridge.retry_failure(failure_id(args)?).await?;
    print_json(&outcome)
}

async fn republish(bridge: &CommandBridge, args: &[String]) -> Result<()> {
    let outcome = bridge.republish_failure(failure_id(args)?).await?;
    print_json(&outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((subcommand, rest)) = args.split_first() else {
        bail!(USAGE);
    };

    let config = BridgeConfig::from_env()?;
    info!(
        servers = ?config.nats.servers,
        stream = %config.stream.stream_name,
        "Configuration loaded"
    );

    let bridge = connect(&config).await?;

    match subcommand.as_str() {
        "submit" => submit(&bridge, rest).await,
        "await" => await_projection(&bridge, rest).await,
        "failures" => print_json(&bridge.list_failures().await),
        "retry" => retry(&bridge, rest).await,
        "republish" => republish(&bridge, rest).await,
        other => bail!("unknown subcommand '{}'\n{}", other, USAGE),
    }
}

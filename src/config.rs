// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bridge configuration
//!
//! Every setting has a default; [`BridgeConfig::from_env`] overrides them
//! from `LEDGER_BRIDGE_*` environment variables:
//!
//! | Variable                               | Setting                        |
//! |----------------------------------------|--------------------------------|
//! | `LEDGER_BRIDGE_NATS_URL`               | NATS servers (comma separated) |
//! | `LEDGER_BRIDGE_NATS_NAME`              | NATS client name               |
//! | `LEDGER_BRIDGE_STREAM`                 | command stream name            |
//! | `LEDGER_BRIDGE_SUBJECT_PREFIX`         | command subject prefix         |
//! | `LEDGER_BRIDGE_DUPLICATE_WINDOW_SECS`  | stream duplicate window        |
//! | `LEDGER_BRIDGE_KV_PREFIX`              | projection bucket prefix       |
//! | `LEDGER_BRIDGE_POLL_MAX_ATTEMPTS`      | poll attempts                  |
//! | `LEDGER_BRIDGE_POLL_INTERVAL_MS`       | pause between polls            |
//! | `LEDGER_BRIDGE_POLL_INITIAL_DELAY_MS`  | delay before the first poll    |
//! | `LEDGER_BRIDGE_POLL_WARN_THRESHOLD`    | query errors before a warning  |
//! | `LEDGER_BRIDGE_IDEMPOTENCY_BUCKET_MS`  | idempotency time bucket        |
//! | `LEDGER_BRIDGE_RETRY_TTL_SECS`         | retry queue entry lifetime     |
//! | `LEDGER_BRIDGE_RETRY_MAX_ENTRIES`      | retry queue capacity           |
//! | `LEDGER_BRIDGE_STATE_PATH`             | session state file             |
//!
//! The idempotency bucket may not be wider than the duplicate window.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::idempotency::DEFAULT_BUCKET;
use crate::jetstream::JetStreamConfig;
use crate::nats::NatsConfig;
use crate::projection::nats_kv::DEFAULT_BUCKET_PREFIX;
use crate::projection::poller::PollOptions;
use crate::retry_queue::RetryQueueConfig;
use crate::subjects::SubjectBuilder;

const ENV_PREFIX: &str = "LEDGER_BRIDGE_";

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: String, value: String },
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub nats: NatsConfig,
    pub stream: JetStreamConfig,
    /// Prefix of the projection KV buckets
    pub kv_bucket_prefix: String,
    /// Default poll budget; callers may override per command
    pub poll: PollOptions,
    pub idempotency_bucket: Duration,
    pub retry_queue: RetryQueueConfig,
    /// Session state file; in-memory when unset
    pub state_path: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig::default(),
            stream: JetStreamConfig::default(),
            kv_bucket_prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            poll: PollOptions::default(),
            idempotency_bucket: DEFAULT_BUCKET,
            retry_queue: RetryQueueConfig::default(),
            state_path: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let mut config = Self::default();

        if let Some(urls) = env.string("NATS_URL") {
            config.nats.servers = urls
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(name) = env.string("NATS_NAME") {
            config.nats.name = name;
        }

        if let Some(stream) = env.string("STREAM") {
            config.stream.stream_name = stream;
        }
        if let Some(prefix) = env.string("SUBJECT_PREFIX") {
            let subjects = SubjectBuilder::new(prefix);
            config.stream.subject_prefix = subjects.prefix().to_string();
            config.stream.subjects = vec![subjects.wildcard()];
        }
        if let Some(secs) = env.parse::<u64>("DUPLICATE_WINDOW_SECS")? {
            config.stream.duplicate_window = Duration::from_secs(secs);
        }
        if let Some(prefix) = env.string("KV_PREFIX") {
            config.kv_bucket_prefix = prefix;
        }

        if let Some(attempts) = env.parse::<u32>("POLL_MAX_ATTEMPTS")? {
            config.poll.max_attempts = attempts;
        }
        if let Some(ms) = env.parse::<u64>("POLL_INTERVAL_MS")? {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("POLL_INITIAL_DELAY_MS")? {
            config.poll.initial_delay = Duration::from_millis(ms);
        }
        if let Some(threshold) = env.parse::<u32>("POLL_WARN_THRESHOLD")? {
            config.poll.query_error_warn_threshold = threshold;
        }

        if let Some(ms) = env.parse::<u64>("IDEMPOTENCY_BUCKET_MS")? {
            config.idempotency_bucket = Duration::from_millis(ms);
        }

        if let Some(secs) = env.parse::<u64>("RETRY_TTL_SECS")? {
            config.retry_queue.ttl = Duration::from_secs(secs);
        }
        if let Some(max) = env.parse::<usize>("RETRY_MAX_ENTRIES")? {
            config.retry_queue.max_entries = max;
        }

        config.state_path = env.string("STATE_PATH").map(PathBuf::from);

        if config.idempotency_bucket > config.stream.duplicate_window {
            return Err(ConfigError::Invalid {
                var: format!("{}IDEMPOTENCY_BUCKET_MS", ENV_PREFIX),
                value: format!(
                    "{} (exceeds duplicate window of {}s)",
                    config.idempotency_bucket.as_millis(),
                    config.stream.duplicate_window.as_secs()
                ),
            });
        }

        Ok(config)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        self.string(name)
            .map(|value| {
                value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                    var: format!("{}{}", ENV_PREFIX, name),
                    value,
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.poll.max_attempts, 10);
        assert_eq!(config.retry_queue.max_entries, 50);
        assert_eq!(config.idempotency_bucket, Duration::from_secs(5));
        assert!(config.state_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("LEDGER_BRIDGE_NATS_URL", "nats://a:4222, nats://b:4222"),
            ("LEDGER_BRIDGE_SUBJECT_PREFIX", "tenant.ledger"),
            ("LEDGER_BRIDGE_POLL_MAX_ATTEMPTS", "3"),
            ("LEDGER_BRIDGE_POLL_INTERVAL_MS", "1500"),
            ("LEDGER_BRIDGE_STATE_PATH", "/var/lib/ledger-bridge/session.json"),
        ]))
        .unwrap();

        assert_eq!(config.nats.servers, vec!["nats://a:4222", "nats://b:4222"]);
        assert_eq!(config.stream.subjects, vec!["tenant.ledger.>"]);
        assert_eq!(config.poll.max_attempts, 3);
        assert_eq!(config.poll.interval, Duration::from_millis(1500));
        assert_eq!(
            config.state_path,
            Some(PathBuf::from("/var/lib/ledger-bridge/session.json"))
        );
    }

    #[test]
    fn test_unparsable_value_is_rejected() {
        let err = BridgeConfig::from_lookup(lookup(&[("LEDGER_BRIDGE_RETRY_TTL_SECS", "a day")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "LEDGER_BRIDGE_RETRY_TTL_SECS".to_string(),
                value: "a day".to_string()
            }
        );
    }

    #[test]
    fn test_bucket_wider_than_duplicate_window_is_rejected() {
        let err = BridgeConfig::from_lookup(lookup(&[
            ("LEDGER_BRIDGE_DUPLICATE_WINDOW_SECS", "1"),
            ("LEDGER_BRIDGE_IDEMPOTENCY_BUCKET_MS", "5000"),
        ]))
        .unwrap_err();

        match err {
            ConfigError::Invalid { var, value } => {
                assert_eq!(var, "LEDGER_BRIDGE_IDEMPOTENCY_BUCKET_MS");
                assert!(value.starts_with("5000"));
            }
        }
    }

    #[test]
    fn test_bucket_equal_to_duplicate_window_is_accepted() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("LEDGER_BRIDGE_DUPLICATE_WINDOW_SECS", "5"),
            ("LEDGER_BRIDGE_IDEMPOTENCY_BUCKET_MS", "5000"),
        ]))
        .unwrap();
        assert_eq!(config.idempotency_bucket, config.stream.duplicate_window);
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Retry queue properties

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;

use cim_ledger_bridge::{CommandType, LocalRetryQueue, RetryQueueConfig};

#[derive(Debug, Clone)]
struct Failure {
    command_type: CommandType,
    account: u8,
    minutes_later: i64,
}

fn failure() -> impl Strategy<Value = Failure> {
    (prop::sample::select(CommandType::ALL.to_vec()), 0u8..8, 0i64..90).prop_map(
        |(command_type, account, minutes_later)| Failure {
            command_type,
            account,
            minutes_later,
        },
    )
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 19, 12, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn prop_queue_bounded_and_unique(
        failures in prop::collection::vec(failure(), 0..64),
        max_entries in 1usize..10,
    ) {
        let mut queue = LocalRetryQueue::new(RetryQueueConfig {
            ttl: Duration::from_secs(60 * 60),
            max_entries,
        });
        let mut now = start();

        for f in &failures {
            now += chrono::Duration::minutes(f.minutes_later);
            queue.record(
                f.command_type,
                format!("accounts/acc-{}", f.account),
                json!({"account": f.account}),
                "offline",
                now,
            );

            prop_assert!(queue.len() <= max_entries);
            let keys = queue
                .entries()
                .iter()
                .map(|e| (e.command_type, e.entity_id.clone()))
                .collect::<HashSet<_>>();
            prop_assert_eq!(keys.len(), queue.len());
        }

        let active = queue.list_active(now);
        prop_assert!(active.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        prop_assert!(active.iter().all(|e| now - e.created_at < chrono::Duration::hours(1)));
    }

    #[test]
    fn prop_repeat_failures_count_retries(repeats in 1u32..20) {
        let mut queue = LocalRetryQueue::default();
        let mut now = start();
        let mut ids = HashSet::new();

        for _ in 0..repeats {
            ids.insert(queue.record(
                CommandType::RecordRepayment,
                "accounts/acc-1",
                json!({}),
                "offline",
                now,
            ));
            now += chrono::Duration::seconds(10);
        }

        prop_assert_eq!(ids.len(), 1);
        prop_assert_eq!(queue.len(), 1);
        prop_assert_eq!(queue.entries()[0].retry_count, repeats - 1);
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Idempotency key properties

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use cim_ledger_bridge::{CommandType, IdempotencyKeyBuilder};

const FINGERPRINT: &str = "u-1#00000000000000ff";

fn command_type() -> impl Strategy<Value = CommandType> {
    prop::sample::select(CommandType::ALL.to_vec())
}

fn instant(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

// 2026-01-01 .. 2027-01-01 in epoch millis
const YEAR_START: i64 = 1_767_225_600_000;
const YEAR_END: i64 = 1_798_761_600_000;

proptest! {
    #[test]
    fn prop_same_bucket_same_key(
        command in command_type(),
        scope in "[a-z_]{1,12}/[a-z0-9-]{1,12}",
        bucket_secs in 1u64..60,
        start in YEAR_START..YEAR_END,
        offset in 0i64..60_000,
    ) {
        let builder = IdempotencyKeyBuilder::new(Duration::from_secs(bucket_secs));
        let bucket_millis = (bucket_secs * 1000) as i64;
        let bucket_start = start - start.rem_euclid(bucket_millis);
        let within = bucket_start + offset % bucket_millis;

        let a = builder.build(command, &scope, FINGERPRINT, instant(bucket_start));
        let b = builder.build(command, &scope, FINGERPRINT, instant(within));

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.event_id(), b.event_id());
    }

    #[test]
    fn prop_next_bucket_new_key(
        command in command_type(),
        scope in "[a-z0-9-]{1,16}",
        bucket_secs in 1u64..60,
        start in YEAR_START..YEAR_END,
    ) {
        let builder = IdempotencyKeyBuilder::new(Duration::from_secs(bucket_secs));
        let later = start + (bucket_secs * 1000) as i64;

        let a = builder.build(command, &scope, FINGERPRINT, instant(start));
        let b = builder.build(command, &scope, FINGERPRINT, instant(later));

        prop_assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn prop_scope_and_type_separate_keys(
        first in command_type(),
        second in command_type(),
        scope_a in "[a-z0-9-]{1,16}",
        scope_b in "[a-z0-9-]{1,16}",
        at in YEAR_START..YEAR_END,
    ) {
        prop_assume!(first != second || scope_a != scope_b);
        let builder = IdempotencyKeyBuilder::default();

        let a = builder.build(first, &scope_a, FINGERPRINT, instant(at));
        let b = builder.build(second, &scope_b, FINGERPRINT, instant(at));

        prop_assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn prop_fingerprint_separates_attempts(
        command in command_type(),
        scope in "[a-z0-9-]{1,16}",
        first in "u-[a-z0-9]{1,8}#[0-9a-f]{16}",
        second in "u-[a-z0-9]{1,8}#[0-9a-f]{16}",
        at in YEAR_START..YEAR_END,
    ) {
        prop_assume!(first != second);
        let builder = IdempotencyKeyBuilder::default();

        let a = builder.build(command, &scope, &first, instant(at));
        let b = builder.build(command, &scope, &second, instant(at));

        prop_assert_ne!(a.event_id(), b.event_id());
    }
}

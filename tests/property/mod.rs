// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property test modules

mod idempotency_properties;
mod retry_queue_properties;

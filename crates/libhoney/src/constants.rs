// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Default ingestion host.
pub const DEFAULT_API_HOST: &str = "https://api.honeycomb.io/";

/// Queue length at which a batch is dispatched immediately.
pub const DEFAULT_BATCH_SIZE_TRIGGER: usize = 50;

/// How long the first event of a quiet queue may wait before a batch is dispatched anyway.
pub const DEFAULT_BATCH_TIME_TRIGGER: Duration = Duration::from_millis(100);

/// How many batches may be in flight at once.
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 10;

/// How many events may be waiting for a batch before new ones are dropped.
pub const DEFAULT_PENDING_WORK_CAPACITY: usize = 10_000;

/// Per-request deadline for a batch POST.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The ingestion API refuses single events larger than this once encoded.
pub const DEFAULT_MAX_EVENT_SIZE_BYTES: usize = 1_000_000;

/// How many outcomes a [`ResponseQueue`](crate::response::ResponseQueue) holds before dropping.
pub const DEFAULT_MAX_RESPONSE_QUEUE_SIZE: usize = 1_000;

pub const DEFAULT_SAMPLE_RATE: u32 = 1;

pub const USER_AGENT_PREFIX: &str = concat!("libhoney-rust/", env!("CARGO_PKG_VERSION"));

pub const TEAM_HEADER: &str = "X-Honeycomb-Team";

pub const BATCH_PATH_SEGMENT: &str = "batch";

pub const API_VERSION_SEGMENT: &str = "1";

// Idle pooled connections are closed before typical load balancer idle cutoffs.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(270);

pub const TCP_KEEPALIVE: Duration = Duration::from_secs(120);

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;
use std::time::Duration;

use crate::constants;
use crate::errors::TransmissionError;

/// Which transmission backs a [`Client`](crate::client::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransmissionKind {
    /// Batches and ships events over HTTP.
    #[default]
    Base,
    /// Records events in memory; for tests of code that emits events.
    Mock,
    /// Writes one JSON line per event to stdout.
    Console,
    /// Discards everything.
    Null,
}

impl FromStr for TransmissionKind {
    type Err = TransmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "mock" => Ok(Self::Mock),
            "console" => Ok(Self::Console),
            "null" => Ok(Self::Null),
            other => Err(TransmissionError::InvalidConfig(format!(
                "unknown transmission '{other}'. Must be one of: base, mock, console, null"
            ))),
        }
    }
}

/// Tuning for the batching engine. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionConfig {
    /// Queue length at which a batch is sent immediately.
    pub batch_size_trigger: usize,
    /// Longest time a lone event waits before its batch is sent.
    pub batch_time_trigger: Duration,
    pub max_concurrent_batches: usize,
    /// Events queued beyond this are dropped with a `queue overflow` outcome.
    pub pending_work_capacity: usize,
    /// Per-request deadline.
    pub timeout: Duration,
    /// Appended to the `User-Agent` header after trimming.
    pub user_agent_addition: String,
    /// HTTP or HTTPS proxy URL for all batch requests.
    pub proxy: Option<String>,
    pub max_event_size_bytes: usize,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            batch_size_trigger: constants::DEFAULT_BATCH_SIZE_TRIGGER,
            batch_time_trigger: constants::DEFAULT_BATCH_TIME_TRIGGER,
            max_concurrent_batches: constants::DEFAULT_MAX_CONCURRENT_BATCHES,
            pending_work_capacity: constants::DEFAULT_PENDING_WORK_CAPACITY,
            timeout: constants::DEFAULT_TIMEOUT,
            user_agent_addition: String::new(),
            proxy: None,
            max_event_size_bytes: constants::DEFAULT_MAX_EVENT_SIZE_BYTES,
        }
    }
}

impl TransmissionConfig {
    pub fn validate(&self) -> Result<(), TransmissionError> {
        if self.batch_size_trigger == 0 {
            return Err(TransmissionError::InvalidConfig(
                "batch_size_trigger must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_batches == 0 {
            return Err(TransmissionError::InvalidConfig(
                "max_concurrent_batches must be greater than 0".to_string(),
            ));
        }
        if self.pending_work_capacity == 0 {
            return Err(TransmissionError::InvalidConfig(
                "pending_work_capacity must be greater than 0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(TransmissionError::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_event_size_bytes == 0 {
            return Err(TransmissionError::InvalidConfig(
                "max_event_size_bytes must be greater than 0".to_string(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.trim().is_empty() {
                return Err(TransmissionError::InvalidConfig(
                    "proxy cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The full `User-Agent` value: the library identifier, then the trimmed addition if any.
    #[must_use]
    pub fn user_agent(&self) -> String {
        let addition = self.user_agent_addition.trim();
        if addition.is_empty() {
            constants::USER_AGENT_PREFIX.to_string()
        } else {
            format!("{} {}", constants::USER_AGENT_PREFIX, addition)
        }
    }
}

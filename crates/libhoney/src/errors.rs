// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised by the transmission layer itself. Per-event failures never use this type; they
/// are reported through [`OutcomeError`] instead.
#[derive(Debug, thiserror::Error)]
pub enum TransmissionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No tokio runtime available to drive transmission")]
    NoRuntime,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Flush superseded by a later flush call")]
    FlushSuperseded,

    #[error("Flush did not complete before the deadline")]
    FlushTimeout,
}

/// Why a single event did not make it, or was refused by the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutcomeError {
    #[error("event dropped due to sampling")]
    Sampled,

    #[error("queue overflow")]
    QueueOverflow,

    #[error("failed to encode event: {0}")]
    Encode(#[from] EncodeError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected response status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    #[error("event rejected: {0}")]
    Rejected(String),

    #[error("no response entry for event")]
    MissingResponse,

    #[error("invalid batch url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("event exceeds max event size of {max} bytes ({size} bytes)")]
    TooLarge { size: usize, max: usize },
}

/// Reasons [`Event::validate`](crate::event::Event::validate) refuses an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("api host must be a non-empty string")]
    EmptyApiHost,

    #[error("write key must be a non-empty string")]
    EmptyWriteKey,

    #[error("dataset must be a non-empty string")]
    EmptyDataset,

    #[error("sample rate must be at least 1")]
    InvalidSampleRate,
}

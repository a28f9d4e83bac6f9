// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sends one encoded batch and maps the server's answer back onto the batch's events.
//!
//! The batch endpoint answers a successful POST with a JSON array aligned with the request array:
//! ```json
//! [{"status": 202}, {"status": 400, "error": "unknown field type"}]
//! ```
//! Any other answer, a transport failure or a timeout is applied to every event that was in the
//! request. Events that failed to encode keep their own error. Nothing is retried here.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::aggregator::{Batch, EncodedBatch};
use crate::config::TransmissionConfig;
use crate::constants::TEAM_HEADER;
use crate::errors::{OutcomeError, TransmissionError};
use crate::http::{batch_url, build_client};
use crate::response::Outcome;

/// Performs the network exchange for one batch.
#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Returns exactly one outcome per event in `batch`, in batch order.
    async fn send(&self, batch: Batch, encoded: EncodedBatch) -> Vec<Outcome>;
}

#[derive(Debug, Deserialize)]
struct BatchResponseEntry {
    status: u16,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(config: &TransmissionConfig) -> Result<Self, TransmissionError> {
        Ok(Self {
            client: build_client(config)?,
            user_agent: config.user_agent(),
            timeout: config.timeout,
        })
    }

    fn headers(&self, write_key: &str) -> Result<HeaderMap, OutcomeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            TEAM_HEADER,
            HeaderValue::from_str(write_key)
                .map_err(|e| OutcomeError::Transport(format!("invalid write key header: {e}")))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| OutcomeError::Transport(format!("invalid user agent header: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post(
        &self,
        batch: &Batch,
        body: Vec<u8>,
    ) -> Result<Vec<BatchResponseEntry>, (Option<u16>, OutcomeError)> {
        let url = batch_url(&batch.key.api_host, &batch.key.dataset).map_err(|e| (None, e))?;
        let headers = self.headers(&batch.key.write_key).map_err(|e| (None, e))?;

        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let status = e.status().map(|s| s.as_u16());
                if e.is_timeout() {
                    (status, OutcomeError::Timeout)
                } else {
                    (status, OutcomeError::Transport(e.to_string()))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err((
                Some(status.as_u16()),
                OutcomeError::Status {
                    status: status.as_u16(),
                    body,
                },
            ));
        }

        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                (Some(status.as_u16()), OutcomeError::Timeout)
            } else {
                (Some(status.as_u16()), OutcomeError::Transport(e.to_string()))
            }
        })?;
        serde_json::from_str(&text).map_err(|e| {
            (
                Some(status.as_u16()),
                OutcomeError::InvalidResponse(e.to_string()),
            )
        })
    }
}

#[async_trait]
impl BatchSender for HttpDispatcher {
    async fn send(&self, batch: Batch, encoded: EncodedBatch) -> Vec<Outcome> {
        let EncodedBatch {
            body,
            num_encoded,
            encode_errors,
        } = encoded;

        if num_encoded == 0 {
            debug!(
                "Skipping request to {}: no event in the batch could be encoded",
                batch.key.dataset
            );
            return encode_error_outcomes(batch, encode_errors);
        }

        debug!(
            "Sending batch of {num_encoded} events to {}",
            batch.key.dataset
        );
        let start = Instant::now();
        let result = self.post(&batch, body).await;
        let duration = start.elapsed();

        match result {
            Ok(entries) => {
                if entries.len() != num_encoded {
                    warn!(
                        "Batch response for {} has {} entries, expected {num_encoded}",
                        batch.key.dataset,
                        entries.len()
                    );
                }
                map_entries(batch, encode_errors, entries, duration)
            }
            Err((status_code, err)) => {
                error!(
                    "Failed to send batch of {num_encoded} events to {} after {} ms: {err}",
                    batch.key.dataset,
                    duration.as_millis()
                );
                batch
                    .events
                    .into_iter()
                    .zip(encode_errors)
                    .map(|(event, encode_error)| match encode_error {
                        Some(e) => Outcome {
                            status_code: None,
                            duration: Some(duration),
                            metadata: event.into_metadata(),
                            error: Some(e.into()),
                        },
                        None => Outcome {
                            status_code,
                            duration: Some(duration),
                            metadata: event.into_metadata(),
                            error: Some(err.clone()),
                        },
                    })
                    .collect()
            }
        }
    }
}

/// Outcomes for a batch that never went out because nothing in it encoded.
pub(crate) fn encode_error_outcomes(
    batch: Batch,
    encode_errors: Vec<Option<crate::errors::EncodeError>>,
) -> Vec<Outcome> {
    batch
        .events
        .into_iter()
        .zip(encode_errors)
        .map(|(event, encode_error)| Outcome {
            status_code: None,
            duration: None,
            metadata: event.into_metadata(),
            error: encode_error.map(OutcomeError::from),
        })
        .collect()
}

fn map_entries(
    batch: Batch,
    encode_errors: Vec<Option<crate::errors::EncodeError>>,
    entries: Vec<BatchResponseEntry>,
    duration: Duration,
) -> Vec<Outcome> {
    let mut entries = entries.into_iter();
    batch
        .events
        .into_iter()
        .zip(encode_errors)
        .map(|(event, encode_error)| {
            if let Some(e) = encode_error {
                return Outcome {
                    status_code: None,
                    duration: Some(duration),
                    metadata: event.into_metadata(),
                    error: Some(e.into()),
                };
            }
            match entries.next() {
                Some(entry) => Outcome {
                    status_code: Some(entry.status),
                    duration: Some(duration),
                    metadata: event.into_metadata(),
                    error: entry.error.map(OutcomeError::Rejected),
                },
                None => Outcome {
                    status_code: None,
                    duration: Some(duration),
                    metadata: event.into_metadata(),
                    error: Some(OutcomeError::MissingResponse),
                },
            }
        })
        .collect()
}

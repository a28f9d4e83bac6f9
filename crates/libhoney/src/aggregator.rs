// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Groups a drained working set into one batch per destination and encodes each batch.
//!
//! # Output Format
//!
//! Each batch body is a JSON array of the events that encoded successfully, in queue order:
//! ```json
//! [
//!   {"time": "2024-01-01T00:00:00Z", "samplerate": 1, "data": {"a": 1}},
//!   {"time": "2024-01-01T00:00:01Z", "samplerate": 1, "data": {"a": 2}}
//! ]
//! ```

use hashbrown::HashMap;
use tracing::debug;

use crate::encoder::Encoder;
use crate::errors::EncodeError;
use crate::event::ValidatedEvent;

/// The destination a batch is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub api_host: String,
    pub write_key: String,
    pub dataset: String,
}

impl From<&ValidatedEvent> for BatchKey {
    fn from(event: &ValidatedEvent) -> Self {
        Self {
            api_host: event.api_host().to_string(),
            write_key: event.write_key().to_string(),
            dataset: event.dataset().to_string(),
        }
    }
}

/// Same-destination events, in the order they were queued.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub key: BatchKey,
    pub events: Vec<ValidatedEvent>,
}

impl Batch {
    /// Encodes every event independently. Failures are recorded per event in `encode_errors`
    /// (aligned with `events`) and left out of the body.
    #[must_use]
    pub fn encode(&self, encoder: &Encoder) -> EncodedBatch {
        let mut body = Vec::with_capacity(2 + self.events.len() * 64);
        let mut encode_errors = Vec::with_capacity(self.events.len());
        let mut num_encoded = 0;

        body.push(b'[');
        for event in &self.events {
            match encoder.encode(event) {
                Ok(encoded) => {
                    if num_encoded > 0 {
                        body.push(b',');
                    }
                    body.extend_from_slice(&encoded);
                    num_encoded += 1;
                    encode_errors.push(None);
                }
                Err(e) => {
                    debug!("Dropping event from batch for {}: {e}", self.key.dataset);
                    encode_errors.push(Some(e));
                }
            }
        }
        body.push(b']');

        EncodedBatch {
            body,
            num_encoded,
            encode_errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    /// JSON array of the successfully encoded events.
    pub body: Vec<u8>,
    pub num_encoded: usize,
    /// One entry per batch event; `Some` for events excluded from `body`.
    pub encode_errors: Vec<Option<EncodeError>>,
}

/// Partitions events by destination, keeping first-seen destination order.
#[derive(Debug, Default)]
pub struct BatchAggregator {
    batches: Vec<Batch>,
}

impl BatchAggregator {
    #[must_use]
    pub fn new(events: Vec<ValidatedEvent>) -> Self {
        let mut index: HashMap<BatchKey, usize> = HashMap::new();
        let mut batches: Vec<Batch> = Vec::new();

        for event in events {
            let key = BatchKey::from(&event);
            match index.get(&key) {
                Some(&i) => batches[i].events.push(event),
                None => {
                    index.insert(key.clone(), batches.len());
                    batches.push(Batch {
                        key,
                        events: vec![event],
                    });
                }
            }
        }

        Self { batches }
    }

    #[must_use]
    pub fn into_batches(self) -> Vec<Batch> {
        self.batches
    }
}

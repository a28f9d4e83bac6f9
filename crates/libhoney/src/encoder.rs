// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire encoding of single events.
//!
//! Each event is encoded on its own so that one bad event never poisons the rest of its batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::EncodeError;
use crate::event::ValidatedEvent;

/// The JSON object the batch endpoint expects for every event.
#[derive(Debug, Serialize)]
pub struct WireEvent<'a> {
    pub time: &'a DateTime<Utc>,
    pub samplerate: u32,
    pub data: &'a Map<String, Value>,
}

impl<'a> From<&'a ValidatedEvent> for WireEvent<'a> {
    fn from(event: &'a ValidatedEvent) -> Self {
        Self {
            time: event.timestamp(),
            samplerate: event.sample_rate(),
            data: event.data(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    max_event_size_bytes: usize,
}

impl Encoder {
    #[must_use]
    pub fn new(max_event_size_bytes: usize) -> Self {
        Self {
            max_event_size_bytes,
        }
    }

    pub fn encode(&self, event: &ValidatedEvent) -> Result<Vec<u8>, EncodeError> {
        let encoded = serde_json::to_vec(&WireEvent::from(event))
            .map_err(|e| EncodeError::Serialize(e.to_string()))?;
        if encoded.len() > self.max_event_size_bytes {
            return Err(EncodeError::TooLarge {
                size: encoded.len(),
                max: self.max_event_size_bytes,
            });
        }
        Ok(encoded)
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer-facing events and their validated, transmission-ready form.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::constants::DEFAULT_SAMPLE_RATE;
use crate::errors::ValidationError;

/// A telemetry record as assembled by the application.
///
/// `metadata` is never sent; it comes back untouched on the event's
/// [`Outcome`](crate::response::Outcome) so callers can correlate results.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub data: Map<String, Value>,
    pub api_host: String,
    pub write_key: String,
    pub dataset: String,
    pub sample_rate: u32,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            data: Map::new(),
            api_host: String::new(),
            write_key: String::new(),
            dataset: String::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            timestamp: None,
            metadata: None,
        }
    }
}

impl Event {
    #[must_use]
    pub fn new(
        api_host: impl Into<String>,
        write_key: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            api_host: api_host.into(),
            write_key: write_key.into(),
            dataset: dataset.into(),
            ..Default::default()
        }
    }

    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn add<I, K, V>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in fields {
            self.add_field(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<Value>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Checks the routing fields and freezes the event. A missing timestamp becomes "now".
    pub fn validate(self) -> Result<ValidatedEvent, ValidationError> {
        if self.api_host.trim().is_empty() {
            return Err(ValidationError::EmptyApiHost);
        }
        if self.write_key.trim().is_empty() {
            return Err(ValidationError::EmptyWriteKey);
        }
        if self.dataset.trim().is_empty() {
            return Err(ValidationError::EmptyDataset);
        }
        if self.sample_rate == 0 {
            return Err(ValidationError::InvalidSampleRate);
        }

        Ok(ValidatedEvent {
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            api_host: self.api_host,
            write_key: self.write_key,
            dataset: self.dataset,
            data: self.data,
            sample_rate: self.sample_rate,
            metadata: self.metadata,
        })
    }
}

/// An immutable, fully-resolved event. Only [`Event::validate`] creates one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvent {
    timestamp: DateTime<Utc>,
    api_host: String,
    write_key: String,
    dataset: String,
    data: Map<String, Value>,
    sample_rate: u32,
    metadata: Option<Value>,
}

impl ValidatedEvent {
    #[must_use]
    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    #[must_use]
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    #[must_use]
    pub fn write_key(&self) -> &str {
        &self.write_key
    }

    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    #[must_use]
    pub fn into_metadata(self) -> Option<Value> {
        self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_event() -> Event {
        Event::new("https://api.example.com", "key", "dataset")
    }

    #[test]
    fn test_validate_fills_missing_timestamp() {
        let before = Utc::now();
        let validated = base_event().validate().expect("valid event");
        assert!(*validated.timestamp() >= before);
        assert_eq!(validated.sample_rate(), 1);
    }

    #[test]
    fn test_validate_keeps_explicit_fields() {
        let ts = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let mut event = base_event()
            .with_sample_rate(10)
            .with_timestamp(ts)
            .with_metadata(json!({"id": 7}));
        event.add_field("a", 1).add([("b", "two")]);

        let validated = event.validate().expect("valid event");
        assert_eq!(*validated.timestamp(), ts);
        assert_eq!(validated.sample_rate(), 10);
        assert_eq!(validated.metadata(), Some(&json!({"id": 7})));
        assert_eq!(validated.data().get("a"), Some(&json!(1)));
        assert_eq!(validated.data().get("b"), Some(&json!("two")));
    }

    #[test]
    fn test_validate_rejects_missing_routing() {
        let mut event = base_event();
        event.api_host = "  ".to_string();
        assert_eq!(event.validate(), Err(ValidationError::EmptyApiHost));

        let mut event = base_event();
        event.write_key.clear();
        assert_eq!(event.validate(), Err(ValidationError::EmptyWriteKey));

        let mut event = base_event();
        event.dataset.clear();
        assert_eq!(event.validate(), Err(ValidationError::EmptyDataset));

        assert_eq!(
            base_event().with_sample_rate(0).validate(),
            Err(ValidationError::InvalidSampleRate)
        );
    }

    #[test]
    fn test_validate_rejects_blank_routing() {
        let mut event = base_event();
        event.write_key = " \t".to_string();
        assert_eq!(event.validate(), Err(ValidationError::EmptyWriteKey));

        let mut event = base_event();
        event.dataset = "   ".to_string();
        assert_eq!(event.validate(), Err(ValidationError::EmptyDataset));
    }
}

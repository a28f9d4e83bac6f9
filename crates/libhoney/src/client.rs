// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The application-facing entry point: destination defaults, validation, and a transmission.

use std::env;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::config::{TransmissionConfig, TransmissionKind};
use crate::constants::{DEFAULT_API_HOST, DEFAULT_MAX_RESPONSE_QUEUE_SIZE, DEFAULT_SAMPLE_RATE};
use crate::errors::TransmissionError;
use crate::event::Event;
use crate::response::{response_channel, NoopSink, Outcome, ResponseSink};
use crate::transmission::Transmission;

/// Client settings. Destination fields are defaults copied onto every [`Client::new_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_host: String,
    pub write_key: Option<String>,
    pub dataset: Option<String>,
    pub sample_rate: u32,
    /// When set, events are discarded without validation, transmission or outcomes.
    pub disabled: bool,
    pub transmission: TransmissionKind,
    pub transmission_config: TransmissionConfig,
    /// Capacity of the outcome queue returned by [`Client::with_responses`].
    pub max_response_queue_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            write_key: None,
            dataset: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            disabled: false,
            transmission: TransmissionKind::default(),
            transmission_config: TransmissionConfig::default(),
            max_response_queue_size: DEFAULT_MAX_RESPONSE_QUEUE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, TransmissionError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TransmissionError> {
        let defaults = Self::default();

        let api_host = lookup("HONEYCOMB_API_HOST").unwrap_or(defaults.api_host);
        let write_key = lookup("HONEYCOMB_API_KEY").or_else(|| lookup("HONEYCOMB_WRITE_KEY"));
        let dataset = lookup("HONEYCOMB_DATASET");
        let sample_rate = match lookup("HONEYCOMB_SAMPLE_RATE") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                TransmissionError::InvalidConfig(format!(
                    "HONEYCOMB_SAMPLE_RATE '{raw}' is not a positive integer: {e}"
                ))
            })?,
            None => defaults.sample_rate,
        };
        let disabled = lookup("HONEYCOMB_DISABLED")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);
        let transmission = match lookup("HONEYCOMB_TRANSMISSION") {
            Some(raw) => raw.parse()?,
            None => defaults.transmission,
        };
        let proxy = lookup("HTTPS_PROXY").or_else(|| lookup("HTTP_PROXY"));

        let config = Self {
            api_host,
            write_key,
            dataset,
            sample_rate,
            disabled,
            transmission,
            transmission_config: TransmissionConfig {
                proxy,
                ..defaults.transmission_config
            },
            max_response_queue_size: defaults.max_response_queue_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TransmissionError> {
        if self.api_host.trim().is_empty() {
            return Err(TransmissionError::InvalidConfig(
                "api_host cannot be empty".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(TransmissionError::InvalidConfig(
                "sample_rate must be at least 1".to_string(),
            ));
        }
        if self.max_response_queue_size == 0 {
            return Err(TransmissionError::InvalidConfig(
                "max_response_queue_size must be greater than 0".to_string(),
            ));
        }
        self.transmission_config.validate()
    }
}

#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    // None when disabled.
    transmission: Option<Transmission>,
}

impl Client {
    /// A client whose outcomes are discarded.
    pub fn new(config: ClientConfig) -> Result<Self, TransmissionError> {
        Self::with_sink(config, Arc::new(NoopSink))
    }

    /// A client whose outcomes land in a bounded queue of `max_response_queue_size` entries.
    pub fn with_responses(
        config: ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<Outcome>), TransmissionError> {
        config.validate()?;
        let (queue, rx) = response_channel(config.max_response_queue_size);
        Ok((Self::with_sink(config, Arc::new(queue))?, rx))
    }

    pub fn with_sink(
        config: ClientConfig,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Self, TransmissionError> {
        config.validate()?;
        let transmission = if config.disabled {
            debug!("Client disabled, events will be discarded");
            None
        } else {
            Some(Transmission::new(
                config.transmission,
                config.transmission_config.clone(),
                sink,
            )?)
        };
        Ok(Self {
            config,
            transmission,
        })
    }

    /// An empty event addressed with this client's defaults.
    #[must_use]
    pub fn new_event(&self) -> Event {
        Event {
            api_host: self.config.api_host.clone(),
            write_key: self.config.write_key.clone().unwrap_or_default(),
            dataset: self.config.dataset.clone().unwrap_or_default(),
            sample_rate: self.config.sample_rate,
            ..Default::default()
        }
    }

    /// Validates, samples and queues the event. Invalid events are logged and discarded.
    pub fn send_event(&self, event: Event) {
        let Some(transmission) = &self.transmission else {
            return;
        };
        match event.validate() {
            Ok(validated) => {
                transmission.send_event(validated);
            }
            Err(e) => error!("Dropping invalid event: {e}"),
        }
    }

    /// Like [`Client::send_event`] for events the caller already sampled.
    pub fn send_presampled_event(&self, event: Event) {
        let Some(transmission) = &self.transmission else {
            return;
        };
        match event.validate() {
            Ok(validated) => {
                transmission.send_presampled_event(validated);
            }
            Err(e) => error!("Dropping invalid event: {e}"),
        }
    }

    pub async fn flush(&self) -> Result<(), TransmissionError> {
        match &self.transmission {
            Some(transmission) => transmission.flush().await,
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn transmission(&self) -> Option<&Transmission> {
        self.transmission.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

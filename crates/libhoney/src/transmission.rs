// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The closed set of transmissions a client can be built on.
//!
//! All variants share one surface: `send_event`, `send_presampled_event` and `flush`. Only
//! [`Transmission::Base`] talks to the network; the others exist for tests and local debugging.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use crate::config::{TransmissionConfig, TransmissionKind};
use crate::encoder::WireEvent;
use crate::engine::{EnqueueResult, TransmissionEngine};
use crate::errors::TransmissionError;
use crate::event::ValidatedEvent;
use crate::response::ResponseSink;

#[derive(Debug, Clone)]
pub enum Transmission {
    Base(TransmissionEngine),
    Mock(MockTransmission),
    Console(ConsoleTransmission),
    Null,
}

impl Transmission {
    pub fn new(
        kind: TransmissionKind,
        config: TransmissionConfig,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Self, TransmissionError> {
        Ok(match kind {
            TransmissionKind::Base => Self::Base(TransmissionEngine::new(config, sink)?),
            TransmissionKind::Mock => Self::Mock(MockTransmission::default()),
            TransmissionKind::Console => Self::Console(ConsoleTransmission),
            TransmissionKind::Null => Self::Null,
        })
    }

    #[must_use]
    pub fn kind(&self) -> TransmissionKind {
        match self {
            Self::Base(_) => TransmissionKind::Base,
            Self::Mock(_) => TransmissionKind::Mock,
            Self::Console(_) => TransmissionKind::Console,
            Self::Null => TransmissionKind::Null,
        }
    }

    pub fn send_event(&self, event: ValidatedEvent) -> EnqueueResult {
        match self {
            Self::Base(engine) => engine.send_event(event),
            Self::Mock(mock) => mock.record(event),
            Self::Console(console) => console.write(&event),
            Self::Null => EnqueueResult::Queued,
        }
    }

    pub fn send_presampled_event(&self, event: ValidatedEvent) -> EnqueueResult {
        match self {
            Self::Base(engine) => engine.send_presampled_event(event),
            Self::Mock(mock) => mock.record(event),
            Self::Console(console) => console.write(&event),
            Self::Null => EnqueueResult::Queued,
        }
    }

    pub async fn flush(&self) -> Result<(), TransmissionError> {
        match self {
            Self::Base(engine) => engine.flush().await,
            Self::Mock(_) | Self::Console(_) | Self::Null => Ok(()),
        }
    }
}

/// Keeps every event it is given, sampled or not.
#[derive(Debug, Clone, Default)]
pub struct MockTransmission {
    events: Arc<Mutex<Vec<ValidatedEvent>>>,
}

impl MockTransmission {
    fn record(&self, event: ValidatedEvent) -> EnqueueResult {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        EnqueueResult::Queued
    }

    #[must_use]
    pub fn events(&self) -> Vec<ValidatedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Writes each event to stdout as one JSON line, in wire form.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTransmission;

impl ConsoleTransmission {
    fn write(&self, event: &ValidatedEvent) -> EnqueueResult {
        let line = match serde_json::to_string(&WireEvent::from(event)) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode event for console: {e}");
                return EnqueueResult::Queued;
            }
        };
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}") {
            error!("Failed to write event to stdout: {e}");
        }
        EnqueueResult::Queued
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-event results and the sinks that receive them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::errors::OutcomeError;

/// The result of submitting one event. Exactly one is produced per submitted event.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status_code: Option<u16>,
    pub duration: Option<Duration>,
    pub metadata: Option<Value>,
    pub error: Option<OutcomeError>,
}

impl Outcome {
    /// An outcome for an event that never reached the network.
    #[must_use]
    pub fn dropped(metadata: Option<Value>, error: OutcomeError) -> Self {
        Self {
            status_code: None,
            duration: None,
            metadata,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Receives outcome records. Called from transmission tasks, possibly concurrently, once per
/// completed batch or per dropped event.
pub trait ResponseSink: Send + Sync {
    fn on_responses(&self, outcomes: Vec<Outcome>);
}

impl<F> ResponseSink for F
where
    F: Fn(Vec<Outcome>) + Send + Sync,
{
    fn on_responses(&self, outcomes: Vec<Outcome>) {
        self(outcomes);
    }
}

/// Discards every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ResponseSink for NoopSink {
    fn on_responses(&self, _outcomes: Vec<Outcome>) {}
}

/// A bounded outcome queue. When the consumer falls behind, new outcomes are dropped and counted;
/// outcomes already queued are kept.
#[derive(Debug)]
pub struct ResponseQueue {
    tx: mpsc::Sender<Outcome>,
    dropped: AtomicU64,
}

impl ResponseQueue {
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ResponseSink for ResponseQueue {
    fn on_responses(&self, outcomes: Vec<Outcome>) {
        let mut dropped = 0;
        for outcome in outcomes {
            // A closed receiver means nobody is listening anymore; count those as dropped too.
            if self.tx.try_send(outcome).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            let total = self.dropped.fetch_add(dropped, Ordering::Relaxed) + dropped;
            warn!("Response queue full, dropped {dropped} outcomes ({total} total)");
        }
    }
}

/// Creates a bounded outcome queue holding at most `capacity` undelivered outcomes.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn response_channel(capacity: usize) -> (ResponseQueue, mpsc::Receiver<Outcome>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        ResponseQueue {
            tx,
            dropped: AtomicU64::new(0),
        },
        rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_sink_receives_outcomes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = move |outcomes: Vec<Outcome>| seen_clone.lock().unwrap().extend(outcomes);

        sink.on_responses(vec![Outcome::dropped(
            Some(json!(1)),
            OutcomeError::QueueOverflow,
        )]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].metadata, Some(json!(1)));
        assert!(!seen[0].is_success());
    }

    #[tokio::test]
    async fn test_response_queue_drops_newest_when_full() {
        let (queue, mut rx) = response_channel(2);
        let outcomes = (0..5)
            .map(|i| Outcome::dropped(Some(json!(i)), OutcomeError::Sampled))
            .collect();

        queue.on_responses(outcomes);

        assert_eq!(queue.dropped(), 3);
        assert_eq!(rx.recv().await.unwrap().metadata, Some(json!(0)));
        assert_eq!(rx.recv().await.unwrap().metadata, Some(json!(1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_response_queue_counts_outcomes_after_receiver_dropped() {
        let (queue, rx) = response_channel(4);
        drop(rx);
        queue.on_responses(vec![Outcome::dropped(None, OutcomeError::Sampled)]);
        assert_eq!(queue.dropped(), 1);
    }
}

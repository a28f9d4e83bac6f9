// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The batching transmission engine.
//!
//! ```text
//!   send_event ──> sampling ──> bounded queue ──┬── size trigger ──┐
//!                                                └── time trigger ──┤
//!                                                                   v
//!                                          drain (≤ max_concurrent_batches in flight)
//!                                                                   │
//!                                          BatchAggregator ──> BatchSender ──> ResponseSink
//! ```
//!
//! # Queue states
//!
//! - **Idle**: queue empty, nothing in flight, no timer
//! - **Accumulating**: events queued below the size trigger, timer armed
//! - **Draining**: at least one batch in flight
//!
//! Queue bookkeeping happens synchronously under one lock that is never held across an await.
//! Network I/O and the batch timer run as tasks on the tokio runtime the engine was created on.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::aggregator::BatchAggregator;
use crate::config::TransmissionConfig;
use crate::dispatcher::{encode_error_outcomes, BatchSender, HttpDispatcher};
use crate::encoder::Encoder;
use crate::errors::{OutcomeError, TransmissionError};
use crate::event::ValidatedEvent;
use crate::response::{Outcome, ResponseSink};
use crate::sampler::{RandomSource, Sampler, ThreadRandom};

/// What happened to an event handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Queued,
    /// Dropped by sampling; a `Sampled` outcome was delivered.
    Sampled,
    /// Dropped because the queue was full; a `QueueOverflow` outcome was delivered.
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Accumulating,
    Draining,
}

struct SendTimer {
    id: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct State {
    queue: VecDeque<ValidatedEvent>,
    in_flight: usize,
    send_timer: Option<SendTimer>,
    next_timer_id: u64,
    flush_waiter: Option<oneshot::Sender<()>>,
}

impl State {
    fn cancel_send_timer(&mut self) {
        if let Some(timer) = self.send_timer.take() {
            timer.handle.abort();
        }
    }

    fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }
}

struct Inner {
    config: TransmissionConfig,
    encoder: Encoder,
    sampler: Sampler,
    sender: Arc<dyn BatchSender>,
    sink: Arc<dyn ResponseSink>,
    runtime: Handle,
    state: Mutex<State>,
}

/// Cloneable handle to one engine; clones share the queue.
#[derive(Clone)]
pub struct TransmissionEngine {
    inner: Arc<Inner>,
}

impl TransmissionEngine {
    /// Creates an engine that ships batches over HTTP and samples with the thread-local RNG.
    ///
    /// Must be called from within a tokio runtime; batch and timer tasks are spawned on it.
    pub fn new(
        config: TransmissionConfig,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Self, TransmissionError> {
        config.validate()?;
        let sender = Arc::new(HttpDispatcher::new(&config)?);
        Self::from_parts(config, sink, sender, Box::new(ThreadRandom))
    }

    pub fn from_parts(
        config: TransmissionConfig,
        sink: Arc<dyn ResponseSink>,
        sender: Arc<dyn BatchSender>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, TransmissionError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| TransmissionError::NoRuntime)?;

        Ok(Self {
            inner: Arc::new(Inner {
                encoder: Encoder::new(config.max_event_size_bytes),
                config,
                sampler: Sampler::new(random),
                sender,
                sink,
                runtime,
                state: Mutex::new(State::default()),
            }),
        })
    }

    /// Samples the event by its sample rate, then queues it.
    pub fn send_event(&self, event: ValidatedEvent) -> EnqueueResult {
        if !self.inner.sampler.should_send(&event) {
            self.inner.sink.on_responses(vec![Outcome::dropped(
                event.into_metadata(),
                OutcomeError::Sampled,
            )]);
            return EnqueueResult::Sampled;
        }
        self.send_presampled_event(event)
    }

    /// Queues an event the caller has already sampled.
    pub fn send_presampled_event(&self, event: ValidatedEvent) -> EnqueueResult {
        let capacity = self.inner.config.pending_work_capacity;
        let mut state = self.inner.lock_state();

        if state.queue.len() >= capacity {
            drop(state);
            warn!("Dropping event: queue overflow (capacity {capacity})");
            self.inner.sink.on_responses(vec![Outcome::dropped(
                event.into_metadata(),
                OutcomeError::QueueOverflow,
            )]);
            return EnqueueResult::Overflow;
        }

        state.queue.push_back(event);
        let batch = if state.queue.len() >= self.inner.config.batch_size_trigger {
            self.inner.take_batch(&mut state)
        } else {
            self.inner.ensure_send_timer(&mut state);
            None
        };
        drop(state);

        if let Some(events) = batch {
            self.inner.spawn_batch(events);
        }
        EnqueueResult::Queued
    }

    /// Resolves once the queue is empty and no batch is in flight.
    ///
    /// Only one flush waits at a time: a later call takes over and the earlier one resolves with
    /// [`TransmissionError::FlushSuperseded`].
    pub async fn flush(&self) -> Result<(), TransmissionError> {
        let rx = {
            let mut state = self.inner.lock_state();
            if state.is_drained() {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            if state.flush_waiter.replace(tx).is_some() {
                debug!("Replacing pending flush");
            }
            rx
        };
        rx.await.map_err(|_| TransmissionError::FlushSuperseded)
    }

    pub async fn flush_timeout(&self, deadline: Duration) -> Result<(), TransmissionError> {
        tokio::time::timeout(deadline, self.flush())
            .await
            .map_err(|_| TransmissionError::FlushTimeout)?
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.lock_state().in_flight
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        let state = self.inner.lock_state();
        if state.in_flight > 0 {
            EngineState::Draining
        } else if !state.queue.is_empty() {
            EngineState::Accumulating
        } else {
            EngineState::Idle
        }
    }

    #[must_use]
    pub fn config(&self) -> &TransmissionConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for TransmissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissionEngine")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes up to `batch_size_trigger` events off the front of the queue and reserves an
    /// in-flight slot for them. None when the concurrency limit is reached or the queue is empty.
    fn take_batch(&self, state: &mut State) -> Option<Vec<ValidatedEvent>> {
        if state.in_flight >= self.config.max_concurrent_batches || state.queue.is_empty() {
            return None;
        }

        state.cancel_send_timer();
        state.in_flight += 1;

        let take = state.queue.len().min(self.config.batch_size_trigger);
        let events: Vec<ValidatedEvent> = state.queue.drain(..take).collect();
        debug!(
            "Dispatching {take} events ({} in flight, {} still queued)",
            state.in_flight,
            state.queue.len()
        );
        Some(events)
    }

    /// Ships a batch taken by `take_batch` in a new task. Must not be called with the state lock
    /// held: a task dropped before its first poll releases its slot on the spot.
    fn spawn_batch(self: &Arc<Self>, events: Vec<ValidatedEvent>) {
        let in_flight = InFlightGuard {
            inner: Arc::clone(self),
        };
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let _in_flight = in_flight;
            inner.ship(events).await;
        });
    }

    async fn ship(&self, events: Vec<ValidatedEvent>) {
        for batch in BatchAggregator::new(events).into_batches() {
            let encoded = batch.encode(&self.encoder);
            let dataset = batch.key.dataset.clone();
            let outcomes = if encoded.num_encoded == 0 {
                encode_error_outcomes(batch, encoded.encode_errors)
            } else {
                self.sender.send(batch, encoded).await
            };
            let failed = outcomes.iter().filter(|o| !o.is_success()).count();
            if failed > 0 {
                debug!("{failed} of {} events for {dataset} failed", outcomes.len());
            }
            self.sink.on_responses(outcomes);
        }
    }

    fn finish_batch(self: &Arc<Self>) {
        let (batches, waiter) = {
            let mut state = self.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);

            let mut batches = Vec::new();
            while state.queue.len() >= self.config.batch_size_trigger {
                match self.take_batch(&mut state) {
                    Some(events) => batches.push(events),
                    None => break,
                }
            }

            let waiter = if !state.queue.is_empty() {
                self.ensure_send_timer(&mut state);
                None
            } else if state.in_flight == 0 {
                state.flush_waiter.take()
            } else {
                None
            };
            (batches, waiter)
        };

        for events in batches {
            self.spawn_batch(events);
        }

        if let Some(tx) = waiter {
            // The waiter may have given up (e.g. a flush deadline passed).
            let _ = tx.send(());
        }
    }

    fn ensure_send_timer(self: &Arc<Self>, state: &mut State) {
        if state.send_timer.is_some() {
            return;
        }

        let id = state.next_timer_id;
        state.next_timer_id = state.next_timer_id.wrapping_add(1);

        let inner = Arc::clone(self);
        let delay = self.config.batch_time_trigger;
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.on_send_timer(id);
        });
        state.send_timer = Some(SendTimer {
            id,
            handle: handle.abort_handle(),
        });
    }

    fn on_send_timer(self: &Arc<Self>, id: u64) {
        let batch = {
            let mut state = self.lock_state();
            // A timer canceled after it already woke up must not steal a newer timer's slot.
            if state.send_timer.as_ref().map(|t| t.id) != Some(id) {
                return;
            }
            state.send_timer = None;
            self.take_batch(&mut state)
        };
        if let Some(events) = batch {
            self.spawn_batch(events);
        }
    }
}

/// Releases the in-flight slot when a batch task ends, including when it panics or is dropped.
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.finish_batch();
    }
}

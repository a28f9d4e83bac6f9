// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client-side event transmission for the Honeycomb ingestion API.
//!
//! Events are sampled, queued in a bounded buffer, grouped into per-destination batches and
//! shipped over HTTP by a concurrency-limited engine. Every submitted event produces exactly one
//! [`Outcome`](response::Outcome) on the configured [`ResponseSink`](response::ResponseSink),
//! whether it was sent, rejected, dropped by sampling or dropped by backpressure.
//!
//! ```rust,ignore
//! use libhoney::client::{Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig {
//!     write_key: Some("my-key".to_string()),
//!     dataset: Some("my-service".to_string()),
//!     ..Default::default()
//! })?;
//!
//! let mut event = client.new_event();
//! event.add_field("duration_ms", 12.5);
//! client.send_event(event);
//!
//! client.flush().await?;
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod client;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod encoder;
pub mod engine;
pub mod errors;
pub mod event;
pub mod http;
pub mod response;
pub mod sampler;
pub mod transmission;

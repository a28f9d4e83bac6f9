// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction for batch requests.
//!
//! The client is built once per engine and shared by every batch:
//! - **Timeouts**: the configured per-request deadline
//! - **Connection pooling**: idle timeout and TCP keep-alive
//! - **Proxy support**: one proxy for both HTTP and HTTPS hosts
//!
//! A proxy URL that cannot be parsed is a configuration error; there is no silent fallback to a
//! direct connection.

use reqwest::Url;

use crate::config::TransmissionConfig;
use crate::constants::{
    API_VERSION_SEGMENT, BATCH_PATH_SEGMENT, POOL_IDLE_TIMEOUT, TCP_KEEPALIVE,
};
use crate::errors::{OutcomeError, TransmissionError};

pub fn build_client(config: &TransmissionConfig) -> Result<reqwest::Client, TransmissionError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
        .tcp_keepalive(Some(TCP_KEEPALIVE));

    if let Some(proxy_url) = &config.proxy {
        let proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| {
            TransmissionError::InvalidConfig(format!("invalid proxy '{proxy_url}': {e}"))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| TransmissionError::HttpClient(e.to_string()))
}

/// `{api_host}/1/batch/{dataset}`, with the dataset encoded as a single path segment.
pub fn batch_url(api_host: &str, dataset: &str) -> Result<Url, OutcomeError> {
    let mut url = Url::parse(api_host)
        .map_err(|e| OutcomeError::InvalidUrl(format!("{api_host}: {e}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| OutcomeError::InvalidUrl(format!("{api_host}: cannot be a base")))?;
        segments
            .pop_if_empty()
            .push(API_VERSION_SEGMENT)
            .push(BATCH_PATH_SEGMENT)
            .push(dataset);
    }
    Ok(url)
}

// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Callback Transport
//!
//! Thin reqwest-backed implementation of the `CallbackTransport` port.
//! Signature, payload shape, and the retry schedule live in the webhook
//! service; this type only moves bytes and reports the upstream status code.

use async_trait::async_trait;
use std::time::Duration;

use commerce_pipeline_domain::{CallbackTransport, PipelineError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed callback delivery.
pub struct HttpCallbackTransport {
    client: reqwest::Client,
}

impl HttpCallbackTransport {
    pub fn new() -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::internal(format!("cannot build http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackTransport for HttpCallbackTransport {
    async fn post(
        &self,
        url: &str,
        body: &[u8],
        headers: &[(String, String)],
    ) -> Result<u16, PipelineError> {
        let mut request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body.to_vec());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.send().await.map_err(|e| {
            PipelineError::provider_transient(format!("callback delivery to {} failed: {}", url, e))
        })?;
        Ok(response.status().as_u16())
    }
}

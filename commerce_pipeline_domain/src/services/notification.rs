// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Callback Notification Port
//!
//! Terminal job transitions optionally POST a payload to the job's callback
//! URL. The core owns the payload shape, the HMAC signature, and the retry
//! schedule; the actual HTTP delivery sits behind [`CallbackTransport`].
//!
//! A 2xx response means delivered; anything else is retried (3 attempts with
//! exponential backoff, driven by the application's webhook service).

use async_trait::async_trait;
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::entities::job::{JobResult, JobStatus};
use crate::value_objects::JobId;
use crate::PipelineError;

/// Header carrying the hex-encoded HMAC-SHA256 of the payload body.
pub const SIGNATURE_HEADER: &str = "X-Pipeline-Signature";

/// Payload POSTed to the callback URL on terminal transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallbackPayload {
    /// Serializes the payload to the exact bytes that get signed and sent.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Computes the hex-encoded HMAC-SHA256 signature of a payload body.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hex::encode(hmac::sign(&key, body).as_ref())
}

/// Verifies a signature produced by [`sign_payload`].
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    match hex::decode(signature_hex) {
        Ok(signature) => hmac::verify(&key, body, &signature).is_ok(),
        Err(_) => false,
    }
}

/// Delivery port. Implementations return the upstream HTTP status code and
/// reserve errors for transport-level failures (DNS, connect, timeout).
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: &[u8],
        headers: &[(String, String)],
    ) -> Result<u16, PipelineError>;
}

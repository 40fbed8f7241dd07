// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Webhook Service
//!
//! Signed, at-least-once callback delivery on terminal job transitions.
//! The payload is serialized once, HMAC-signed, and POSTed through the
//! transport port; non-2xx responses and transport failures are retried up
//! to three times with exponential backoff. Delivery failure is reported to
//! the caller but never fails the job; the job reached its terminal state
//! before the callback fires.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use commerce_pipeline_domain::services::notification::{
    sign_payload, CallbackPayload, CallbackTransport, SIGNATURE_HEADER,
};
use commerce_pipeline_domain::PipelineError;

const DELIVERY_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Signed callback delivery with bounded retry.
pub struct WebhookService {
    transport: Arc<dyn CallbackTransport>,
    secret: String,
}

impl WebhookService {
    pub fn new(transport: Arc<dyn CallbackTransport>, secret: impl Into<String>) -> Self {
        Self {
            transport,
            secret: secret.into(),
        }
    }

    /// Delivers `payload` to `url`. Returns whether a 2xx was observed
    /// within the retry budget.
    pub async fn notify(
        &self,
        url: &str,
        payload: &CallbackPayload,
    ) -> Result<bool, PipelineError> {
        let body = payload.to_bytes()?;
        let headers = vec![(
            SIGNATURE_HEADER.to_string(),
            sign_payload(&self.secret, &body),
        )];

        for attempt in 1..=DELIVERY_ATTEMPTS {
            match self.transport.post(url, &body, &headers).await {
                Ok(status) if (200..300).contains(&status) => {
                    info!(job = %payload.job_id, url, attempt, "callback delivered");
                    return Ok(true);
                }
                Ok(status) => {
                    warn!(job = %payload.job_id, url, attempt, status, "callback rejected");
                }
                Err(error) => {
                    warn!(job = %payload.job_id, url, attempt, error = %error, "callback transport failed");
                }
            }
            if attempt < DELIVERY_ATTEMPTS {
                tokio::time::sleep(INITIAL_BACKOFF * 2u32.pow(attempt - 1)).await;
            }
        }

        warn!(job = %payload.job_id, url, "callback delivery gave up");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use commerce_pipeline_domain::{JobId, JobStatus};
    use std::sync::Mutex;

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<u16, PipelineError>>>,
        requests: Mutex<Vec<(String, Vec<u8>, Vec<(String, String)>)>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<u16, PipelineError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CallbackTransport for ScriptedTransport {
        async fn post(
            &self,
            url: &str,
            body: &[u8],
            headers: &[(String, String)],
        ) -> Result<u16, PipelineError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.to_vec(), headers.to_vec()));
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn payload() -> CallbackPayload {
        CallbackPayload {
            job_id: JobId::new(),
            status: JobStatus::Completed,
            result: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_delivered_on_first_2xx() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(200)]));
        let service = WebhookService::new(transport.clone(), "secret");

        assert!(service.notify("https://cb", &payload()).await.unwrap());
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);

        // Signature header verifies against the body.
        let (_, body, headers) = &requests[0];
        let signature = &headers
            .iter()
            .find(|(name, _)| name == SIGNATURE_HEADER)
            .unwrap()
            .1;
        assert!(commerce_pipeline_domain::services::notification::verify_signature(
            "secret", body, signature
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_2xx() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(500),
            Err(PipelineError::provider_transient("connect refused")),
            Ok(204),
        ]));
        let service = WebhookService::new(transport.clone(), "secret");

        assert!(service.notify("https://cb", &payload()).await.unwrap());
        assert_eq!(transport.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(500), Ok(502), Ok(503)]));
        let service = WebhookService::new(transport.clone(), "secret");

        assert!(!service.notify("https://cb", &payload()).await.unwrap());
        assert_eq!(transport.requests.lock().unwrap().len(), 3);
    }
}

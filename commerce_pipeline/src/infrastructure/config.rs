// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Configuration
//!
//! Layered configuration via the `config` crate: built-in defaults, an
//! optional TOML file, then `CP_*` environment variables (double underscore
//! for nesting, e.g. `CP_QUEUE__POLL_INTERVAL_MS=250`).

use serde::Deserialize;
use std::path::PathBuf;

use crate::infrastructure::providers::ProviderMode;
use commerce_pipeline_domain::PipelineError;

/// Queue consumption tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Idle poll interval when the queue is empty.
    pub poll_interval_ms: u64,
    /// How often the retention sweep runs.
    pub retention_sweep_interval_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            retention_sweep_interval_secs: 300,
        }
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    /// HMAC shared secret for payload signatures.
    pub secret: String,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            secret: "staging-webhook-secret".to_string(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Root directory for per-job sandboxes.
    pub work_root: PathBuf,
    /// Root directory for the local blob store.
    pub blob_root: PathBuf,
    /// Public base URL prefixed onto blob keys.
    pub blob_base_url: String,
    /// Whether to retain the sandbox of failed/cancelled jobs for debugging.
    pub retain_failed_sandboxes: bool,
    /// Which provider set to register at startup. `production` requires a
    /// build with a linked real-provider bundle.
    pub provider_mode: ProviderMode,
    pub queue: QueueSettings,
    pub webhook: WebhookSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://commerce_pipeline.db".to_string(),
            work_root: PathBuf::from("./work"),
            blob_root: PathBuf::from("./blobs"),
            blob_base_url: "https://storage.local".to_string(),
            retain_failed_sandboxes: true,
            provider_mode: ProviderMode::default(),
            queue: QueueSettings::default(),
            webhook: WebhookSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from defaults, an optional file, and `CP_*`
    /// environment variables.
    pub fn load(config_file: Option<&str>) -> Result<Self, PipelineError> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(
                config::File::with_name("commerce_pipeline").required(false),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CP").separator("__"),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::validation(format!("bad configuration: {}", e)))?;
        let mut app: AppConfig = settings
            .try_deserialize()
            .map_err(|e| PipelineError::validation(format!("bad configuration: {}", e)))?;
        if app.database_url.is_empty() {
            app.database_url = AppConfig::default().database_url;
        }
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = AppConfig::default();
        assert!(config.database_url.starts_with("sqlite://"));
        assert!(config.queue.poll_interval_ms > 0);
        assert!(!config.webhook.secret.is_empty());
        assert_eq!(config.provider_mode, ProviderMode::Staging);
    }
}

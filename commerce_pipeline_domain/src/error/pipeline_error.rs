// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! Hierarchical error type for the video commerce pipeline domain. Errors are
//! organized by the way the runtime reacts to them, not by the component that
//! raised them:
//!
//! - **Validation / Precondition**: rejected before or during execution;
//!   surfaced synchronously to the caller (validation) or as a job failure
//!   (precondition in strict mode).
//! - **Provider errors**: transient failures (429, 5xx, timeouts) are retried
//!   inside providers; permanent failures (auth, quota, invalid content)
//!   propagate as step failures.
//! - **Resource errors**: filesystem, blob store, or database unavailable.
//!   The job is failed and credits refunded.
//! - **Cancellation**: cooperative cancellation observed at a suspension
//!   point. The job is marked cancelled and credits refunded.
//! - **Internal**: assertion violations and bugs; logged with full context.
//!
//! The executor never retries; recovery happens inside providers (bounded
//! retry with backoff) or per-item inside a parallel fan-out. The job
//! lifecycle layer does the refund/callback bookkeeping.

use thiserror::Error;

/// Domain-specific errors for the video commerce pipeline.
///
/// Each variant carries a single human-readable sentence. The full causal
/// chain belongs in logs; the `Job` row's `error` column and the callback
/// payload carry only this message.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Precondition not satisfied: {0}")]
    Precondition(String),

    #[error("Provider error (transient): {0}")]
    ProviderTransient(String),

    #[error("Provider error: {0}")]
    ProviderPermanent(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Processor not found: {0}")]
    ProcessorNotFound(String),

    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Creates a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a new precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Creates a new transient provider error
    pub fn provider_transient(msg: impl Into<String>) -> Self {
        Self::ProviderTransient(msg.into())
    }

    /// Creates a new permanent provider error
    pub fn provider_permanent(msg: impl Into<String>) -> Self {
        Self::ProviderPermanent(msg.into())
    }

    /// Creates a new processing error
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    /// Creates a new resource error
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Checks whether the error represents a transient condition that a
    /// provider-level retry may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::ProviderTransient(_) | PipelineError::Timeout(_)
        )
    }

    /// Checks whether the error is a cooperative cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }

    /// Gets the error category used for logging and metrics labels.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Precondition(_) => "precondition",
            PipelineError::ProviderTransient(_) => "provider_transient",
            PipelineError::ProviderPermanent(_) => "provider_permanent",
            PipelineError::ProviderNotFound(_) => "provider_not_found",
            PipelineError::ProcessorNotFound(_) => "processor_not_found",
            PipelineError::StackNotFound(_) => "stack_not_found",
            PipelineError::JobNotFound(_) => "job_not_found",
            PipelineError::ProcessingFailed(_) => "processing",
            PipelineError::InsufficientCredits(_) => "credits",
            PipelineError::Resource(_) => "resource",
            PipelineError::Io(_) => "io",
            PipelineError::Database(_) => "database",
            PipelineError::Serialization(_) => "serialization",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::Cancelled(_) => "cancellation",
            PipelineError::Internal(_) => "internal",
        }
    }
}

// Implement conversion from standard library and format errors. Driver errors
// (sqlx, reqwest) are converted in the infrastructure layer.
impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(PipelineError::validation("x").category(), "validation");
        assert_eq!(PipelineError::cancelled("x").category(), "cancellation");
        assert_eq!(PipelineError::database_error("x").category(), "database");
    }

    #[test]
    fn test_transient_classification() {
        assert!(PipelineError::provider_transient("rate limited").is_transient());
        assert!(PipelineError::Timeout("slow".into()).is_transient());
        assert!(!PipelineError::provider_permanent("bad auth").is_transient());
        assert!(!PipelineError::validation("bad stack").is_transient());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_single_sentence_message() {
        let err = PipelineError::processing_failed("frame extraction produced no frames");
        assert_eq!(
            err.to_string(),
            "Processing failed: frame extraction produced no frames"
        );
    }
}

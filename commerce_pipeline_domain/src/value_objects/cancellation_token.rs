// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cooperative Cancellation Token
//!
//! Cloneable flag propagated from the enclosing job into every processor via
//! the [`ProcessorContext`]. Processors observe it at suspension points
//! (provider calls, file IO, parallel-map batch boundaries) and abort with a
//! cancellation error at the next opportunity; work already in flight is
//! allowed to finish naturally.
//!
//! The domain keeps only the synchronous flag; async *waiting* on shutdown
//! lives in the bootstrap crate's shutdown coordinator, which sets this flag
//! when a signal arrives.
//!
//! [`ProcessorContext`]: crate::entities::processor_context::ProcessorContext

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::PipelineError;

/// Cloneable cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns a cancellation error when the token has fired; used as the
    /// checkpoint at suspension points.
    pub fn check(&self, during: &str) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::cancelled(format!(
                "cancellation observed during {}",
                during
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_propagates_to_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check("setup").is_ok());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.check("step boundary").is_err());
    }
}

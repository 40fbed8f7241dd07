// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Credit Ledger Port
//!
//! The core consumes exactly three operations: reserve at admission, then
//! exactly one of commit (success) or refund (failure/cancellation). Pricing
//! tables and abuse checks are external policy.
//!
//! All debits and refunds must be atomic, with idempotency keyed by
//! `<job id>:<lifecycle event>` so queue redelivery cannot double-commit or
//! double-refund a receipt.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::ReceiptId;
use crate::PipelineError;

/// State of a credit reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptState {
    Reserved,
    Committed,
    Refunded,
}

/// A pre-authorized hold on a user's credit balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditReceipt {
    pub id: ReceiptId,
    pub user_id: String,
    pub amount: i64,
    pub state: ReceiptState,
    pub created_at: DateTime<Utc>,
}

/// Port to the credit accounting system.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Atomically places a hold of `amount` credits on the user's balance.
    ///
    /// # Errors
    ///
    /// `PipelineError::InsufficientCredits` when the balance cannot cover the
    /// hold; the caller must not create a job in that case.
    async fn reserve(&self, user_id: &str, amount: i64) -> Result<CreditReceipt, PipelineError>;

    /// Converts a hold into a final debit. Idempotent under the given key.
    async fn commit(
        &self,
        receipt_id: &ReceiptId,
        idempotency_key: &str,
    ) -> Result<(), PipelineError>;

    /// Releases a hold back to the user's balance. Idempotent under the
    /// given key.
    async fn refund(
        &self,
        receipt_id: &ReceiptId,
        idempotency_key: &str,
    ) -> Result<(), PipelineError>;
}

// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Credit Ledger
//!
//! Atomic reserve/commit/refund over three tables: accounts, receipts, and
//! an idempotency-event table. Reservation debits the balance up front; a
//! refund credits it back; a commit just finalizes the receipt. Commit and
//! refund are idempotent under their caller-supplied key, and a receipt can
//! be finalized exactly once; a second, differently-keyed finalization is
//! rejected, which is what keeps queue redelivery from double-spending.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use commerce_pipeline_domain::services::credit_service::{
    CreditLedger, CreditReceipt, ReceiptState,
};
use commerce_pipeline_domain::{PipelineError, ReceiptId};

use super::sqlite_job_repository::db_err;

/// SQLite-backed credit ledger.
#[derive(Clone)]
pub struct SqliteCreditLedger {
    pool: SqlitePool,
}

impl SqliteCreditLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Administrative top-up; creates the account when missing.
    pub async fn grant(&self, user_id: &str, amount: i64) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO credit_accounts (user_id, balance) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Current balance; zero for unknown accounts.
    pub async fn balance(&self, user_id: &str) -> Result<i64, PipelineError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM credit_accounts WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(balance.unwrap_or(0))
    }

    async fn finalize(
        &self,
        receipt_id: &ReceiptId,
        idempotency_key: &str,
        event: &str,
        target_state: &str,
        refund_balance: bool,
    ) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let now = Utc::now().to_rfc3339();

        // Idempotency gate: a replayed key is a completed operation.
        let inserted = sqlx::query(
            r#"
            INSERT INTO credit_events (idempotency_key, receipt_id, event, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(idempotency_key) DO NOTHING
            "#,
        )
        .bind(idempotency_key)
        .bind(receipt_id.to_string())
        .bind(event)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if inserted == 0 {
            tx.commit().await.map_err(db_err)?;
            return Ok(());
        }

        let updated = sqlx::query(
            "UPDATE credit_receipts SET state = ?, updated_at = ? WHERE id = ? AND state = 'reserved'",
        )
        .bind(target_state)
        .bind(&now)
        .bind(receipt_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Err(PipelineError::database_error(format!(
                "receipt {} is not in reserved state; {} rejected",
                receipt_id, event
            )));
        }

        if refund_balance {
            let row = sqlx::query("SELECT user_id, amount FROM credit_receipts WHERE id = ?")
                .bind(receipt_id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
            let user_id: String = row.get("user_id");
            let amount: i64 = row.get("amount");
            sqlx::query("UPDATE credit_accounts SET balance = balance + ? WHERE user_id = ?")
                .bind(amount)
                .bind(&user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CreditLedger for SqliteCreditLedger {
    async fn reserve(&self, user_id: &str, amount: i64) -> Result<CreditReceipt, PipelineError> {
        if amount <= 0 {
            return Err(PipelineError::validation(format!(
                "reservation amount must be positive, got {}",
                amount
            )));
        }
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let debited = sqlx::query(
            "UPDATE credit_accounts SET balance = balance - ? WHERE user_id = ? AND balance >= ?",
        )
        .bind(amount)
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if debited == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Err(PipelineError::InsufficientCredits(format!(
                "user {} cannot cover a hold of {} credits",
                user_id, amount
            )));
        }

        let receipt = CreditReceipt {
            id: ReceiptId::new(),
            user_id: user_id.to_string(),
            amount,
            state: ReceiptState::Reserved,
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO credit_receipts (id, user_id, amount, state, created_at, updated_at)
            VALUES (?, ?, ?, 'reserved', ?, ?)
            "#,
        )
        .bind(receipt.id.to_string())
        .bind(&receipt.user_id)
        .bind(receipt.amount)
        .bind(receipt.created_at.to_rfc3339())
        .bind(receipt.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(receipt)
    }

    async fn commit(
        &self,
        receipt_id: &ReceiptId,
        idempotency_key: &str,
    ) -> Result<(), PipelineError> {
        self.finalize(receipt_id, idempotency_key, "commit", "committed", false)
            .await
    }

    async fn refund(
        &self,
        receipt_id: &ReceiptId,
        idempotency_key: &str,
    ) -> Result<(), PipelineError> {
        self.finalize(receipt_id, idempotency_key, "refund", "refunded", true)
            .await
    }
}

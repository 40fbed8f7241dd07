// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Database Schema
//!
//! Idempotent schema initialization for the SQLite store: jobs, frame
//! records, the work queue, and the credit ledger. Timestamps are stored as
//! RFC 3339 TEXT.

use sqlx::migrate::MigrateDatabase;
use sqlx::SqlitePool;

const DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        api_key_id TEXT,
        video_url TEXT NOT NULL,
        stack_id TEXT NOT NULL,
        config TEXT NOT NULL,
        status TEXT NOT NULL,
        progress TEXT NOT NULL,
        result TEXT,
        error TEXT,
        callback_url TEXT,
        credit_receipt_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_frames (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
        frame_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_job_frames_job ON job_frames(job_id)",
    r#"
    CREATE TABLE IF NOT EXISTS job_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL DEFAULT 'queued',
        attempts INTEGER NOT NULL DEFAULT 0,
        next_attempt_at TEXT NOT NULL,
        claimed_at TEXT,
        finished_at TEXT,
        last_error TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_job_queue_status ON job_queue(status, next_attempt_at)",
    r#"
    CREATE TABLE IF NOT EXISTS credit_accounts (
        user_id TEXT PRIMARY KEY,
        balance INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS credit_receipts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        amount INTEGER NOT NULL,
        state TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS credit_events (
        idempotency_key TEXT PRIMARY KEY,
        receipt_id TEXT NOT NULL,
        event TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
];

/// Applies the schema; safe to call on every startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    for statement in DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Creates the database file when it does not exist yet.
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    if !sqlx::Sqlite::database_exists(database_url).await? {
        sqlx::Sqlite::create_database(database_url).await?;
    }
    Ok(())
}

/// Convenience: create-if-missing, connect, apply schema.
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_database_if_missing(database_url).await?;
    let pool = SqlitePool::connect(database_url).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_schema_idempotent() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(count >= 5);
    }
}

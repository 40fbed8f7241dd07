// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Repositories
//!
//! Schema management plus the job store and credit ledger implementations.

pub mod schema;
pub mod sqlite_credit_ledger;
pub mod sqlite_job_repository;

pub use sqlite_credit_ledger::SqliteCreditLedger;
pub use sqlite_job_repository::SqliteJobRepository;

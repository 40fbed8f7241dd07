// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Work Queue
//!
//! SQLite-backed at-least-once job queue.

pub mod sqlite_job_queue;

pub use sqlite_job_queue::SqliteJobQueue;

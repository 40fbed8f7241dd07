// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Runtime
//!
//! The stack executor and the bounded parallel-map primitive.

pub mod parallel;
pub mod stack_executor;

pub use parallel::{parallel_map, ParallelOutcome};
pub use stack_executor::{ExecutionOutcome, StackExecutor};

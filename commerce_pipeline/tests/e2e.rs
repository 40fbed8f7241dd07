// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-End Tests
//!
//! Full stack executions against staging providers, and the queue worker
//! path with durable state.

mod common;

#[path = "e2e/e2e_stack_scenarios_test.rs"]
mod e2e_stack_scenarios_test;

#[path = "e2e/e2e_worker_test.rs"]
mod e2e_worker_test;

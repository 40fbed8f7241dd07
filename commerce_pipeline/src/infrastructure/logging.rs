// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Observability Setup
//!
//! Installs the tracing subscriber for the application. Filtering is driven
//! by `RUST_LOG` with a sane default; output is compact single-line events
//! suitable both for terminals and log shippers.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "commerce_pipeline=debug,info"
    } else {
        "commerce_pipeline=info,warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}

// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Manages graceful shutdown across application components:
//!
//! - **Cancellation tokens** for propagating the shutdown signal into worker
//!   loops
//! - **Grace period** so in-flight work can land before the process exits
//! - **Signal wiring** from SIGINT/SIGTERM
//!
//! The binary clones one [`ShutdownToken`] per long-running task; tasks
//! `select!` on `token.cancelled()` next to their work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Default grace period for graceful shutdown.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Cloneable token signaled on shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves when shutdown is requested; resolves immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    fn fire(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// Coordinates shutdown across the process.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: ShutdownToken,
    grace_period: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: ShutdownToken::new(),
            grace_period,
        }
    }

    /// The token to hand out to worker tasks.
    pub fn token(&self) -> ShutdownToken {
        self.token.clone()
    }

    /// Initiates shutdown.
    pub fn initiate_shutdown(&self) {
        self.token.fire();
    }

    /// Waits out the grace period after shutdown was initiated.
    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
        tokio::time::sleep(self.grace_period).await;
    }

    /// Installs SIGINT/SIGTERM handlers that initiate shutdown. Spawned once
    /// by the binary.
    pub fn listen_for_signals(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut term = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(term) => term,
                    Err(e) => {
                        tracing::warn!("cannot install SIGTERM handler: {}", e);
                        let _ = ctrl_c.await;
                        token.fire();
                        return;
                    }
                };
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
            }
            tracing::info!("shutdown signal received");
            token.fire();
        });
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Shared utilities for integration and end-to-end tests: staging video
//! fabrication, runtime assembly, an in-memory database, and a recording
//! progress sink.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use commerce_pipeline::infrastructure::processors::register_builtin_processors;
use commerce_pipeline::infrastructure::providers::register_staging_providers;
use commerce_pipeline::infrastructure::repositories::schema::ensure_schema;
use commerce_pipeline::infrastructure::runtime::StackExecutor;
use commerce_pipeline::{ProcessorRegistry, ProviderRegistry};
use commerce_pipeline_domain::{ProgressSink, ProgressUpdate};
use sqlx::SqlitePool;

/// Writes a staging-container "video" with the given duration/audio, whose
/// payload has enough entropy to exercise scoring.
pub fn staging_video(
    dir: &Path,
    duration_secs: u32,
    audio: bool,
    transcript: Option<&str>,
) -> PathBuf {
    let path = dir.join("input.mp4");
    let mut content = format!(
        "CPVID\nduration={}\nfps=30\naudio={}\n\n",
        duration_secs,
        if audio { 1 } else { 0 }
    )
    .into_bytes();
    if let Some(text) = transcript {
        content.extend(format!("TRANSCRIPT:{}\n", text).into_bytes());
    }
    let mut byte = 7u8;
    for _ in 0..(64 * 1024) {
        byte = byte.wrapping_mul(31).wrapping_add(11);
        content.push(byte);
    }
    std::fs::write(&path, content).expect("write staging video");
    path
}

/// Writes a fake frame image with deterministic, index-dependent content.
pub fn fake_frame(dir: &Path, index: usize) -> PathBuf {
    let path = dir.join(format!("frame_{index:04}.jpg"));
    let mut bytes = Vec::with_capacity(2048);
    let mut byte = (index as u8).wrapping_add(3);
    for _ in 0..2048 {
        byte = byte.wrapping_mul(37).wrapping_add(index as u8 | 1);
        bytes.push(byte);
    }
    std::fs::write(&path, bytes).expect("write fake frame");
    path
}

/// Builds the full runtime: built-in processors (sealed), staging providers,
/// and the executor.
pub fn build_runtime() -> (Arc<ProcessorRegistry>, Arc<ProviderRegistry>, StackExecutor) {
    let processors = Arc::new(ProcessorRegistry::new());
    register_builtin_processors(&processors).expect("register processors");
    processors.seal();

    let providers = Arc::new(ProviderRegistry::new());
    register_staging_providers(&providers).expect("register providers");

    let executor = StackExecutor::new(Arc::clone(&processors));
    (processors, providers, executor)
}

/// In-memory SQLite pool with the schema applied.
pub async fn memory_pool() -> SqlitePool {
    // One connection: every handle must see the same in-memory database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("connect sqlite");
    ensure_schema(&pool).await.expect("apply schema");
    pool
}

/// Progress sink that records every update for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn percentages(&self) -> Vec<f32> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.percentage)
            .collect()
    }

    pub fn assert_monotonic(&self) {
        let percentages = self.percentages();
        assert!(
            percentages.windows(2).all(|w| w[0] <= w[1]),
            "progress went backwards: {:?}",
            percentages
        );
    }
}

impl ProgressSink for RecordingSink {
    fn publish(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Blob Store Port
//!
//! Upload of final artifacts. Keys follow the layout
//! `jobs/<jobId>/<subPath>/<filename>` with `<subPath>` one of `frames`,
//! `extracted`, `commercial`, `agent-filtered`. Keys are canonicalized before
//! use: path-traversal tokens stripped, any byte outside `[A-Za-z0-9._-]`
//! replaced with `_`, leading/trailing slashes removed. Uploads keyed by path
//! are idempotent, which is what lets queue redelivery re-run an upload stage
//! safely.

use async_trait::async_trait;
use std::path::Path;

use crate::value_objects::JobId;
use crate::PipelineError;

/// Well-known blob sub-paths under a job's prefix.
pub const BLOB_SUBPATHS: [&str; 4] = ["frames", "extracted", "commercial", "agent-filtered"];

/// Canonicalizes one key segment: traversal tokens dropped, characters
/// outside `[A-Za-z0-9._-]` replaced with `_`.
pub fn canonicalize_segment(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return String::new();
    }
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Builds the canonical blob key for a job artifact.
pub fn blob_key(job_id: &JobId, sub_path: &str, filename: &str) -> String {
    let mut segments = vec!["jobs".to_string(), job_id.to_string()];
    for raw in sub_path.split('/').chain(filename.split('/')) {
        let cleaned = canonicalize_segment(raw.trim_matches('/'));
        if !cleaned.is_empty() {
            segments.push(cleaned);
        }
    }
    segments.join("/")
}

/// Object-storage port.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads a local file under `key`, returning the public URL.
    async fn put_file(&self, key: &str, local_path: &Path) -> Result<String, PipelineError>;
}

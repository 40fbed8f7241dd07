// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Local Blob Store
//!
//! Filesystem-rooted `BlobStore` for staging and tests. Canonical keys map
//! onto paths under the store root; uploads are idempotent by key (a
//! re-upload overwrites the same object), matching what redelivered upload
//! stages expect from the production object store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use commerce_pipeline_domain::{BlobStore, PipelineError};

/// Blob store over a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The on-disk location of an uploaded key.
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_file(&self, key: &str, local_path: &Path) -> Result<String, PipelineError> {
        let target = self.object_path(key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::resource(format!(
                    "cannot create blob directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        tokio::fs::copy(local_path, &target).await.map_err(|e| {
            PipelineError::resource(format!(
                "cannot store {} as blob '{}': {}",
                local_path.display(),
                key,
                e
            ))
        })?;
        Ok(format!("{}/{}", self.base_url, key))
    }
}

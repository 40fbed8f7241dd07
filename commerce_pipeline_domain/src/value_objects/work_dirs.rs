// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Per-Job Filesystem Sandbox
//!
//! Every job owns one `WorkDirs` sandbox for the lifetime of its execution.
//! Processors receive it read/write but must create files only under the
//! subpath that belongs to their phase:
//!
//! - `video/`: downloaded or copied input video and extracted audio
//! - `frames/`: raw extracted frames
//! - `candidates/`: frames selected by the unified analyzer
//! - `extracted/`: frames after background removal / centering / upscaling
//! - `final/`: final selection frames
//! - `commercial/`: synthesized commercial images
//!
//! When a processor rewrites a frame's `path` (cropping, centering,
//! background removal), the previous file becomes garbage; processors report
//! it through [`WorkDirs::discard_replaced_file`] so cleanup stays
//! best-effort and centralized. The sandbox is removed on successful terminal
//! transition unless the operator asks to retain it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{JobId, PipelineError};

/// Per-job sandbox with well-known subpaths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkDirs {
    root: PathBuf,
}

impl WorkDirs {
    /// Lays out a sandbox for `job_id` under `base` and creates every
    /// subdirectory.
    pub fn create(base: &Path, job_id: &JobId) -> Result<Self, PipelineError> {
        let dirs = Self {
            root: base.join(job_id.to_string()),
        };
        for dir in [
            dirs.root(),
            dirs.video(),
            dirs.frames(),
            dirs.candidates(),
            dirs.extracted(),
            dirs.final_dir(),
            dirs.commercial(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                PipelineError::resource(format!(
                    "cannot create work directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(dirs)
    }

    /// Wraps an existing sandbox root without touching the filesystem.
    pub fn from_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PathBuf {
        self.root.clone()
    }

    pub fn video(&self) -> PathBuf {
        self.root.join("video")
    }

    pub fn frames(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn candidates(&self) -> PathBuf {
        self.root.join("candidates")
    }

    pub fn extracted(&self) -> PathBuf {
        self.root.join("extracted")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.root.join("final")
    }

    pub fn commercial(&self) -> PathBuf {
        self.root.join("commercial")
    }

    /// Best-effort removal of a file whose frame path was rewritten.
    ///
    /// Only files inside the sandbox are touched; a path outside the root is
    /// ignored rather than deleted.
    pub fn discard_replaced_file(&self, path: &Path) {
        if path.starts_with(&self.root) {
            let _ = std::fs::remove_file(path);
        }
    }

    /// Removes the whole sandbox tree.
    pub fn remove(&self) -> Result<(), PipelineError> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root).map_err(|e| {
                PipelineError::resource(format!(
                    "cannot remove work directory {}: {}",
                    self.root.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

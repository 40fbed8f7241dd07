// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frame Metadata
//!
//! One record type for a frame across its whole life. Frames are
//! *progressively enriched*: fields are only added, never silently removed,
//! except by the two explicit filtering stages (scoring and classification)
//! which may drop whole frames. Rather than a subclass per phase, a single
//! record carries every field as `Option` and two predicates give the checked
//! phase lens:
//!
//! 1. **Base**: `frame_id, filename, path, timestamp, index` (extraction)
//! 2. **Scored**: `sharpness, motion, score, is_best_per_second`
//! 3. **Classified**: `product_id, variant_id, angle_estimate,
//!    rotation_angle_deg, obstructions, background_recommendations,
//!    is_final_selection`
//! 4. **Persisted**: `db_id`
//! 5. **Versioned**: `version, source_frame_id` (commercial fan-out)
//! 6. **Uploaded**: `s3_url`
//!
//! A frame's `path` may be rewritten by stages that replace the image file
//! (centering, background removal, upscaling); the caller hands the previous
//! file to the sandbox as garbage.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::value_objects::{CommercialVersion, FrameId};

/// Metadata for one frame sampled from the input video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    // Base fields, assigned at extraction and stable afterwards.
    pub frame_id: FrameId,
    pub filename: String,
    pub path: PathBuf,
    /// Position of the frame in the source video, in seconds.
    pub timestamp: f64,
    pub index: usize,

    // Scoring enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_best_per_second: Option<bool>,

    // Classification enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_angle_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obstructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub background_recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_final_selection: Option<bool>,

    // Persistence enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_id: Option<i64>,

    // Commercial fan-out enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<CommercialVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_frame_id: Option<FrameId>,

    // Upload enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_url: Option<String>,
}

impl FrameMetadata {
    /// Creates a base frame record as produced by extraction.
    pub fn new(filename: String, path: PathBuf, timestamp: f64, index: usize) -> Self {
        Self {
            frame_id: FrameId::new(),
            filename,
            path,
            timestamp,
            index,
            sharpness: None,
            motion: None,
            score: None,
            is_best_per_second: None,
            product_id: None,
            variant_id: None,
            angle_estimate: None,
            rotation_angle_deg: None,
            obstructions: Vec::new(),
            background_recommendations: Vec::new(),
            is_final_selection: None,
            db_id: None,
            version: None,
            source_frame_id: None,
            s3_url: None,
        }
    }

    /// Whether the scoring stage has enriched this frame.
    pub fn has_scores(&self) -> bool {
        self.sharpness.is_some()
    }

    /// Whether the classification stage has enriched this frame.
    pub fn has_classification(&self) -> bool {
        self.product_id.is_some() || self.variant_id.is_some()
    }

    /// Creates a versioned copy for the commercial fan-out: fresh identity,
    /// `source_frame_id` pointing back at this frame, classification data
    /// carried over, upload/persistence state reset.
    pub fn versioned_copy(
        &self,
        version: CommercialVersion,
        filename: String,
        path: PathBuf,
    ) -> Self {
        Self {
            frame_id: FrameId::new(),
            filename,
            path,
            timestamp: self.timestamp,
            index: self.index,
            sharpness: self.sharpness,
            motion: self.motion,
            score: self.score,
            is_best_per_second: self.is_best_per_second,
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
            angle_estimate: self.angle_estimate.clone(),
            rotation_angle_deg: self.rotation_angle_deg,
            obstructions: self.obstructions.clone(),
            background_recommendations: self.background_recommendations.clone(),
            is_final_selection: self.is_final_selection,
            db_id: None,
            version: Some(version),
            source_frame_id: Some(self.frame_id),
            s3_url: None,
        }
    }

    /// Rewrites the frame's image path, returning the replaced path so the
    /// caller can hand it to the sandbox as garbage.
    pub fn rewrite_path(&mut self, new_path: PathBuf) -> PathBuf {
        self.filename = new_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone());
        std::mem::replace(&mut self.path, new_path)
    }

    /// The frame identity a commercial copy derives from, or its own.
    pub fn origin_frame_id(&self) -> FrameId {
        self.source_frame_id.unwrap_or(self.frame_id)
    }

    /// Convenience view of the path as `&Path`.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

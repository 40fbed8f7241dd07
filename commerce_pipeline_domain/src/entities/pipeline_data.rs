// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Data
//!
//! The mutable record threaded through one stack execution. A `PipelineData`
//! is owned by a single executor invocation; parallel fan-outs receive
//! immutable per-item snapshots, never the record itself.
//!
//! ## Invariants
//!
//! - `metadata.frames` is the single source of truth about frames. The legacy
//!   shadow collections (`scored_frames`, `recommended_frames`) are derived
//!   read-only views, retained for one release cycle for third-party readers.
//! - When both are present, `images` mirrors `metadata.frames` paths after
//!   any processor that rewrites frame paths.
//! - Frame records are progressively enriched; only the scoring and
//!   classification stages may drop whole frames, and survivors keep their
//!   relative order.
//!
//! ## Merge Discipline
//!
//! Processors return a [`DataPatch`]; the executor shallow-merges it: fields
//! present in the patch replace the running value, absent fields are left
//! untouched. `metadata` is replaced only when returned; a processor that
//! extends metadata must return the union itself. There is no deep merge.
//!
//! ## Capability Inference
//!
//! [`PipelineData::satisfies`] implements the data-path predicate table used
//! by both the static stack validator (over declared produces) and the
//! executor's runtime pre-check.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::entities::frame_metadata::FrameMetadata;
use crate::value_objects::DataPath;

/// Reference to the input video, progressively localized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

impl VideoData {
    /// A video reference that has not been localized yet.
    pub fn from_source_url(url: impl Into<String>) -> Self {
        Self {
            source_url: Some(url.into()),
            ..Default::default()
        }
    }
}

/// Extracted audio track, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub has_audio: bool,
}

/// Structured product description discovered by AI analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

/// The metadata subrecord; always present on a `PipelineData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<FrameMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_metadata: Option<ProductMetadata>,
    /// Open-ended extension map; the escape hatch behind
    /// [`DataPath::Custom`]. All new cross-processor state goes here, never
    /// into ad-hoc top-level fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

/// The record threaded through a stack execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioData>,
    #[serde(default)]
    pub metadata: PipelineMetadata,
}

/// Shallow patch returned by a processor. Fields present replace the running
/// value; absent fields leave it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PipelineMetadata>,
}

impl DataPatch {
    /// An empty patch; the processor-level no-op.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether the patch changes anything.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl PipelineData {
    /// Starting data for a job whose input is a remote or local video
    /// reference.
    pub fn for_video_source(url_or_path: impl Into<String>) -> Self {
        Self {
            video: Some(VideoData::from_source_url(url_or_path)),
            ..Default::default()
        }
    }

    /// Applies a processor's patch with the shallow-merge discipline.
    pub fn merge(&mut self, patch: DataPatch) {
        if let Some(video) = patch.video {
            self.video = Some(video);
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(text) = patch.text {
            self.text = Some(text);
        }
        if let Some(audio) = patch.audio {
            self.audio = Some(audio);
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
    }

    /// Evaluates one data-path predicate against the current record.
    pub fn satisfies(&self, path: &DataPath) -> bool {
        match path {
            DataPath::Video => self.video.as_ref().is_some_and(|v| {
                v.path.as_ref().is_some_and(|p| !p.as_os_str().is_empty())
                    || v.source_url.as_ref().is_some_and(|u| !u.is_empty())
            }),
            DataPath::Images => !self.images.is_empty(),
            DataPath::Text => self.text.as_ref().is_some_and(|t| !t.is_empty()),
            DataPath::Audio => self.audio.as_ref().is_some_and(|a| {
                a.has_audio && a.path.as_ref().is_some_and(|p| !p.as_os_str().is_empty())
            }),
            DataPath::Transcript => self
                .metadata
                .transcript
                .as_ref()
                .is_some_and(|t| !t.is_empty()),
            DataPath::ProductMetadata => self
                .metadata
                .product_metadata
                .as_ref()
                .is_some_and(|p| !p.title.is_empty()),
            DataPath::Frames => !self.metadata.frames.is_empty(),
            DataPath::FrameScores => self.metadata.frames.iter().any(|f| f.sharpness.is_some()),
            DataPath::FrameClassifications => {
                self.metadata.frames.iter().any(|f| f.has_classification())
            }
            DataPath::FrameDbId => self.metadata.frames.iter().any(|f| f.db_id.is_some()),
            DataPath::FrameS3Url => self.metadata.frames.iter().any(|f| f.s3_url.is_some()),
            DataPath::FrameVersion => self.metadata.frames.iter().any(|f| f.version.is_some()),
            DataPath::Custom(name) => self.metadata.extensions.contains_key(name),
        }
    }

    /// The set of currently-satisfied closed-vocabulary paths, plus any
    /// extension keys as custom paths.
    pub fn satisfied_paths(&self) -> BTreeSet<DataPath> {
        let mut paths: BTreeSet<DataPath> = DataPath::CLOSED_SET
            .into_iter()
            .filter(|p| self.satisfies(p))
            .collect();
        for key in self.metadata.extensions.keys() {
            paths.insert(DataPath::Custom(key.clone()));
        }
        paths
    }

    /// Legacy view: frames enriched by the scoring stage.
    ///
    /// Shadow of `metadata.frames`; nothing writes this, third-party readers
    /// only. Scheduled for removal after one release cycle.
    pub fn scored_frames(&self) -> Vec<&FrameMetadata> {
        self.metadata.frames.iter().filter(|f| f.has_scores()).collect()
    }

    /// Legacy view: frames flagged as final selections by classification.
    ///
    /// Shadow of `metadata.frames`; see [`Self::scored_frames`].
    pub fn recommended_frames(&self) -> Vec<&FrameMetadata> {
        self.metadata
            .frames
            .iter()
            .filter(|f| f.is_final_selection == Some(true))
            .collect()
    }

    /// Rebuilds the `images` mirror from the current frame list. Called by
    /// processors that rewrite or drop frame paths.
    pub fn frame_image_paths(&self) -> Vec<PathBuf> {
        self.metadata.frames.iter().map(|f| f.path.clone()).collect()
    }
}

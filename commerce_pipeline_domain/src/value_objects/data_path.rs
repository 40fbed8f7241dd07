// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Data Path Capability Vocabulary
//!
//! The closed set of capabilities that flow through the pipeline. Each value
//! asserts that a specific predicate over [`PipelineData`] is true (see
//! `PipelineData::satisfies`). Processors declare their IO contract in terms
//! of data paths, and the stack validator reasons about stacks monotonically:
//! walk the step list with an `available` set, assert `requires ⊆ available`
//! before each step, union `produces` in after it.
//!
//! ## The Vocabulary
//!
//! | Path | String form |
//! |---|---|
//! | `Video` | `video` |
//! | `Images` | `images` |
//! | `Text` | `text` |
//! | `Audio` | `audio` |
//! | `Transcript` | `transcript` |
//! | `ProductMetadata` | `product.metadata` |
//! | `Frames` | `frames` |
//! | `FrameScores` | `frames.scores` |
//! | `FrameClassifications` | `frames.classifications` |
//! | `FrameDbId` | `frames.dbId` |
//! | `FrameS3Url` | `frames.s3Url` |
//! | `FrameVersion` | `frames.version` |
//!
//! ## Escape Hatch
//!
//! `Custom(name)` covers paths outside the closed vocabulary; such a path is
//! satisfied when `metadata.extensions` contains `name` as a key. It exists
//! to preserve compatibility and should disappear once every processor has
//! migrated to the closed set.
//!
//! [`PipelineData`]: crate::entities::pipeline_data::PipelineData

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};
use std::str::FromStr;

/// A named capability predicate over `PipelineData`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataPath {
    Video,
    Images,
    Text,
    Audio,
    Transcript,
    ProductMetadata,
    Frames,
    FrameScores,
    FrameClassifications,
    FrameDbId,
    FrameS3Url,
    FrameVersion,
    /// A path outside the closed vocabulary, satisfied by presence of the
    /// named key in `metadata.extensions`.
    Custom(String),
}

impl DataPath {
    /// All members of the closed vocabulary, in declaration order.
    pub const CLOSED_SET: [DataPath; 12] = [
        DataPath::Video,
        DataPath::Images,
        DataPath::Text,
        DataPath::Audio,
        DataPath::Transcript,
        DataPath::ProductMetadata,
        DataPath::Frames,
        DataPath::FrameScores,
        DataPath::FrameClassifications,
        DataPath::FrameDbId,
        DataPath::FrameS3Url,
        DataPath::FrameVersion,
    ];

    /// Returns the canonical string form of the path.
    pub fn as_str(&self) -> &str {
        match self {
            DataPath::Video => "video",
            DataPath::Images => "images",
            DataPath::Text => "text",
            DataPath::Audio => "audio",
            DataPath::Transcript => "transcript",
            DataPath::ProductMetadata => "product.metadata",
            DataPath::Frames => "frames",
            DataPath::FrameScores => "frames.scores",
            DataPath::FrameClassifications => "frames.classifications",
            DataPath::FrameDbId => "frames.dbId",
            DataPath::FrameS3Url => "frames.s3Url",
            DataPath::FrameVersion => "frames.version",
            DataPath::Custom(name) => name,
        }
    }

    /// Whether this path belongs to the closed vocabulary.
    pub fn is_closed(&self) -> bool {
        !matches!(self, DataPath::Custom(_))
    }
}

impl FromStr for DataPath {
    type Err = std::convert::Infallible;

    /// Parsing never fails: unknown names land in the `Custom` escape hatch.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "video" => DataPath::Video,
            "images" => DataPath::Images,
            "text" => DataPath::Text,
            "audio" => DataPath::Audio,
            "transcript" => DataPath::Transcript,
            "product.metadata" => DataPath::ProductMetadata,
            "frames" => DataPath::Frames,
            "frames.scores" => DataPath::FrameScores,
            "frames.classifications" => DataPath::FrameClassifications,
            "frames.dbId" => DataPath::FrameDbId,
            "frames.s3Url" => DataPath::FrameS3Url,
            "frames.version" => DataPath::FrameVersion,
            other => DataPath::Custom(other.to_string()),
        })
    }
}

impl Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DataPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or(DataPath::Custom(s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_set_round_trips() {
        for path in DataPath::CLOSED_SET {
            let parsed: DataPath = path.as_str().parse().unwrap();
            assert_eq!(parsed, path);
            assert!(parsed.is_closed());
        }
    }

    #[test]
    fn test_unknown_path_falls_back_to_custom() {
        let parsed: DataPath = "holeReport".parse().unwrap();
        assert_eq!(parsed, DataPath::Custom("holeReport".to_string()));
        assert!(!parsed.is_closed());
        assert_eq!(parsed.as_str(), "holeReport");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&DataPath::FrameScores).unwrap();
        assert_eq!(json, "\"frames.scores\"");
        let back: DataPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DataPath::FrameScores);
    }
}

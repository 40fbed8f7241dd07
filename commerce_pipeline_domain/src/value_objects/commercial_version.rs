// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Commercial Image Version
//!
//! The background treatments the commercial synthesis stage can produce for
//! a final product frame.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::PipelineError;

/// A background treatment for a commercial product image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommercialVersion {
    /// Product cut out on a transparent background.
    Transparent,
    /// Product on a flat solid-color background.
    Solid,
    /// Product composited into a realistic scene.
    Real,
    /// Product in a stylized creative scene.
    Creative,
}

impl CommercialVersion {
    /// All versions, in catalogue order.
    pub const ALL: [CommercialVersion; 4] = [
        CommercialVersion::Transparent,
        CommercialVersion::Solid,
        CommercialVersion::Real,
        CommercialVersion::Creative,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommercialVersion::Transparent => "transparent",
            CommercialVersion::Solid => "solid",
            CommercialVersion::Real => "real",
            CommercialVersion::Creative => "creative",
        }
    }
}

impl Display for CommercialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommercialVersion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transparent" => Ok(CommercialVersion::Transparent),
            "solid" => Ok(CommercialVersion::Solid),
            "real" => Ok(CommercialVersion::Real),
            "creative" => Ok(CommercialVersion::Creative),
            other => Err(PipelineError::validation(format!(
                "unknown commercial version '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for v in CommercialVersion::ALL {
            assert_eq!(v.as_str().parse::<CommercialVersion>().unwrap(), v);
        }
    }

    #[test]
    fn test_unknown_rejected() {
        assert!("sepia".parse::<CommercialVersion>().is_err());
    }
}

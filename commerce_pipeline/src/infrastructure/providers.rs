// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Provider Implementations
//!
//! Concrete provider integrations (Gemini, Claid, hosted upscalers) live in
//! deployment-specific crates outside this repository; this crate ships
//! their contracts, the deterministic staging suite, and the registration
//! seam that selects between them.
//!
//! The seam is [`ProviderMode`]: `staging` registers the synthetic local
//! suite, `production` registers the linked real-provider bundle. This
//! build links none, so selecting `production` is a loud configuration
//! error rather than a silent fallback to synthetic outputs.

pub mod staging;

use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use commerce_pipeline_domain::{PipelineError, ProviderRegistry};

/// Which provider set the process registers at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    /// Deterministic local providers for staging templates and tests.
    Staging,
    /// The real-provider bundle linked into the deployment build.
    Production,
}

impl Default for ProviderMode {
    fn default() -> Self {
        ProviderMode::Staging
    }
}

impl ProviderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderMode::Staging => "staging",
            ProviderMode::Production => "production",
        }
    }
}

impl FromStr for ProviderMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" => Ok(ProviderMode::Staging),
            "production" => Ok(ProviderMode::Production),
            other => Err(PipelineError::validation(format!(
                "unknown provider mode '{}'; expected 'staging' or 'production'",
                other
            ))),
        }
    }
}

/// Registers the provider set for `mode`. Called once at startup, before
/// the first job runs.
pub fn register_providers(
    registry: &ProviderRegistry,
    mode: ProviderMode,
) -> Result<(), PipelineError> {
    match mode {
        ProviderMode::Staging => register_staging_providers(registry),
        ProviderMode::Production => register_production_providers(registry),
    }
}

/// Registers the production provider bundle.
///
/// Deployment builds link the concrete integrations and register them here;
/// this repository ships only the provider contracts, so in this build the
/// production mode refuses to start instead of serving synthetic results.
pub fn register_production_providers(
    _registry: &ProviderRegistry,
) -> Result<(), PipelineError> {
    Err(PipelineError::validation(
        "no production provider bundle is linked into this build; set \
         provider_mode = \"staging\" or deploy a build that registers real \
         integrations",
    ))
}

/// Registers the staging suite for every provider kind. The `claid` alias
/// for background removal exists so the pinned-provider templates resolve in
/// staging.
pub fn register_staging_providers(registry: &ProviderRegistry) -> Result<(), PipelineError> {
    registry.register_video_extraction(Arc::new(staging::StagingVideoExtraction), true)?;
    registry.register_background_removal(
        Arc::new(staging::StagingBackgroundRemoval::new("staging")),
        true,
    )?;
    registry.register_background_removal(
        Arc::new(staging::StagingBackgroundRemoval::new("claid")),
        false,
    )?;
    registry.register_image_transform(Arc::new(staging::StagingImageTransform), true)?;
    registry.register_classification(Arc::new(staging::StagingClassification), true)?;
    registry.register_product_extraction(Arc::new(staging::StagingProductExtraction), true)?;
    registry.register_commercial_image(Arc::new(staging::StagingCommercialImage), true)?;
    registry.register_upscale(Arc::new(staging::StagingUpscale), true)?;
    registry.register_transcription(Arc::new(staging::StagingTranscription), true)?;
    registry.register_unified_analyzer(Arc::new(staging::StagingUnifiedAnalyzer), true)?;
    Ok(())
}

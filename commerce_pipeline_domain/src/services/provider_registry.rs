// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Provider Registry
//!
//! Typed registry of provider implementations, one sub-registry per kind.
//! For each kind zero or more implementations are registered, one may be the
//! default, and optionally an A/B test binds two implementations with a
//! traffic split.
//!
//! ## Selection Contract
//!
//! `select(explicit_id?, seed?)`:
//!
//! 1. An explicit id wins: direct lookup, fatal when absent.
//! 2. Otherwise, with an active A/B test and a seed, the variant is chosen by
//!    a stable 32-bit FNV-1a hash of the seed against the split threshold;
//!    the same seed always yields the same variant, on every architecture.
//! 3. Otherwise the default implementation is returned.
//!
//! Selection never consults `is_available()`; only listings filter by it.
//!
//! ## Concurrency
//!
//! Reads vastly outnumber writes, and A/B mutation is an administrative
//! operation that must not race job execution. The registry publishes an
//! immutable snapshot behind an `RwLock<Arc<…>>`: readers clone the `Arc`,
//! writers rebuild and atomically swap.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::services::providers::{
    BackgroundRemovalProvider, ClassificationProvider, CommercialImageProvider,
    ImageTransformProvider, ProductExtractionProvider, ProviderInfo, TranscriptionProvider,
    UnifiedAnalyzerProvider, UpscaleProvider, VideoExtractionProvider,
};
use crate::PipelineError;

/// Stable 32-bit FNV-1a. Deliberately hand-rolled: the A/B split must not
/// depend on `DefaultHasher`'s unstable, per-process seeding.
pub fn fnv1a_32(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Which side of an A/B test a selection landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbVariant {
    Control,
    Variant,
}

/// An active A/B test for one provider kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbTest {
    pub id: String,
    /// Provider id serving the control group.
    pub control: String,
    /// Provider id serving the variant group.
    pub variant: String,
    /// Percentage of traffic routed to the variant, `[0, 100]`.
    pub split_percent: u8,
}

impl AbTest {
    fn pick(&self, seed: &str) -> (AbVariant, &str) {
        if (fnv1a_32(seed) % 100) < u32::from(self.split_percent) {
            (AbVariant::Variant, &self.variant)
        } else {
            (AbVariant::Control, &self.control)
        }
    }
}

/// Result of a provider selection.
pub struct Selection<T: ?Sized> {
    pub provider: Arc<T>,
    pub provider_id: String,
    pub ab_test_id: Option<String>,
    pub variant: Option<AbVariant>,
}

/// Listing entry for administrative APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderListing {
    pub id: String,
    pub is_default: bool,
    pub in_ab_test: bool,
}

struct KindRegistry<T: ?Sized> {
    kind: &'static str,
    entries: BTreeMap<String, Arc<T>>,
    default_id: Option<String>,
    ab_test: Option<AbTest>,
}

impl<T: ?Sized> Clone for KindRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            entries: self.entries.clone(),
            default_id: self.default_id.clone(),
            ab_test: self.ab_test.clone(),
        }
    }
}

impl<T: ProviderInfo + ?Sized> KindRegistry<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            default_id: None,
            ab_test: None,
        }
    }

    fn register(&mut self, provider: Arc<T>, default: bool) -> Result<(), PipelineError> {
        let id = provider.id().to_string();
        if self.entries.contains_key(&id) {
            return Err(PipelineError::validation(format!(
                "provider '{}' is already registered for kind '{}'",
                id, self.kind
            )));
        }
        if default || self.default_id.is_none() {
            self.default_id = Some(id.clone());
        }
        self.entries.insert(id, provider);
        Ok(())
    }

    fn set_ab_test(&mut self, ab_test: Option<AbTest>) -> Result<(), PipelineError> {
        if let Some(test) = &ab_test {
            if test.split_percent > 100 {
                return Err(PipelineError::validation(format!(
                    "A/B split must be within [0, 100], got {}",
                    test.split_percent
                )));
            }
            for id in [&test.control, &test.variant] {
                if !self.entries.contains_key(id) {
                    return Err(PipelineError::validation(format!(
                        "A/B test '{}' references unknown provider '{}' for kind '{}'",
                        test.id, id, self.kind
                    )));
                }
            }
        }
        self.ab_test = ab_test;
        Ok(())
    }

    fn lookup(&self, id: &str) -> Result<Arc<T>, PipelineError> {
        self.entries.get(id).cloned().ok_or_else(|| {
            PipelineError::ProviderNotFound(format!(
                "kind '{}' has no provider '{}'",
                self.kind, id
            ))
        })
    }

    fn select(
        &self,
        explicit_id: Option<&str>,
        seed: Option<&str>,
    ) -> Result<Selection<T>, PipelineError> {
        if let Some(id) = explicit_id {
            return Ok(Selection {
                provider: self.lookup(id)?,
                provider_id: id.to_string(),
                ab_test_id: None,
                variant: None,
            });
        }

        if let (Some(test), Some(seed)) = (&self.ab_test, seed) {
            let (variant, id) = test.pick(seed);
            return Ok(Selection {
                provider: self.lookup(id)?,
                provider_id: id.to_string(),
                ab_test_id: Some(test.id.clone()),
                variant: Some(variant),
            });
        }

        let default_id = self.default_id.as_deref().ok_or_else(|| {
            PipelineError::ProviderNotFound(format!(
                "kind '{}' has no registered providers",
                self.kind
            ))
        })?;
        Ok(Selection {
            provider: self.lookup(default_id)?,
            provider_id: default_id.to_string(),
            ab_test_id: None,
            variant: None,
        })
    }

    fn list_available(&self) -> Vec<ProviderListing> {
        self.entries
            .iter()
            .filter(|(_, provider)| provider.is_available())
            .map(|(id, _)| ProviderListing {
                id: id.clone(),
                is_default: self.default_id.as_deref() == Some(id),
                in_ab_test: self
                    .ab_test
                    .as_ref()
                    .is_some_and(|t| &t.control == id || &t.variant == id),
            })
            .collect()
    }
}

#[derive(Clone)]
struct Catalog {
    video_extraction: KindRegistry<dyn VideoExtractionProvider>,
    background_removal: KindRegistry<dyn BackgroundRemovalProvider>,
    image_transform: KindRegistry<dyn ImageTransformProvider>,
    classification: KindRegistry<dyn ClassificationProvider>,
    product_extraction: KindRegistry<dyn ProductExtractionProvider>,
    commercial_image: KindRegistry<dyn CommercialImageProvider>,
    upscale: KindRegistry<dyn UpscaleProvider>,
    transcription: KindRegistry<dyn TranscriptionProvider>,
    unified_analyzer: KindRegistry<dyn UnifiedAnalyzerProvider>,
}

impl Catalog {
    fn new() -> Self {
        Self {
            video_extraction: KindRegistry::new("video_extraction"),
            background_removal: KindRegistry::new("background_removal"),
            image_transform: KindRegistry::new("image_transform"),
            classification: KindRegistry::new("classification"),
            product_extraction: KindRegistry::new("product_extraction"),
            commercial_image: KindRegistry::new("commercial_image"),
            upscale: KindRegistry::new("upscale"),
            transcription: KindRegistry::new("transcription"),
            unified_analyzer: KindRegistry::new("unified_analyzer"),
        }
    }
}

/// The process-wide provider registry.
pub struct ProviderRegistry {
    catalog: RwLock<Arc<Catalog>>,
}

// One block of register/select/ab/list accessors per provider kind, all
// sharing the snapshot-swap mutation discipline.
macro_rules! provider_kind_api {
    ($field:ident, $trait:ident, $register:ident, $select:ident, $set_ab:ident, $list:ident) => {
        pub fn $register(
            &self,
            provider: Arc<dyn $trait>,
            default: bool,
        ) -> Result<(), PipelineError> {
            self.mutate(|catalog| catalog.$field.register(provider, default))
        }

        pub fn $select(
            &self,
            explicit_id: Option<&str>,
            seed: Option<&str>,
        ) -> Result<Selection<dyn $trait>, PipelineError> {
            self.snapshot().$field.select(explicit_id, seed)
        }

        pub fn $set_ab(&self, ab_test: Option<AbTest>) -> Result<(), PipelineError> {
            self.mutate(|catalog| catalog.$field.set_ab_test(ab_test))
        }

        pub fn $list(&self) -> Vec<ProviderListing> {
            self.snapshot().$field.list_available()
        }
    };
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Arc::new(Catalog::new())),
        }
    }

    fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().clone()
    }

    fn mutate(
        &self,
        apply: impl FnOnce(&mut Catalog) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        let mut guard = self.catalog.write();
        let mut next = (**guard).clone();
        apply(&mut next)?;
        *guard = Arc::new(next);
        Ok(())
    }

    provider_kind_api!(
        video_extraction,
        VideoExtractionProvider,
        register_video_extraction,
        video_extraction,
        set_video_extraction_ab_test,
        list_video_extraction
    );
    provider_kind_api!(
        background_removal,
        BackgroundRemovalProvider,
        register_background_removal,
        background_removal,
        set_background_removal_ab_test,
        list_background_removal
    );
    provider_kind_api!(
        image_transform,
        ImageTransformProvider,
        register_image_transform,
        image_transform,
        set_image_transform_ab_test,
        list_image_transform
    );
    provider_kind_api!(
        classification,
        ClassificationProvider,
        register_classification,
        classification,
        set_classification_ab_test,
        list_classification
    );
    provider_kind_api!(
        product_extraction,
        ProductExtractionProvider,
        register_product_extraction,
        product_extraction,
        set_product_extraction_ab_test,
        list_product_extraction
    );
    provider_kind_api!(
        commercial_image,
        CommercialImageProvider,
        register_commercial_image,
        commercial_image,
        set_commercial_image_ab_test,
        list_commercial_image
    );
    provider_kind_api!(
        upscale,
        UpscaleProvider,
        register_upscale,
        upscale,
        set_upscale_ab_test,
        list_upscale
    );
    provider_kind_api!(
        transcription,
        TranscriptionProvider,
        register_transcription,
        transcription,
        set_transcription_ab_test,
        list_transcription
    );
    provider_kind_api!(
        unified_analyzer,
        UnifiedAnalyzerProvider,
        register_unified_analyzer,
        unified_analyzer,
        set_unified_analyzer_ab_test,
        list_unified_analyzer
    );
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

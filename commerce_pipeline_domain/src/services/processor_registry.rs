// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Registry
//!
//! Process-wide identifier → processor lookup. Registration happens in a
//! deterministic phase at startup and is then sealed; after sealing, new
//! registrations are rejected so running jobs never observe a mutating
//! catalogue. The registry exposes a mutation epoch that the IO-set cache
//! uses for invalidation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::services::processor::{Processor, ProcessorIo};
use crate::PipelineError;

/// Lookup port used by the stack validator. Implemented by
/// [`ProcessorRegistry`]; tests substitute lightweight fakes.
pub trait ProcessorCatalog: Send + Sync {
    /// The declared IO of a registered processor, if any.
    fn io_for(&self, id: &str) -> Option<ProcessorIo>;

    /// Whether the identifier is registered.
    fn contains(&self, id: &str) -> bool {
        self.io_for(id).is_some()
    }

    /// Mutation counter; bumps invalidate caches keyed on catalogue state.
    fn epoch(&self) -> u64 {
        0
    }
}

/// Identifier → processor registry.
pub struct ProcessorRegistry {
    processors: RwLock<HashMap<String, Arc<dyn Processor>>>,
    epoch: AtomicU64,
    sealed: AtomicBool,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: RwLock::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    /// Registers a processor. Identifiers are globally unique; duplicates and
    /// post-seal registrations are rejected.
    pub fn register(&self, processor: Arc<dyn Processor>) -> Result<(), PipelineError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(PipelineError::validation(format!(
                "processor registry is sealed; cannot register '{}'",
                processor.id()
            )));
        }
        let mut map = self.processors.write();
        let id = processor.id().to_string();
        if map.contains_key(&id) {
            return Err(PipelineError::validation(format!(
                "processor id '{}' is already registered",
                id
            )));
        }
        map.insert(id, processor);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Seals the registry; called once the first job may start.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Resolves a processor by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Processor>> {
        self.processors.read().get(id).cloned()
    }

    /// Registered identifiers, sorted for stable listings.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.processors.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Test hook: unseals and clears the registry, bumping the epoch so any
    /// IO-set cache keyed on it invalidates.
    pub fn clear_cache(&self) {
        let mut map = self.processors.write();
        map.clear();
        self.sealed.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorCatalog for ProcessorRegistry {
    fn io_for(&self, id: &str) -> Option<ProcessorIo> {
        self.get(id).map(|p| p.io())
    }

    fn contains(&self, id: &str) -> bool {
        self.processors.read().contains_key(id)
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::pipeline_data::PipelineData;
    use crate::entities::processor_context::ProcessorContext;
    use crate::services::processor::{StepOptions, StepOutput};
    use crate::value_objects::DataPath;
    use async_trait::async_trait;

    struct FakeProcessor {
        id: &'static str,
    }

    #[async_trait]
    impl Processor for FakeProcessor {
        fn id(&self) -> &str {
            self.id
        }

        fn display_name(&self) -> &str {
            "Fake"
        }

        fn status_key(&self) -> &str {
            "downloading"
        }

        fn io(&self) -> ProcessorIo {
            ProcessorIo::new([DataPath::Video], [DataPath::Frames])
        }

        async fn execute(
            &self,
            _context: &ProcessorContext,
            _data: &PipelineData,
            _options: &StepOptions,
        ) -> Result<StepOutput, PipelineError> {
            Ok(StepOutput::noop())
        }
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = ProcessorRegistry::new();
        registry.register(Arc::new(FakeProcessor { id: "a" })).unwrap();
        assert!(registry.register(Arc::new(FakeProcessor { id: "a" })).is_err());
    }

    #[test]
    fn test_sealed_registry_rejects_registration() {
        let registry = ProcessorRegistry::new();
        registry.seal();
        assert!(registry.register(Arc::new(FakeProcessor { id: "a" })).is_err());
    }

    #[test]
    fn test_epoch_bumps_on_mutation() {
        let registry = ProcessorRegistry::new();
        let before = registry.epoch();
        registry.register(Arc::new(FakeProcessor { id: "a" })).unwrap();
        assert!(registry.epoch() > before);

        let sealed_epoch = registry.epoch();
        registry.clear_cache();
        assert!(registry.epoch() > sealed_epoch);
        assert!(!registry.contains("a"));
    }

    #[test]
    fn test_catalog_exposes_io() {
        let registry = ProcessorRegistry::new();
        registry.register(Arc::new(FakeProcessor { id: "a" })).unwrap();
        let io = registry.io_for("a").unwrap();
        assert_eq!(io.requires, vec![DataPath::Video]);
        assert!(registry.io_for("missing").is_none());
    }
}

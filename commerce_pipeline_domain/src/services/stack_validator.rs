// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stack Validator
//!
//! Static capability-flow check over a stack. The reasoning model is
//! monotonic: walk the step list with an `available` set seeded from the
//! caller's `initial_paths`, assert `requires ⊆ available` before each step,
//! then union the step's `produces` into `available`. Conditions are ignored
//! here; a conditional step must still be statically satisfiable.
//!
//! Two processors producing the same path is allowed (later wins by merge
//! order); it is how `center-product` legitimately rewrites `images`.
//!
//! Swap validation is stricter: two processors are swappable iff their
//! declared requires and produces sets are identical, which guarantees that
//! every stack that validated before the swap validates after it.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use crate::services::processor_registry::ProcessorCatalog;
use crate::services::stack::StackTemplate;
use crate::value_objects::DataPath;

/// Outcome of a validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    /// First-violation messages; empty when valid.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Paths available after the final step (valid runs only).
    pub available_outputs: BTreeSet<DataPath>,
}

impl ValidationReport {
    fn failure(error: String) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            ..Default::default()
        }
    }
}

fn render_paths(paths: &BTreeSet<DataPath>) -> String {
    let names: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
    format!("[{}]", names.join(", "))
}

/// Statically validates a stack against a processor catalogue.
///
/// `initial_paths` models what the caller's starting data already satisfies;
/// it lets a stack begin at a processor that requires `video` without a
/// download step.
pub fn validate_stack(
    stack: &StackTemplate,
    catalog: &dyn ProcessorCatalog,
    initial_paths: &BTreeSet<DataPath>,
) -> ValidationReport {
    let mut available = initial_paths.clone();

    for (index, step) in stack.steps.iter().enumerate() {
        let io = match catalog.io_for(&step.processor) {
            Some(io) => io,
            None => {
                return ValidationReport::failure(format!(
                    "step {} of stack '{}': processor '{}' is not registered",
                    index, stack.id, step.processor
                ));
            }
        };

        for required in &io.requires {
            if !available.contains(required) {
                return ValidationReport::failure(format!(
                    "step {} of stack '{}': processor '{}' requires '{}' which is not \
                     available; currently available: {}",
                    index,
                    stack.id,
                    step.processor,
                    required.as_str(),
                    render_paths(&available)
                ));
            }
        }

        available.extend(io.produces.iter().cloned());
    }

    ValidationReport {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
        available_outputs: available,
    }
}

/// Validates a set of processor swaps: both ends must be registered and their
/// IO contracts identical. The error message quotes both processors' IO for
/// diagnostics.
pub fn validate_swaps(
    swaps: &std::collections::BTreeMap<String, String>,
    catalog: &dyn ProcessorCatalog,
) -> ValidationReport {
    for (original, replacement) in swaps {
        let original_io = match catalog.io_for(original) {
            Some(io) => io,
            None => {
                return ValidationReport::failure(format!(
                    "swap source '{}' is not registered",
                    original
                ));
            }
        };
        let replacement_io = match catalog.io_for(replacement) {
            Some(io) => io,
            None => {
                return ValidationReport::failure(format!(
                    "swap target '{}' is not registered",
                    replacement
                ));
            }
        };
        if !original_io.is_swap_compatible(&replacement_io) {
            return ValidationReport::failure(format!(
                "processors '{}' and '{}' are not swap-compatible: '{}' has {} but '{}' has {}",
                original,
                replacement,
                original,
                original_io.describe(),
                replacement,
                replacement_io.describe()
            ));
        }
    }

    ValidationReport {
        valid: true,
        ..Default::default()
    }
}

/// The paths a stack needs from its initial data: the first step's requires
/// (or none for an empty stack).
pub fn required_inputs(
    stack: &StackTemplate,
    catalog: &dyn ProcessorCatalog,
) -> Vec<DataPath> {
    stack
        .steps
        .first()
        .and_then(|step| catalog.io_for(&step.processor))
        .map(|io| io.requires)
        .unwrap_or_default()
}

/// The union of every step's produces.
pub fn produced_outputs(
    stack: &StackTemplate,
    catalog: &dyn ProcessorCatalog,
) -> BTreeSet<DataPath> {
    stack
        .steps
        .iter()
        .filter_map(|step| catalog.io_for(&step.processor))
        .flat_map(|io| io.produces)
        .collect()
}

#[derive(Clone)]
struct CachedSets {
    epoch: u64,
    required: Vec<DataPath>,
    produced: BTreeSet<DataPath>,
}

/// Cache of computed required/produced sets, keyed by template id (never by
/// pointer identity) and invalidated when the catalogue epoch moves.
#[derive(Default)]
pub struct IoSetCache {
    entries: RwLock<HashMap<String, CachedSets>>,
}

impl IoSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computed `(required_inputs, produced_outputs)` for a template.
    pub fn io_sets(
        &self,
        stack: &StackTemplate,
        catalog: &dyn ProcessorCatalog,
    ) -> (Vec<DataPath>, BTreeSet<DataPath>) {
        let epoch = catalog.epoch();
        {
            let entries = self.entries.read();
            if let Some(cached) = entries.get(&stack.id) {
                if cached.epoch == epoch {
                    return (cached.required.clone(), cached.produced.clone());
                }
            }
        }

        let required = required_inputs(stack, catalog);
        let produced = produced_outputs(stack, catalog);
        let mut entries = self.entries.write();
        entries.insert(
            stack.id.clone(),
            CachedSets {
                epoch,
                required: required.clone(),
                produced: produced.clone(),
            },
        );
        (required, produced)
    }
}

// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Services
//!
//! Stateless domain logic and the ports every stage calls into: the processor
//! contract and registry, stack templates with their validator and
//! configurator, the provider registry with A/B selection, and the credit /
//! notification ports.

pub mod credit_service;
pub mod notification;
pub mod processor;
pub mod processor_registry;
pub mod provider_registry;
pub mod providers;
pub mod stack;
pub mod stack_configurator;
pub mod stack_validator;

pub use credit_service::{CreditLedger, CreditReceipt};
pub use notification::{CallbackPayload, CallbackTransport};
pub use processor::{Processor, ProcessorIo, StepOptions, StepOutput};
pub use processor_registry::{ProcessorCatalog, ProcessorRegistry};
pub use provider_registry::{AbTest, AbVariant, ProviderRegistry, Selection};
pub use stack::{StackConfig, StackStep, StackTemplate, StepCondition, StepInsertion};
pub use stack_configurator::{apply_config, ConfiguredStack};
pub use stack_validator::{validate_stack, validate_swaps, IoSetCache, ValidationReport};

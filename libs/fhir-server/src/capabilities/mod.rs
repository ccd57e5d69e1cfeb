//! The capability adapter
//!
//! Reconciles two backend shapes behind one generic interface:
//!
//! - A *generic* backend implements [`GenericBackend`] directly, keyed on
//!   runtime resource-type strings.
//! - A *concrete* backend registers one handler per resource type and
//!   interaction in a [`CapabilityRegistry`] at construction time (the
//!   explicit-registration replacement for the reflective method-table
//!   introspection a dynamic language would use); [`GenericAdapter`]
//!   presents the generic view over it and synthesizes the
//!   CapabilityStatement from what was registered.
//!
//! The opposite direction — resource-typed calls over a generic backend —
//! is the [`typed`] module.

mod generic;
mod registry;
mod synthesis;
pub mod typed;

pub use generic::{GenericAdapter, GenericBackend, OperationScope};
pub use registry::{
    CapabilityBase, CapabilityRegistry, OperationBuilder, ResourceBuilder, SearchCapabilities,
    UpdateCapabilities, UpdateResult,
};
pub use synthesis::synthesize;

//! FHIR data models
//!
//! Version-agnostic Rust structures for the infrastructure resources the
//! kupfer server core manipulates directly, plus a dynamic [`Resource`]
//! view over arbitrary resource JSON.
//!
//! # Design Philosophy
//!
//! - **Version-agnostic core**: the modelled fields are those shared by
//!   FHIR R4, R4B, and R5. Anything else rides along in the flattened
//!   `extensions` map and survives a decode/encode round trip.
//! - **Dynamic everywhere else**: clinical resources (Patient, Observation,
//!   ...) are opaque to the core; they are carried as [`Resource`] and only
//!   inspected through `resourceType`/`id` and FHIRPath.
//! - **Strongly-typed where it matters**: CapabilityStatement,
//!   SearchParameter, OperationDefinition, OperationOutcome, Bundle and
//!   Parameters are the resources the server itself reads and writes, so
//!   they get real types.

pub mod bundle;
pub mod capability_statement;
pub mod operation_definition;
pub mod operation_outcome;
pub mod parameters;
pub mod release;
pub mod resource;
pub mod search_parameter;

pub use bundle::{Bundle, BundleEntry, BundleEntrySearch, BundleLink, BundleType, SearchEntryMode};
pub use capability_statement::{
    CapabilityStatement, CapabilityStatementKind, Implementation, Interaction, InteractionCode,
    Rest, RestMode, RestOperation, RestResource, RestSearchParam, Software,
};
pub use operation_definition::OperationDefinition;
pub use operation_outcome::{Issue, IssueSeverity, IssueType, OperationOutcome};
pub use parameters::{Parameters, ParametersParameter};
pub use release::FhirRelease;
pub use resource::{Resource, ResourceError, TypedResource};
pub use search_parameter::{SearchParamType, SearchParameter};

//! kupfer FHIR server
//!
//! A resource-oriented FHIR REST layer over a pluggable backend:
//!
//! - **Capability adapter** ([`capabilities`]): one generic dispatch
//!   interface over two backend shapes — direct [`GenericBackend`]
//!   implementations keyed on runtime type strings, and
//!   [`CapabilityRegistry`]-based backends with one registered handler
//!   per resource type and interaction. The CapabilityStatement is
//!   synthesized from the registrations.
//! - **REST router** ([`api::routes`]): the FHIR interaction table on
//!   axum, with `$operation` routes, format negotiation and derived
//!   Location headers.
//! - **Bundle builder** ([`api::bundle`]): searchset bundles with
//!   round-trip-stable self/next links.
//! - **Error translator** ([`error`]): OperationOutcome everywhere, HTTP
//!   status from the issue-code table.
//!
//! Persistence, auth and subscriptions are the backend's business; the
//! server owns no resource data and holds no per-request global state.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kupfer_server::{router, CapabilityBase, CapabilityRegistry, GenericAdapter, ServerConfig};
//!
//! let base = CapabilityBase::new("Example server", "http://fhir.example.com")
//!     .with_software("kupfer-example", "0.1.0");
//! let mut registry = CapabilityRegistry::new(base);
//! registry.resource("Patient").read(|id| async move { todo!() });
//!
//! let app = router(Arc::new(GenericAdapter::new(registry)), ServerConfig::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod api;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod state;

pub use api::content_negotiation::ContentFormat;
pub use api::routes::router;
pub use capabilities::{
    synthesize, typed, CapabilityBase, CapabilityRegistry, GenericAdapter, GenericBackend,
    OperationScope, SearchCapabilities, UpdateCapabilities, UpdateResult,
};
pub use config::ServerConfig;
pub use error::{status_for, Error, Result};
pub use state::AppState;

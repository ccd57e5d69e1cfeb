//! FHIRPath engine
//!
//! A tree-walking FHIRPath evaluator over FHIR resource JSON:
//!
//! ```text
//! Expression String
//!      |
//!   Lexer -> Tokens
//!      |
//!   Parser -> Expr (immutable, reusable)
//!      |
//!   Evaluator -> Collection
//! ```
//!
//! # Example
//!
//! ```rust
//! use kupfer_fhirpath::{EvalContext, Expression};
//! use serde_json::json;
//!
//! let patient = json!({
//!     "resourceType": "Patient",
//!     "name": [{"family": "Everyman", "given": ["Adam", "A."]}]
//! });
//!
//! let expr = Expression::parse("Patient.name.given.first()").unwrap();
//! let ctx = EvalContext::new().with_resource(&patient);
//! let result = expr.evaluate_resource(&ctx, &patient).unwrap();
//! assert_eq!(result.first().unwrap().render().as_deref(), Some("Adam"));
//! ```

pub mod ast;
pub mod context;
pub mod engine;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod parser;
mod temporal;
pub mod token;
pub mod value;

// Re-export main types
pub use context::{EvalContext, ResourceResolver};
pub use engine::{evaluate, Expression};
pub use error::{Error, Result};
pub use value::{Collection, Node, Value};

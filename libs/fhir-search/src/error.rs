//! Search engine errors
//!
//! Every message carries the failing parameter value so the REST layer can
//! surface it verbatim in an OperationOutcome.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unsupported search parameter: {0}")]
    UnsupportedParameter(String),

    #[error("unresolved search parameter definition: {0}")]
    UnresolvedDefinition(String),

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("invalid prefix: {prefix} for type {param_type}")]
    InvalidPrefix { prefix: String, param_type: String },

    #[error("malformed date: {0}")]
    MalformedDate(String),

    #[error("malformed number: {0}")]
    MalformedNumber(String),

    #[error("malformed quantity: {0}")]
    MalformedQuantity(String),

    #[error("malformed reference: {0}")]
    MalformedReference(String),

    #[error("invalid _count value: {0}")]
    InvalidCount(String),
}

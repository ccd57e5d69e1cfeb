//! Error types for the FHIRPath engine

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// FHIRPath parse and evaluation errors
///
/// Evaluation errors interrupt evaluation; they are never silently
/// swallowed into an empty collection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("expected a singleton collection, found {found} items")]
    SingletonRequired { found: usize },

    #[error("cannot convert {from} to {to}")]
    ConversionFailed { from: String, to: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("unknown variable: %{0}")]
    UnknownVariable(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self::Parse {
            message: message.into(),
            line,
            column,
        }
    }

    pub(crate) fn conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::ConversionFailed {
            from: from.into(),
            to: to.into(),
        }
    }
}

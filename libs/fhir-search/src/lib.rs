//! FHIR search query engine
//!
//! A bidirectional translator between URL query strings and a typed
//! parameter model, governed by the server's declared SearchParameters:
//!
//! - [`parse_query`] decodes query pairs into a [`ParameterMap`]
//!   (AND-of-OR groups of typed values) plus [`SearchOptions`].
//! - [`build_query`] emits the inverse, deterministically ordered and
//!   `_count`-stamped, so bundle self-links are round-trip stable.
//!
//! The ten value kinds, comparison prefixes, modifiers and the reserved
//! `_`-parameters follow the FHIR search grammar
//! (http://hl7.org/fhir/search.html).

pub mod build;
pub mod dates;
pub mod error;
pub mod escape;
pub mod options;
pub mod parse;
pub mod values;

pub use build::build_query;
pub use dates::{DatePrecision, SearchDate};
pub use error::{Error, Result};
pub use options::{Cursor, SearchOptions, SearchResult, SummaryMode};
pub use parse::{parse_query, DefinitionResolver, SearchConfig};
pub use values::{
    MatchAll, MatchAny, ParameterKey, ParameterMap, Prefix, ReferenceValue, SearchValue,
    TokenValue, ValueKind,
};

//! Typed search values
//!
//! The parameter map is AND-of-OR: repeating a parameter
//! (`?k=a&k=b`) ANDs the occurrences, commas within one occurrence
//! (`?k=a,b`) OR the alternatives. Every value carries an optional
//! comparison prefix.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::dates::SearchDate;

/// Comparison prefix on number, date and quantity values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Sa,
    Eb,
    Ap,
}

impl Prefix {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            "sa" => Some(Self::Sa),
            "eb" => Some(Self::Eb),
            "ap" => Some(Self::Ap),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Le => "le",
            Self::Sa => "sa",
            Self::Eb => "eb",
            Self::Ap => "ap",
        }
    }
}

/// One decoded search value: optional prefix plus the typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchValue {
    pub prefix: Option<Prefix>,
    pub kind: ValueKind,
}

impl SearchValue {
    pub fn new(kind: ValueKind) -> Self {
        Self { prefix: None, kind }
    }

    pub fn with_prefix(prefix: Prefix, kind: ValueKind) -> Self {
        Self {
            prefix: Some(prefix),
            kind,
        }
    }
}

/// The ten value kinds of the FHIR search grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Number(Decimal),
    Date(SearchDate),
    String(String),
    Token(TokenValue),
    Reference(ReferenceValue),
    Composite(Vec<String>),
    Quantity {
        value: Decimal,
        system: Option<String>,
        code: Option<String>,
    },
    Uri(String),
    Special(String),
    /// Bypass used when the declared type is not statically known.
    Raw(String),
}

/// Token: optional system plus code.
///
/// `system: None` means no `|` was written; `Some("")` is the explicit
/// "no system" form `|code`. An empty `code` with a system is the
/// "any code from that system" form `system|`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValue {
    pub system: Option<String>,
    pub code: String,
}

/// Reference: local `Type/id` (optionally versioned) or an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceValue {
    Local {
        resource_type: String,
        id: String,
        version: Option<String>,
    },
    Url {
        url: String,
        version: Option<String>,
    },
}

/// Key of the parameter map: parameter name plus optional modifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParameterKey {
    pub name: String,
    pub modifier: Option<String>,
}

impl ParameterKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifier: None,
        }
    }

    pub fn with_modifier(name: impl Into<String>, modifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifier: Some(modifier.into()),
        }
    }
}

/// An OR group: any of these values may match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchAny(pub Vec<SearchValue>);

/// AND of OR groups: every group must match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchAll(pub Vec<MatchAny>);

/// The full parsed query, deterministically ordered by key.
pub type ParameterMap = BTreeMap<ParameterKey, MatchAll>;

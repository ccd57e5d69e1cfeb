//! FHIR SearchParameter model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::resource::TypedResource;

/// FHIR SearchParameter resource
///
/// Defines one searchable field: its code, value type and the FHIRPath
/// expression extracting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParameter {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Canonical URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub name: String,

    pub status: String,

    /// The code used in query strings.
    pub code: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base: Vec<String>,

    #[serde(rename = "type")]
    pub param_type: SearchParamType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "SearchParameter".to_string()
}

impl TypedResource for SearchParameter {
    const TYPE: &'static str = "SearchParameter";
}

/// Search parameter value type
///
/// See http://hl7.org/fhir/valueset-search-param-type.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    Number,
    Date,
    String,
    Token,
    Reference,
    Composite,
    Quantity,
    Uri,
    Special,
}

impl SearchParamType {
    /// Whether query values of this type may start with a comparison prefix.
    pub fn allows_prefix(self) -> bool {
        matches!(self, Self::Number | Self::Date | Self::Quantity)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Date => "date",
            Self::String => "string",
            Self::Token => "token",
            Self::Reference => "reference",
            Self::Composite => "composite",
            Self::Quantity => "quantity",
            Self::Uri => "uri",
            Self::Special => "special",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "string" => Some(Self::String),
            "token" => Some(Self::Token),
            "reference" => Some(Self::Reference),
            "composite" => Some(Self::Composite),
            "quantity" => Some(Self::Quantity),
            "uri" => Some(Self::Uri),
            "special" => Some(Self::Special),
            _ => None,
        }
    }
}

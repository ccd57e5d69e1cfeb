//! FHIR Parameters model
//!
//! Operation inputs and outputs travel as Parameters resources. GET
//! invocations synthesize one from the query string; POST bodies carry one
//! directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::resource::TypedResource;

/// FHIR Parameters resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameter: Vec<ParametersParameter>,
}

fn default_resource_type() -> String {
    "Parameters".to_string()
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            resource_type: default_resource_type(),
            parameter: Vec::new(),
        }
    }

    /// Add a `valueString` parameter.
    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameter.push(ParametersParameter {
            name: name.into(),
            value_string: Some(value.into()),
            ..Default::default()
        });
        self
    }

    /// First parameter with the given name.
    pub fn find(&self, name: &str) -> Option<&ParametersParameter> {
        self.parameter.iter().find(|p| p.name == name)
    }
}

impl TypedResource for Parameters {
    const TYPE: &'static str = "Parameters";
}

/// A single operation parameter
///
/// Only the primitive `value[x]` choices the server itself produces are
/// modelled; everything else flows through the flattened map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParametersParameter {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_boolean: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_integer: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub part: Vec<ParametersParameter>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

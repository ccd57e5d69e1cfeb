//! FHIR OperationDefinition model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::resource::TypedResource;

/// FHIR OperationDefinition resource
///
/// Declares a custom `$code` operation: the levels it may be invoked at,
/// the resource types it applies to, and whether it affects server state
/// (which gates GET invocation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDefinition {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub name: String,

    pub status: String,

    /// "operation" or "query".
    pub kind: String,

    /// The `$code` used on the wire.
    pub code: String,

    /// Resource types the operation applies to; empty means any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,

    /// Legal invocation levels.
    pub system: bool,
    #[serde(rename = "type")]
    pub type_level: bool,
    pub instance: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub affects_state: Option<bool>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "OperationDefinition".to_string()
}

impl OperationDefinition {
    /// Minimal definition for a `$code` operation; callers flip the level
    /// booleans they support.
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            resource_type: default_resource_type(),
            id: None,
            url: None,
            name,
            status: "active".to_string(),
            kind: "operation".to_string(),
            code: code.into(),
            resource: Vec::new(),
            system: false,
            type_level: false,
            instance: false,
            affects_state: None,
            extensions: HashMap::new(),
        }
    }

    /// Whether the definition admits the given resource type (empty = any).
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.resource.is_empty() || self.resource.iter().any(|r| r == resource_type)
    }
}

impl TypedResource for OperationDefinition {
    const TYPE: &'static str = "OperationDefinition";
}

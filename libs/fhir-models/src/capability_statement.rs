//! FHIR CapabilityStatement model
//!
//! The subset the server synthesizes and the search engine reads: rest
//! resource entries with interactions, search parameters and operations,
//! plus the non-derivable header fields supplied by the backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::resource::TypedResource;
use crate::search_parameter::SearchParamType;

/// FHIR CapabilityStatement resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatement {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    pub kind: CapabilityStatementKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<Software>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Implementation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rest: Vec<Rest>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "CapabilityStatement".to_string()
}

impl CapabilityStatement {
    /// The server-mode rest entry, if present.
    pub fn server_rest(&self) -> Option<&Rest> {
        self.rest.iter().find(|r| r.mode == RestMode::Server)
    }

    /// Look up a rest resource entry by type.
    pub fn rest_resource(&self, resource_type: &str) -> Option<&RestResource> {
        self.server_rest()?
            .resource
            .iter()
            .find(|r| r.resource_type == resource_type)
    }

    /// The implementation base URL (required for canonical URL synthesis).
    pub fn implementation_url(&self) -> Option<&str> {
        self.implementation.as_ref()?.url.as_deref()
    }
}

impl TypedResource for CapabilityStatement {
    const TYPE: &'static str = "CapabilityStatement";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityStatementKind {
    Instance,
    Capability,
    Requirements,
}

/// Software producing this capability statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Software {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A specific installation, carrying the canonical base URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One rest element (server or client mode)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rest {
    pub mode: RestMode,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<RestResource>,

    /// System-level operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<RestOperation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestMode {
    Client,
    Server,
}

/// Per-resource-type capability declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RestResource {
    #[serde(rename = "type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interaction: Vec<Interaction>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_create: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_param: Vec<RestSearchParam>,

    /// Type- and instance-level operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<RestOperation>,
}

/// Declared interaction on a resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub code: InteractionCode,
}

/// Interaction codes the server dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionCode {
    Create,
    Read,
    Update,
    Delete,
    SearchType,
}

impl InteractionCode {
    /// Fixed declaration order used during synthesis.
    pub fn order(self) -> u8 {
        match self {
            Self::Create => 0,
            Self::Read => 1,
            Self::Update => 2,
            Self::Delete => 3,
            Self::SearchType => 4,
        }
    }
}

/// Declared search parameter on a resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestSearchParam {
    pub name: String,

    /// Canonical URL of the defining SearchParameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,

    #[serde(rename = "type")]
    pub param_type: SearchParamType,
}

/// Declared operation (system, type or instance level)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestOperation {
    pub name: String,

    /// Canonical URL of the defining OperationDefinition.
    pub definition: String,
}

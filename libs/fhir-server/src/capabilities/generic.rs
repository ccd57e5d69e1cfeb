//! The generic backend interface and the registry-backed adapter.

use std::sync::OnceLock;

use async_trait::async_trait;
use kupfer_models::{CapabilityStatement, OperationDefinition, Parameters, Resource};
use kupfer_search::{Cursor, ParameterMap, SearchOptions, SearchResult};

use super::registry::CapabilityRegistry;
use super::synthesis;
use crate::error::{Error, Result};

/// Where an operation invocation is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationScope<'a> {
    System,
    Type { resource_type: &'a str },
    Instance { resource_type: &'a str, id: &'a str },
}

impl OperationScope<'_> {
    pub fn resource_type(&self) -> Option<&str> {
        match self {
            Self::System => None,
            Self::Type { resource_type } | Self::Instance { resource_type, .. } => {
                Some(resource_type)
            }
        }
    }
}

/// The single polymorphic backend interface the router dispatches to.
///
/// Backends keyed on runtime type strings implement this directly;
/// registry-based backends get it through [`GenericAdapter`]. All methods
/// may suspend (the backend owns storage and may perform arbitrary I/O);
/// dropping the future cancels the in-flight call.
#[async_trait]
pub trait GenericBackend: Send + Sync {
    async fn capability_statement(&self) -> Result<CapabilityStatement>;

    async fn read(&self, resource_type: &str, id: &str) -> Result<Resource>;

    async fn search(
        &self,
        resource_type: &str,
        params: ParameterMap,
        options: SearchOptions,
    ) -> Result<SearchResult>;

    async fn create(&self, resource: Resource) -> Result<Resource>;

    async fn update(&self, resource: Resource) -> Result<super::UpdateResult>;

    async fn delete(&self, resource_type: &str, id: &str) -> Result<()>;

    /// The definition governing `$code`, used for dispatch validation.
    async fn operation_definition(&self, code: &str) -> Result<OperationDefinition>;

    async fn invoke(
        &self,
        code: &str,
        scope: OperationScope<'_>,
        parameters: Parameters,
    ) -> Result<Resource>;
}

/// Generic view over a [`CapabilityRegistry`].
///
/// Unregistered interactions surface as `not-supported` outcomes; the
/// CapabilityStatement and the SearchParameter resources are synthesized
/// from the registrations and memoized for the process lifetime.
pub struct GenericAdapter {
    registry: CapabilityRegistry,
    statement: OnceLock<CapabilityStatement>,
    search_parameters: OnceLock<std::collections::BTreeMap<String, kupfer_models::SearchParameter>>,
}

impl GenericAdapter {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self {
            registry,
            statement: OnceLock::new(),
            search_parameters: OnceLock::new(),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    fn synthesized_statement(&self) -> Result<&CapabilityStatement> {
        if let Some(statement) = self.statement.get() {
            return Ok(statement);
        }
        let statement = synthesis::synthesize(&self.registry)?;
        Ok(self.statement.get_or_init(|| statement))
    }

    fn synthesized_parameters(
        &self,
    ) -> Result<&std::collections::BTreeMap<String, kupfer_models::SearchParameter>> {
        if let Some(params) = self.search_parameters.get() {
            return Ok(params);
        }
        let params = synthesis::synthesized_search_parameters(&self.registry)?;
        Ok(self.search_parameters.get_or_init(|| params))
    }

    /// Numeric-offset pagination over the synthesized SearchParameter
    /// set; real backends use opaque cursors of their own.
    fn search_parameter_fallback(&self, options: &SearchOptions) -> Result<SearchResult> {
        let all = self.synthesized_parameters()?;
        let offset = match &options.cursor {
            Some(cursor) => cursor.offset().map_err(Error::Search)?,
            None => 0,
        };
        let page: Vec<Resource> = all
            .values()
            .skip(offset)
            .take(options.count)
            .map(|p| {
                serde_json::to_value(p)
                    .map_err(anyhow::Error::from)
                    .and_then(|v| Resource::from_value(v).map_err(anyhow::Error::from))
                    .map_err(Error::Other)
            })
            .collect::<Result<_>>()?;
        let next = if offset + page.len() < all.len() && !page.is_empty() {
            Some(Cursor::from(offset + page.len()))
        } else {
            None
        };
        Ok(SearchResult {
            resources: page,
            included: Vec::new(),
            next,
        })
    }
}

#[async_trait]
impl GenericBackend for GenericAdapter {
    async fn capability_statement(&self) -> Result<CapabilityStatement> {
        self.synthesized_statement().cloned()
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<Resource> {
        if let Some(handler) = self
            .registry
            .resources
            .get(resource_type)
            .and_then(|r| r.read.as_ref())
        {
            return handler(id.to_string()).await;
        }
        // SearchParameter reads fall back to the synthesized set.
        if resource_type == "SearchParameter" {
            if let Some(parameter) = self.synthesized_parameters()?.get(id) {
                let value = serde_json::to_value(parameter).map_err(anyhow::Error::from)?;
                return Resource::from_value(value).map_err(Into::into);
            }
            return Err(Error::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            });
        }
        Err(not_implemented("read", resource_type))
    }

    async fn search(
        &self,
        resource_type: &str,
        params: ParameterMap,
        options: SearchOptions,
    ) -> Result<SearchResult> {
        if let Some((handler, _)) = self
            .registry
            .resources
            .get(resource_type)
            .and_then(|r| r.search.as_ref())
        {
            return handler(params, options).await;
        }
        if resource_type == "SearchParameter" {
            return self.search_parameter_fallback(&options);
        }
        Err(not_implemented("search", resource_type))
    }

    async fn create(&self, resource: Resource) -> Result<Resource> {
        let resource_type = resource.resource_type().to_string();
        let handler = self
            .registry
            .resources
            .get(&resource_type)
            .and_then(|r| r.create.as_ref())
            .ok_or_else(|| not_implemented("create", &resource_type))?;
        handler(resource).await
    }

    async fn update(&self, resource: Resource) -> Result<super::UpdateResult> {
        let resource_type = resource.resource_type().to_string();
        let (handler, _) = self
            .registry
            .resources
            .get(&resource_type)
            .and_then(|r| r.update.as_ref())
            .ok_or_else(|| not_implemented("update", &resource_type))?;
        handler(resource).await
    }

    async fn delete(&self, resource_type: &str, id: &str) -> Result<()> {
        let handler = self
            .registry
            .resources
            .get(resource_type)
            .and_then(|r| r.delete.as_ref())
            .ok_or_else(|| not_implemented("delete", resource_type))?;
        handler(id.to_string()).await
    }

    async fn operation_definition(&self, code: &str) -> Result<OperationDefinition> {
        self.registry
            .operation_by_code(code)
            .map(|op| op.definition.clone())
            .ok_or_else(|| not_implemented(&format!("operation ${code}"), "server"))
    }

    async fn invoke(
        &self,
        code: &str,
        scope: OperationScope<'_>,
        parameters: Parameters,
    ) -> Result<Resource> {
        let operation = self
            .registry
            .operation_by_code(code)
            .ok_or_else(|| not_implemented(&format!("operation ${code}"), "server"))?;

        // Dispatch to the handler matching the invocation shape; the most
        // specific registered level wins.
        match scope {
            OperationScope::Instance { resource_type, id } => {
                if let Some(handler) = &operation.instance {
                    return handler(
                        resource_type.to_string(),
                        id.to_string(),
                        parameters,
                    )
                    .await;
                }
                Err(not_implemented(&format!("operation ${code}"), resource_type))
            }
            OperationScope::Type { resource_type } => {
                if let Some(handler) = &operation.type_level {
                    return handler(resource_type.to_string(), parameters).await;
                }
                Err(not_implemented(&format!("operation ${code}"), resource_type))
            }
            OperationScope::System => {
                if let Some(handler) = &operation.system {
                    return handler(parameters).await;
                }
                Err(not_implemented(&format!("operation ${code}"), "server"))
            }
        }
    }
}

fn not_implemented(interaction: &str, resource_type: &str) -> Error {
    Error::NotImplemented {
        interaction: interaction.to_string(),
        resource_type: resource_type.to_string(),
    }
}

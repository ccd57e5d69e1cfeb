//! Capability registration
//!
//! A concrete backend declares what it supports by registering handlers,
//! one per resource type and interaction, plus operations with their
//! OperationDefinitions. The registry is assembled once at construction
//! time and is immutable afterwards; everything the server exposes —
//! dispatch and the synthesized CapabilityStatement — derives from it.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use kupfer_models::{
    CapabilityStatementKind, FhirRelease, OperationDefinition, Parameters, Resource,
    SearchParameter, Software,
};
use kupfer_search::{ParameterMap, SearchOptions, SearchResult};

use crate::error::Result;

/// The non-derivable header fields of the CapabilityStatement, supplied
/// by the backend author.
#[derive(Debug, Clone)]
pub struct CapabilityBase {
    pub status: String,
    pub kind: CapabilityStatementKind,
    pub software: Option<Software>,
    pub description: String,
    /// Base URL of this installation; required, it anchors every
    /// synthesized canonical URL.
    pub implementation_url: Option<String>,
    pub release: FhirRelease,
    /// Fixed statement date; kept off the wall clock so identical
    /// backends yield byte-identical statements across runs.
    pub date: Option<String>,
    pub formats: Vec<String>,
}

impl CapabilityBase {
    pub fn new(description: impl Into<String>, implementation_url: impl Into<String>) -> Self {
        Self {
            status: "active".to_string(),
            kind: CapabilityStatementKind::Instance,
            software: None,
            description: description.into(),
            implementation_url: Some(implementation_url.into()),
            release: FhirRelease::default(),
            date: None,
            formats: vec![
                "application/fhir+json".to_string(),
                "application/fhir+xml".to_string(),
            ],
        }
    }

    pub fn with_software(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.software = Some(Software {
            name: name.into(),
            version: Some(version.into()),
        });
        self
    }

    pub fn with_release(mut self, release: FhirRelease) -> Self {
        self.release = release;
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// Update capability declaration.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateCapabilities {
    /// Whether update may create a missing resource (`updateCreate`).
    pub update_create: bool,
}

/// Search capability declaration: the SearchParameter definitions this
/// resource type supports.
#[derive(Debug, Clone, Default)]
pub struct SearchCapabilities {
    pub parameters: Vec<SearchParameter>,
}

/// Outcome of an update: the stored resource plus whether it was created.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub resource: Resource,
    pub created: bool,
}

pub(crate) type ReadHandler =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Resource>> + Send + Sync>;
pub(crate) type CreateHandler =
    Arc<dyn Fn(Resource) -> BoxFuture<'static, Result<Resource>> + Send + Sync>;
pub(crate) type UpdateHandler =
    Arc<dyn Fn(Resource) -> BoxFuture<'static, Result<UpdateResult>> + Send + Sync>;
pub(crate) type DeleteHandler =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;
pub(crate) type SearchHandler = Arc<
    dyn Fn(ParameterMap, SearchOptions) -> BoxFuture<'static, Result<SearchResult>> + Send + Sync,
>;
pub(crate) type SystemInvokeHandler =
    Arc<dyn Fn(Parameters) -> BoxFuture<'static, Result<Resource>> + Send + Sync>;
pub(crate) type TypeInvokeHandler =
    Arc<dyn Fn(String, Parameters) -> BoxFuture<'static, Result<Resource>> + Send + Sync>;
pub(crate) type InstanceInvokeHandler =
    Arc<dyn Fn(String, String, Parameters) -> BoxFuture<'static, Result<Resource>> + Send + Sync>;

#[derive(Default)]
pub(crate) struct ResourceCapability {
    pub(crate) read: Option<ReadHandler>,
    pub(crate) create: Option<CreateHandler>,
    pub(crate) update: Option<(UpdateHandler, UpdateCapabilities)>,
    pub(crate) delete: Option<DeleteHandler>,
    pub(crate) search: Option<(SearchHandler, SearchCapabilities)>,
}

pub(crate) struct OperationCapability {
    pub(crate) definition: OperationDefinition,
    pub(crate) system: Option<SystemInvokeHandler>,
    pub(crate) type_level: Option<TypeInvokeHandler>,
    pub(crate) instance: Option<InstanceInvokeHandler>,
}

/// The registry a concrete backend assembles at construction time.
pub struct CapabilityRegistry {
    pub(crate) base: CapabilityBase,
    pub(crate) resources: BTreeMap<String, ResourceCapability>,
    pub(crate) operations: Vec<OperationCapability>,
}

impl CapabilityRegistry {
    pub fn new(base: CapabilityBase) -> Self {
        Self {
            base,
            resources: BTreeMap::new(),
            operations: Vec::new(),
        }
    }

    pub fn base(&self) -> &CapabilityBase {
        &self.base
    }

    /// Register (or extend) a resource type.
    pub fn resource(&mut self, resource_type: impl Into<String>) -> ResourceBuilder<'_> {
        let entry = self.resources.entry(resource_type.into()).or_default();
        ResourceBuilder { entry }
    }

    /// Register an operation. Registering a handler for a level also
    /// declares that level on the definition, so the declaration and the
    /// dispatchable surface cannot drift apart.
    pub fn operation(&mut self, definition: OperationDefinition) -> OperationBuilder<'_> {
        self.operations.push(OperationCapability {
            definition,
            system: None,
            type_level: None,
            instance: None,
        });
        let entry = self.operations.last_mut().expect("just pushed");
        OperationBuilder { entry }
    }

    pub(crate) fn operation_by_code(&self, code: &str) -> Option<&OperationCapability> {
        self.operations.iter().find(|op| op.definition.code == code)
    }
}

/// Per-resource-type registration surface.
pub struct ResourceBuilder<'a> {
    entry: &'a mut ResourceCapability,
}

impl ResourceBuilder<'_> {
    pub fn read<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Resource>> + Send + 'static,
    {
        self.entry.read = Some(Arc::new(move |id| Box::pin(handler(id))));
        self
    }

    pub fn create<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(Resource) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Resource>> + Send + 'static,
    {
        self.entry.create = Some(Arc::new(move |resource| Box::pin(handler(resource))));
        self
    }

    pub fn update<F, Fut>(self, capabilities: UpdateCapabilities, handler: F) -> Self
    where
        F: Fn(Resource) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<UpdateResult>> + Send + 'static,
    {
        self.entry.update = Some((
            Arc::new(move |resource| Box::pin(handler(resource))),
            capabilities,
        ));
        self
    }

    pub fn delete<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.entry.delete = Some(Arc::new(move |id| Box::pin(handler(id))));
        self
    }

    pub fn search<F, Fut>(self, capabilities: SearchCapabilities, handler: F) -> Self
    where
        F: Fn(ParameterMap, SearchOptions) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<SearchResult>> + Send + 'static,
    {
        self.entry.search = Some((
            Arc::new(move |params, options| Box::pin(handler(params, options))),
            capabilities,
        ));
        self
    }
}

/// Per-operation registration surface.
pub struct OperationBuilder<'a> {
    entry: &'a mut OperationCapability,
}

impl OperationBuilder<'_> {
    pub fn system<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Resource>> + Send + 'static,
    {
        self.entry.definition.system = true;
        self.entry.system = Some(Arc::new(move |params| Box::pin(handler(params))));
        self
    }

    pub fn type_level<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(String, Parameters) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Resource>> + Send + 'static,
    {
        self.entry.definition.type_level = true;
        self.entry.type_level = Some(Arc::new(move |resource_type, params| {
            Box::pin(handler(resource_type, params))
        }));
        self
    }

    pub fn instance<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(String, String, Parameters) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Resource>> + Send + 'static,
    {
        self.entry.definition.instance = true;
        self.entry.instance = Some(Arc::new(move |resource_type, id, params| {
            Box::pin(handler(resource_type, id, params))
        }));
        self
    }
}

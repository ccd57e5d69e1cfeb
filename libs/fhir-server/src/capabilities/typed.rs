//! Resource-typed calls over a generic backend.
//!
//! The inverse adaptation direction: statically-typed wrappers that call
//! the generic method, unwrap any contained-resource envelope
//! (`Parameters`/one-entry `Bundle`), assert the expected resource type
//! and decode. Used by embedding applications that work with typed
//! models.

use kupfer_models::{Parameters, Resource, TypedResource};
use kupfer_search::{ParameterMap, SearchOptions};

use super::generic::{GenericBackend, OperationScope};
use crate::error::Result;

pub async fn read<T: TypedResource>(backend: &dyn GenericBackend, id: &str) -> Result<T> {
    let resource = backend.read(T::TYPE, id).await?;
    decode(resource)
}

pub async fn create<T: TypedResource>(backend: &dyn GenericBackend, resource: &T) -> Result<T> {
    let created = backend.create(to_resource(resource)?).await?;
    decode(created)
}

/// Typed update; returns the stored resource and whether it was created.
pub async fn update<T: TypedResource>(
    backend: &dyn GenericBackend,
    resource: &T,
) -> Result<(T, bool)> {
    let result = backend.update(to_resource(resource)?).await?;
    Ok((decode(result.resource)?, result.created))
}

pub async fn delete<T: TypedResource>(backend: &dyn GenericBackend, id: &str) -> Result<()> {
    backend.delete(T::TYPE, id).await
}

/// Typed search: every match must decode as `T`; includes stay dynamic.
pub async fn search<T: TypedResource>(
    backend: &dyn GenericBackend,
    params: ParameterMap,
    options: SearchOptions,
) -> Result<(Vec<T>, Option<kupfer_search::Cursor>)> {
    let result = backend.search(T::TYPE, params, options).await?;
    let mut resources = Vec::with_capacity(result.resources.len());
    for resource in result.resources {
        resources.push(decode(resource)?);
    }
    Ok((resources, result.next))
}

/// Typed operation invocation.
pub async fn invoke<T: TypedResource>(
    backend: &dyn GenericBackend,
    code: &str,
    scope: OperationScope<'_>,
    parameters: Parameters,
) -> Result<T> {
    let result = backend.invoke(code, scope, parameters).await?;
    decode(result)
}

fn decode<T: TypedResource>(resource: Resource) -> Result<T> {
    Ok(resource.unwrap_envelope().decode::<T>()?)
}

fn to_resource<T: TypedResource>(resource: &T) -> Result<Resource> {
    Ok(resource.to_resource()?)
}

//! CRUD interactions: read, create, update, delete.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use kupfer_models::Resource;
use uuid::Uuid;

use super::resource_response;
use crate::api::content_negotiation::{parse_body, request_format, response_format};
use crate::api::url::base_url_from_headers;
use crate::error::{Error, Result};
use crate::state::AppState;

pub async fn read(
    state: &AppState,
    headers: &HeaderMap,
    query: &[(String, String)],
    resource_type: &str,
    id: &str,
) -> Result<Response> {
    ensure_known_type(state, resource_type).await?;
    let format = response_format(query, headers, state.config.default_format);
    let resource = state.backend.read(resource_type, id).await?;
    resource_response(resource.as_value(), format, StatusCode::OK)
}

pub async fn create(
    state: &AppState,
    headers: &HeaderMap,
    query: &[(String, String)],
    resource_type: &str,
    body: &[u8],
) -> Result<Response> {
    ensure_known_type(state, resource_type).await?;
    let mut resource = decode_body(state, headers, query, resource_type, body)?;

    // The server assigns the id; a client-supplied one is discarded.
    let id = Uuid::new_v4().to_string();
    resource.set_id(&id);

    let created = state.backend.create(resource).await?;
    let location = format!(
        "{}/{}/{}",
        base_url_from_headers(headers),
        created.resource_type(),
        created.resource_id().unwrap_or(&id)
    );

    let format = response_format(query, headers, state.config.default_format);
    let mut response = resource_response(created.as_value(), format, StatusCode::CREATED)?;
    response.headers_mut().insert(
        header::LOCATION,
        location.parse().map_err(|_| {
            Error::Validation("derived Location header is not a valid header value".to_string())
        })?,
    );
    Ok(response)
}

pub async fn update(
    state: &AppState,
    headers: &HeaderMap,
    query: &[(String, String)],
    resource_type: &str,
    id: &str,
    body: &[u8],
) -> Result<Response> {
    ensure_known_type(state, resource_type).await?;
    let mut resource = decode_body(state, headers, query, resource_type, body)?;

    match resource.resource_id() {
        Some(body_id) if body_id != id => {
            return Err(Error::Validation(format!(
                "resource id '{body_id}' does not match URL id '{id}'"
            )));
        }
        Some(_) => {}
        None => resource.set_id(id),
    }

    let result = state.backend.update(resource).await?;
    let format = response_format(query, headers, state.config.default_format);
    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let mut response = resource_response(result.resource.as_value(), format, status)?;
    if result.created {
        let location = format!("{}/{resource_type}/{id}", base_url_from_headers(headers));
        if let Ok(value) = location.parse() {
            response.headers_mut().insert(header::LOCATION, value);
        }
    }
    Ok(response)
}

pub async fn delete(state: &AppState, resource_type: &str, id: &str) -> Result<Response> {
    ensure_known_type(state, resource_type).await?;
    state.backend.delete(resource_type, id).await?;
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(axum::body::Body::empty())
        .expect("static response"))
}

/// Validation errors surface at the router and never reach the backend.
async fn ensure_known_type(state: &AppState, resource_type: &str) -> Result<()> {
    let statement = state.capabilities().await?;
    if statement.rest_resource(resource_type).is_none() {
        return Err(Error::Validation(format!(
            "unknown resource type: {resource_type}"
        )));
    }
    Ok(())
}

fn decode_body(
    state: &AppState,
    headers: &HeaderMap,
    query: &[(String, String)],
    resource_type: &str,
    body: &[u8],
) -> Result<Resource> {
    let format = request_format(query, headers, state.config.default_format);
    let value = parse_body(body, format)?;
    let resource = Resource::from_value(value).map_err(|e| Error::Validation(e.to_string()))?;
    if resource.resource_type() != resource_type {
        return Err(Error::Validation(format!(
            "body resourceType '{}' does not match URL resource type '{resource_type}'",
            resource.resource_type()
        )));
    }
    Ok(resource)
}

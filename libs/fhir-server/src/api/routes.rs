//! FHIR REST routes
//!
//! The interaction table:
//!
//! | Method     | Path                  | Interaction        |
//! |------------|-----------------------|--------------------|
//! | GET        | `/metadata`           | capabilities       |
//! | POST       | `/{type}`             | create             |
//! | GET        | `/{type}/{id}`        | read               |
//! | PUT        | `/{type}/{id}`        | update             |
//! | DELETE     | `/{type}/{id}`        | delete             |
//! | GET        | `/{type}`             | search             |
//! | GET/POST   | `/${code}`            | system operation   |
//! | GET/POST   | `/{type}/${code}`     | type operation     |
//! | GET/POST   | `/{type}/{id}/${code}`| instance operation |
//!
//! A trailing segment starting with `$` is an operation and takes
//! precedence over the CRUD interpretation of the same shape, so the
//! shared-route handlers check the `$` prefix first.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use super::handlers::{crud, metadata, operations, query_pairs, search};
use crate::capabilities::{GenericBackend, OperationScope};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::state::AppState;

/// Build the FHIR router over a generic backend.
pub fn router(backend: Arc<dyn GenericBackend>, config: ServerConfig) -> Router {
    let state = AppState::new(backend, config);
    Router::new()
        .route("/metadata", get(metadata::capability_statement))
        .route("/:segment", get(root_get).post(root_post))
        .route(
            "/:rtype/:segment",
            get(type_get)
                .post(type_post)
                .put(update_resource)
                .delete(delete_resource),
        )
        .route(
            "/:rtype/:id/:operation",
            get(instance_operation).post(instance_operation),
        )
        .with_state(state)
}

/// GET /{segment}: system operation when `$`-prefixed, else search.
async fn root_get(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Result<Response> {
    let query = query_pairs(raw_query.as_deref());
    if segment.starts_with('$') {
        return operations::invoke(
            &state,
            &headers,
            &query,
            &Method::GET,
            OperationScope::System,
            &segment,
            &[],
        )
        .await;
    }
    search::search(&state, &headers, &query, &segment).await
}

/// POST /{segment}: system operation when `$`-prefixed, else create.
async fn root_post(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let query = query_pairs(raw_query.as_deref());
    if segment.starts_with('$') {
        return operations::invoke(
            &state,
            &headers,
            &query,
            &Method::POST,
            OperationScope::System,
            &segment,
            &body,
        )
        .await;
    }
    crud::create(&state, &headers, &query, &segment, &body).await
}

/// GET /{type}/{segment}: type operation when `$`-prefixed, else read.
async fn type_get(
    State(state): State<AppState>,
    Path((rtype, segment)): Path<(String, String)>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Result<Response> {
    let query = query_pairs(raw_query.as_deref());
    if segment.starts_with('$') {
        return operations::invoke(
            &state,
            &headers,
            &query,
            &Method::GET,
            OperationScope::Type {
                resource_type: &rtype,
            },
            &segment,
            &[],
        )
        .await;
    }
    crud::read(&state, &headers, &query, &rtype, &segment).await
}

/// POST /{type}/{segment}: only the type-operation shape is defined.
async fn type_post(
    State(state): State<AppState>,
    Path((rtype, segment)): Path<(String, String)>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let query = query_pairs(raw_query.as_deref());
    if segment.starts_with('$') {
        return operations::invoke(
            &state,
            &headers,
            &query,
            &Method::POST,
            OperationScope::Type {
                resource_type: &rtype,
            },
            &segment,
            &body,
        )
        .await;
    }
    Err(Error::Validation(
        "POST is not supported on instance URLs".to_string(),
    ))
}

async fn update_resource(
    State(state): State<AppState>,
    Path((rtype, id)): Path<(String, String)>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let query = query_pairs(raw_query.as_deref());
    crud::update(&state, &headers, &query, &rtype, &id, &body).await
}

async fn delete_resource(
    State(state): State<AppState>,
    Path((rtype, id)): Path<(String, String)>,
) -> Result<Response> {
    crud::delete(&state, &rtype, &id).await
}

/// GET/POST /{type}/{id}/{$code}: instance operation.
async fn instance_operation(
    State(state): State<AppState>,
    Path((rtype, id, operation)): Path<(String, String, String)>,
    RawQuery(raw_query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    if !operation.starts_with('$') {
        return Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(axum::body::Body::empty())
            .expect("static response"));
    }
    let query = query_pairs(raw_query.as_deref());
    operations::invoke(
        &state,
        &headers,
        &query,
        &method,
        OperationScope::Instance {
            resource_type: &rtype,
            id: &id,
        },
        &operation,
        &body,
    )
    .await
}

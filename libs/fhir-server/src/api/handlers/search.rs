//! The search interaction (GET /{type}).

use std::collections::HashMap;

use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use kupfer_models::SearchParameter;
use kupfer_search::parse_query;

use super::resource_response;
use crate::api::bundle;
use crate::api::content_negotiation::response_format;
use crate::api::url::base_url_from_headers;
use crate::error::{Error, Result};
use crate::state::AppState;

pub async fn search(
    state: &AppState,
    headers: &HeaderMap,
    query: &[(String, String)],
    resource_type: &str,
) -> Result<Response> {
    let statement = state.capabilities().await?;
    if statement.rest_resource(resource_type).is_none() {
        return Err(Error::Validation(format!(
            "unknown resource type: {resource_type}"
        )));
    }

    // Resolve the canonical definitions the query actually references,
    // once per request, so the parser can refine declared types.
    let definitions = resolve_definitions(state, resource_type, query).await;
    let resolver = |canonical: &str| definitions.get(canonical).cloned();

    let (params, options) = parse_query(
        statement,
        resource_type,
        &resolver,
        query,
        &state.config.search_config(),
    )?;

    let result = state
        .backend
        .search(resource_type, params.clone(), options.clone())
        .await?;

    tracing::debug!(
        resource_type,
        matches = result.resources.len(),
        included = result.included.len(),
        has_next = result.next.is_some(),
        "search complete"
    );

    let base_url = base_url_from_headers(headers);
    let bundle = bundle::searchset(&base_url, resource_type, result, &params, &options);
    let value = serde_json::to_value(&bundle).map_err(|e| Error::Other(e.into()))?;
    let format = response_format(query, headers, state.config.default_format);
    resource_response(&value, format, StatusCode::OK)
}

/// Per-request definition cache: fetch the SearchParameter behind each
/// canonical URL referenced by a query key, through the backend's own
/// (possibly synthesized) SearchParameter reads. Failures degrade to the
/// type declared in the CapabilityStatement.
async fn resolve_definitions(
    state: &AppState,
    resource_type: &str,
    query: &[(String, String)],
) -> HashMap<String, SearchParameter> {
    let mut definitions = HashMap::new();
    let Ok(statement) = state.capabilities().await else {
        return definitions;
    };
    let Some(resource) = statement.rest_resource(resource_type) else {
        return definitions;
    };

    for (key, _) in query {
        if key.starts_with('_') {
            continue;
        }
        let name = key.split(':').next().unwrap_or(key);
        let Some(declared) = resource.search_param.iter().find(|p| p.name == name) else {
            continue;
        };
        let Some(canonical) = &declared.definition else {
            continue;
        };
        if definitions.contains_key(canonical) {
            continue;
        }
        let Some(id) = canonical.rsplit('/').next() else {
            continue;
        };
        if let Ok(resource) = state.backend.read("SearchParameter", id).await {
            if let Ok(parameter) = resource.decode::<SearchParameter>() {
                definitions.insert(canonical.clone(), parameter);
            }
        }
    }
    definitions
}

//! The capabilities interaction (GET /metadata).

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use super::{query_pairs, resource_response};
use crate::api::content_negotiation::response_format;
use crate::error::{Error, Result};
use crate::state::AppState;

pub async fn capability_statement(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Result<Response> {
    let query = query_pairs(raw_query.as_deref());
    let format = response_format(&query, &headers, state.config.default_format);
    let statement = state.capabilities().await?;
    let value = serde_json::to_value(statement).map_err(|e| Error::Other(e.into()))?;
    resource_response(&value, format, StatusCode::OK)
}

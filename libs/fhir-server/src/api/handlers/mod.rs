//! Request handlers, shared plumbing first.

pub mod crud;
pub mod metadata;
pub mod operations;
pub mod search;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde_json::Value;

use crate::api::content_negotiation::{self, ContentFormat};
use crate::error::{Error, Result};

/// Decode the raw query string into ordered pairs.
pub(crate) fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Serialize a resource in the negotiated format.
pub(crate) fn resource_response(
    value: &Value,
    format: ContentFormat,
    status: StatusCode,
) -> Result<Response> {
    let body = content_negotiation::render(value, format)?;
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, format.content_type())
        .body(Body::from(body))
        .map_err(|e| Error::Other(e.into()))
}

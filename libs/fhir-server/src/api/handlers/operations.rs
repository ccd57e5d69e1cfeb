//! Operation invocation (`$code` routes).
//!
//! Validation before dispatch: the OperationDefinition must declare the
//! invoked level, the resource type must be admitted (an empty resource
//! list means any), and state-affecting operations reject GET.

use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use kupfer_models::{Parameters, ParametersParameter};

use super::resource_response;
use crate::api::content_negotiation::{parse_body, request_format, response_format};
use crate::capabilities::OperationScope;
use crate::error::{Error, Result};
use crate::state::AppState;

pub async fn invoke(
    state: &AppState,
    headers: &HeaderMap,
    query: &[(String, String)],
    method: &Method,
    scope: OperationScope<'_>,
    code_segment: &str,
    body: &[u8],
) -> Result<Response> {
    let code = code_segment
        .strip_prefix('$')
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Validation(format!("invalid operation route: {code_segment}")))?;

    let definition = state.backend.operation_definition(code).await?;

    let level_declared = match scope {
        OperationScope::System => definition.system,
        OperationScope::Type { .. } => definition.type_level,
        OperationScope::Instance { .. } => definition.instance,
    };
    if !level_declared {
        return Err(Error::Validation(format!(
            "operation ${code} is not defined at the {} level",
            scope_name(&scope)
        )));
    }
    if let Some(resource_type) = scope.resource_type() {
        if !definition.applies_to(resource_type) {
            return Err(Error::OperationLevelMismatch(resource_type.to_string()));
        }
    }
    if *method == Method::GET && definition.affects_state == Some(true) {
        return Err(Error::Validation(format!(
            "operation ${code} affects state and cannot be invoked with GET"
        )));
    }

    let parameters = if *method == Method::GET {
        parameters_from_query(query)
    } else {
        parameters_from_body(state, headers, query, body)?
    };

    let result = state.backend.invoke(code, scope, parameters).await?;
    let format = response_format(query, headers, state.config.default_format);
    resource_response(result.as_value(), format, StatusCode::OK)
}

fn scope_name(scope: &OperationScope<'_>) -> &'static str {
    match scope {
        OperationScope::System => "system",
        OperationScope::Type { .. } => "type",
        OperationScope::Instance { .. } => "instance",
    }
}

/// GET invocations carry their inputs as query parameters.
fn parameters_from_query(query: &[(String, String)]) -> Parameters {
    let mut parameters = Parameters::new();
    for (name, value) in query {
        if name.starts_with('_') {
            continue;
        }
        parameters.parameter.push(ParametersParameter {
            name: name.clone(),
            value_string: Some(value.clone()),
            ..Default::default()
        });
    }
    parameters
}

fn parameters_from_body(
    state: &AppState,
    headers: &HeaderMap,
    query: &[(String, String)],
    body: &[u8],
) -> Result<Parameters> {
    if body.is_empty() {
        return Ok(Parameters::new());
    }
    let format = request_format(query, headers, state.config.default_format);
    let value = parse_body(body, format)?;
    if value.get("resourceType").and_then(serde_json::Value::as_str) != Some("Parameters") {
        return Err(Error::Validation(
            "operation POST body must be a Parameters resource".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| Error::Validation(format!("invalid Parameters resource: {e}")))
}

//! Error translation
//!
//! Every failure that reaches the outermost handler becomes an
//! OperationOutcome; the HTTP status is derived from the highest-severity
//! issue through a fixed issue-code table. Backend-raised
//! OperationOutcomes pass through untouched; opaque failures are wrapped
//! as `{fatal, exception}`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kupfer_models::{IssueType, OperationOutcome};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A fully-formed outcome raised by the backend; propagated untouched.
    #[error("{}", first_diagnostics(.0))]
    Outcome(OperationOutcome),

    #[error("search error: {0}")]
    Search(#[from] kupfer_search::Error),

    #[error("FHIRPath error: {0}")]
    FhirPath(#[from] kupfer_fhirpath::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    #[error("{interaction} not implemented for {resource_type}")]
    NotImplemented {
        interaction: String,
        resource_type: String,
    },

    #[error("operation not allowed for resource type {0}")]
    OperationLevelMismatch(String),

    #[error("unexpected resource type: expected {expected}, got {actual}")]
    UnexpectedResourceType { expected: String, actual: String },

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn first_diagnostics(outcome: &OperationOutcome) -> String {
    outcome
        .issue
        .first()
        .and_then(|i| i.diagnostics.clone())
        .unwrap_or_else(|| "operation outcome".to_string())
}

impl From<kupfer_models::ResourceError> for Error {
    fn from(e: kupfer_models::ResourceError) -> Self {
        match e {
            kupfer_models::ResourceError::UnexpectedType { expected, actual } => {
                Self::UnexpectedResourceType { expected, actual }
            }
            other => Self::Validation(other.to_string()),
        }
    }
}

impl Error {
    /// The OperationOutcome surfaced to the client.
    pub fn to_outcome(&self) -> OperationOutcome {
        match self {
            Self::Outcome(outcome) => outcome.clone(),
            Self::Search(e) => OperationOutcome::error(IssueType::Invalid, e.to_string()),
            Self::Validation(message) => {
                OperationOutcome::error(IssueType::Invalid, message.clone())
            }
            Self::NotFound { .. } => {
                OperationOutcome::error(IssueType::NotFound, self.to_string())
            }
            Self::NotImplemented { .. } => {
                OperationOutcome::error(IssueType::NotSupported, self.to_string())
            }
            Self::OperationLevelMismatch(_) => {
                OperationOutcome::error(IssueType::Invalid, self.to_string())
            }
            Self::UnexpectedResourceType { .. } => {
                OperationOutcome::error(IssueType::Processing, self.to_string())
            }
            Self::UnsupportedMediaType(_) => {
                OperationOutcome::error(IssueType::NotSupported, self.to_string())
            }
            Self::FhirPath(_) | Self::Config(_) => OperationOutcome::exception(self.to_string()),
            Self::Other(e) => OperationOutcome::exception(e.to_string()),
        }
    }
}

/// Fixed issue-code → HTTP status table.
fn issue_status(code: IssueType) -> StatusCode {
    use IssueType::*;
    match code {
        NotFound => StatusCode::NOT_FOUND,
        NotSupported => StatusCode::NOT_IMPLEMENTED,
        Login | Unknown | Expired => StatusCode::UNAUTHORIZED,
        Forbidden | Suppressed | TooCostly | Security => StatusCode::FORBIDDEN,
        Duplicate | Conflict => StatusCode::CONFLICT,
        Deleted => StatusCode::GONE,
        TooLong => StatusCode::PAYLOAD_TOO_LARGE,
        Throttled => StatusCode::TOO_MANY_REQUESTS,
        Exception => StatusCode::INTERNAL_SERVER_ERROR,
        Timeout => StatusCode::GATEWAY_TIMEOUT,
        Transient | LockError | NoStore | Incomplete => StatusCode::SERVICE_UNAVAILABLE,
        Invalid | Structure | Required | Value | Invariant | CodeInvalid | Extension
        | BusinessRule | MultipleMatches | Processing | Informational => StatusCode::BAD_REQUEST,
    }
}

/// Status for a whole outcome: the status of the highest-severity issue;
/// when several issues share the top severity but disagree on status, the
/// result generalizes to the status-class floor (404 + 409 → 400).
pub fn status_for(outcome: &OperationOutcome) -> StatusCode {
    let Some(top) = outcome.top_severity() else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };
    let mut statuses = outcome
        .issue
        .iter()
        .filter(|i| i.severity == top)
        .map(|i| issue_status(i.code));
    let Some(first) = statuses.next() else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };
    let mut result = first;
    for status in statuses {
        if status != result {
            let floor = (result.as_u16().min(status.as_u16()) / 100) * 100;
            result = StatusCode::from_u16(floor.max(400))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
    result
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let outcome = self.to_outcome();
        let status = status_for(&outcome);
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }

        let mut response = (status, Json(outcome)).into_response();
        // Errors always render as FHIR JSON; IntoResponse has no request
        // context to negotiate with.
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/fhir+json; charset=utf-8"),
        );
        response
    }
}

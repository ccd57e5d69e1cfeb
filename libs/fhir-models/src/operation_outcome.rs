//! FHIR OperationOutcome model
//!
//! The canonical error envelope: every failure surfaced by the server is an
//! OperationOutcome with one or more issues.

use serde::{Deserialize, Serialize};

use crate::resource::TypedResource;

/// FHIR OperationOutcome resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub issue: Vec<Issue>,
}

fn default_resource_type() -> String {
    "OperationOutcome".to_string()
}

impl OperationOutcome {
    /// Outcome with a single issue.
    pub fn issue(severity: IssueSeverity, code: IssueType, diagnostics: impl Into<String>) -> Self {
        Self {
            resource_type: default_resource_type(),
            id: None,
            issue: vec![Issue {
                severity,
                code,
                diagnostics: Some(diagnostics.into()),
                expression: Vec::new(),
            }],
        }
    }

    /// `{error, <code>, <diagnostics>}` shorthand.
    pub fn error(code: IssueType, diagnostics: impl Into<String>) -> Self {
        Self::issue(IssueSeverity::Error, code, diagnostics)
    }

    /// `{fatal, exception, <diagnostics>}` — the wrapper for opaque failures.
    pub fn exception(diagnostics: impl Into<String>) -> Self {
        Self::issue(IssueSeverity::Fatal, IssueType::Exception, diagnostics)
    }

    /// The most severe level present across all issues.
    pub fn top_severity(&self) -> Option<IssueSeverity> {
        self.issue.iter().map(|i| i.severity).min_by_key(|s| s.rank())
    }
}

impl TypedResource for OperationOutcome {
    const TYPE: &'static str = "OperationOutcome";
}

/// A single issue within an OperationOutcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: IssueType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,

    /// FHIRPath expressions locating the offending element(s).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
}

/// Issue severity
///
/// See http://hl7.org/fhir/valueset-issue-severity.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl IssueSeverity {
    /// Ordering rank, most severe first.
    pub fn rank(self) -> u8 {
        match self {
            Self::Fatal => 0,
            Self::Error => 1,
            Self::Warning => 2,
            Self::Information => 3,
        }
    }
}

/// Issue type code
///
/// See http://hl7.org/fhir/valueset-issue-type.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Invalid,
    Structure,
    Required,
    Value,
    Invariant,
    Security,
    Login,
    Unknown,
    Expired,
    Forbidden,
    Suppressed,
    Processing,
    NotSupported,
    Duplicate,
    MultipleMatches,
    NotFound,
    Deleted,
    TooLong,
    CodeInvalid,
    Extension,
    TooCostly,
    BusinessRule,
    Conflict,
    Transient,
    LockError,
    NoStore,
    Exception,
    Timeout,
    Incomplete,
    Throttled,
    Informational,
}

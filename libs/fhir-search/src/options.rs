//! Result-modifying search options and the search result shape.

use kupfer_models::Resource;

use crate::error::{Error, Result};

/// Options extracted from the reserved `_`-parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Page size, already clamped to the server maximum.
    pub count: usize,
    pub cursor: Option<Cursor>,
    /// `_include` descriptors, kept verbatim (`Observation:subject`).
    pub includes: Vec<String>,
    /// `_revinclude` descriptors.
    pub rev_includes: Vec<String>,
    pub summary: Option<SummaryMode>,
    pub elements: Vec<String>,
    pub contained: Option<String>,
    /// `_sort` keys in request order (`-date` is descending).
    pub sort: Vec<String>,
}

impl SearchOptions {
    pub fn with_count(count: usize) -> Self {
        Self {
            count,
            cursor: None,
            includes: Vec::new(),
            rev_includes: Vec::new(),
            summary: None,
            elements: Vec::new(),
            contained: None,
            sort: Vec::new(),
        }
    }
}

/// Summary mode (`_summary`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    True,
    Text,
    Data,
    Count,
    False,
}

impl SummaryMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "true" => Some(Self::True),
            "text" => Some(Self::Text),
            "data" => Some(Self::Data),
            "count" => Some(Self::Count),
            "false" => Some(Self::False),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::Text => "text",
            Self::Data => "data",
            Self::Count => "count",
            Self::False => "false",
        }
    }
}

/// Opaque pagination cursor.
///
/// Backends define their own cursor contents; the numeric-offset view is
/// only used by the in-memory fallback paginator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the cursor as a numeric offset (fallback paginator).
    pub fn offset(&self) -> Result<usize> {
        if self.0.starts_with('-') {
            return Err(Error::InvalidCursor(
                "offset must be non-negative".to_string(),
            ));
        }
        self.0
            .parse::<usize>()
            .map_err(|e| Error::InvalidCursor(e.to_string()))
    }
}

impl From<usize> for Cursor {
    fn from(offset: usize) -> Self {
        Self(offset.to_string())
    }
}

/// One page of search results as returned by a backend.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub resources: Vec<Resource>,
    pub included: Vec<Resource>,
    /// Cursor for the next page; `None` when this page is the last.
    pub next: Option<Cursor>,
}

//! FHIR content negotiation
//!
//! Format selection order: `_format` query parameter, then `Accept` (for
//! responses) or `Content-Type` (for requests), then the server default.
//!
//! See: http://hl7.org/fhir/http.html#mime-type

use axum::http::{header, HeaderMap};
use serde_json::Value;

use crate::error::{Error, Result};

/// Supported content formats for FHIR resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFormat {
    /// JSON format (application/fhir+json)
    #[default]
    Json,
    /// XML format (application/fhir+xml)
    Xml,
}

impl ContentFormat {
    /// Parse a format name or MIME type, accepting the short aliases
    /// (`json`, `xml`) and the generic MIME types the FHIR specification
    /// allows.
    pub fn parse(s: &str) -> Option<Self> {
        // Strip charset and other parameters from the mime type.
        let mime = s.split(';').next().unwrap_or(s).trim();
        match mime.to_ascii_lowercase().as_str() {
            "json" | "text/json" | "application/json" | "application/fhir+json" => Some(Self::Json),
            "xml" | "text/xml" | "application/xml" | "application/fhir+xml" => Some(Self::Xml),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Json => "application/fhir+json",
            Self::Xml => "application/fhir+xml",
        }
    }

    pub fn content_type(&self) -> String {
        format!("{}; charset=utf-8", self.mime_type())
    }
}

/// Format for the response body.
pub fn response_format(
    query: &[(String, String)],
    headers: &HeaderMap,
    default: ContentFormat,
) -> ContentFormat {
    format_parameter(query)
        .or_else(|| header_format(headers, header::ACCEPT))
        .unwrap_or(default)
}

/// Format of the request body.
pub fn request_format(
    query: &[(String, String)],
    headers: &HeaderMap,
    default: ContentFormat,
) -> ContentFormat {
    format_parameter(query)
        .or_else(|| header_format(headers, header::CONTENT_TYPE))
        .unwrap_or(default)
}

fn format_parameter(query: &[(String, String)]) -> Option<ContentFormat> {
    query
        .iter()
        .find(|(k, _)| k == "_format")
        .and_then(|(_, v)| ContentFormat::parse(v))
}

fn header_format(headers: &HeaderMap, name: header::HeaderName) -> Option<ContentFormat> {
    let value = headers.get(name)?.to_str().ok()?;
    // First recognized entry wins; `*/*` and unknown types fall through
    // to the default.
    value.split(',').find_map(ContentFormat::parse)
}

/// Serialize a resource JSON value in the negotiated format.
pub fn render(value: &Value, format: ContentFormat) -> Result<String> {
    match format {
        ContentFormat::Json => serde_json::to_string(value).map_err(|e| Error::Other(e.into())),
        ContentFormat::Xml => {
            kupfer_format::value_to_xml(value).map_err(|e| Error::Other(e.into()))
        }
    }
}

/// Parse a request body in the negotiated format into resource JSON.
pub fn parse_body(body: &[u8], format: ContentFormat) -> Result<Value> {
    let text = std::str::from_utf8(body)
        .map_err(|_| Error::Validation("request body is not valid UTF-8".to_string()))?;
    match format {
        ContentFormat::Json => serde_json::from_str(text)
            .map_err(|e| Error::Validation(format!("invalid JSON body: {e}"))),
        ContentFormat::Xml => kupfer_format::xml_to_value(text)
            .map_err(|e| Error::Validation(format!("invalid XML body: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn alias_table() {
        for alias in [
            "json",
            "text/json",
            "application/json",
            "application/fhir+json",
        ] {
            assert_eq!(ContentFormat::parse(alias), Some(ContentFormat::Json));
        }
        for alias in ["xml", "text/xml", "application/xml", "application/fhir+xml"] {
            assert_eq!(ContentFormat::parse(alias), Some(ContentFormat::Xml));
        }
        assert_eq!(ContentFormat::parse("text/html"), None);
    }

    #[test]
    fn format_parameter_wins_over_accept() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/fhir+xml"),
        );
        let format = response_format(
            &pairs(&[("_format", "json")]),
            &headers,
            ContentFormat::Xml,
        );
        assert_eq!(format, ContentFormat::Json);
    }

    #[test]
    fn unknown_accept_falls_back_to_default() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        let format = response_format(&[], &headers, ContentFormat::Json);
        assert_eq!(format, ContentFormat::Json);
    }
}

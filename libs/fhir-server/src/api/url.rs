//! Request base-URL derivation for Location headers and bundle links.

use axum::http::{header, HeaderMap};

/// `scheme://host` from forwarding headers; scheme defaults to `http`,
/// host to `localhost` when no Host header arrived.
pub fn base_url_from_headers(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn defaults_to_http_localhost() {
        assert_eq!(base_url_from_headers(&HeaderMap::new()), "http://localhost");
    }

    #[test]
    fn forwarded_proto_and_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("fhir.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(
            base_url_from_headers(&headers),
            "https://fhir.example.com"
        );
    }
}

//! Searchset bundle assembly
//!
//! One entry per matched resource (`search.mode=match`) in backend order,
//! then included resources (`mode=include`). The `self` link is rebuilt
//! from the parsed parameters and options — not echoed from the request —
//! so it is round-trip stable; `next` swaps in the backend's cursor.

use kupfer_models::{Bundle, BundleEntry, BundleEntrySearch, BundleLink, Resource, SearchEntryMode};
use kupfer_search::{build_query, Cursor, ParameterMap, SearchOptions, SearchResult};

pub fn searchset(
    base_url: &str,
    resource_type: &str,
    result: SearchResult,
    params: &ParameterMap,
    options: &SearchOptions,
) -> Bundle {
    let mut bundle = Bundle::searchset();

    bundle.link.push(BundleLink {
        relation: "self".to_string(),
        url: format!(
            "{base_url}/{resource_type}?{}",
            build_query(params, options)
        ),
    });
    if let Some(next) = &result.next {
        bundle.link.push(BundleLink {
            relation: "next".to_string(),
            url: format!(
                "{base_url}/{resource_type}?{}",
                build_query(params, &with_cursor(options, next))
            ),
        });
    }

    for resource in result.resources {
        bundle.entry.push(entry(base_url, resource, SearchEntryMode::Match));
    }
    for resource in result.included {
        bundle
            .entry
            .push(entry(base_url, resource, SearchEntryMode::Include));
    }

    bundle
}

fn entry(base_url: &str, resource: Resource, mode: SearchEntryMode) -> BundleEntry {
    let full_url = resource
        .resource_id()
        .map(|id| format!("{base_url}/{}/{id}", resource.resource_type()));
    BundleEntry {
        full_url,
        resource: Some(resource.into_value()),
        search: Some(BundleEntrySearch { mode: Some(mode) }),
    }
}

fn with_cursor(options: &SearchOptions, cursor: &Cursor) -> SearchOptions {
    let mut next = options.clone();
    next.cursor = Some(cursor.clone());
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use kupfer_search::ParameterMap;
    use serde_json::json;

    #[test]
    fn links_and_entry_modes() {
        let resource =
            Resource::from_value(json!({"resourceType": "Patient", "id": "p1"})).unwrap();
        let included =
            Resource::from_value(json!({"resourceType": "Organization", "id": "o1"})).unwrap();
        let result = SearchResult {
            resources: vec![resource],
            included: vec![included],
            next: Some(Cursor("2".into())),
        };
        let options = SearchOptions::with_count(10);
        let bundle = searchset(
            "http://localhost",
            "Patient",
            result,
            &ParameterMap::new(),
            &options,
        );

        assert_eq!(
            bundle.link("self"),
            Some("http://localhost/Patient?_count=10")
        );
        assert_eq!(
            bundle.link("next"),
            Some("http://localhost/Patient?_cursor=2&_count=10")
        );
        assert_eq!(bundle.entry.len(), 2);
        assert_eq!(
            bundle.entry[0].full_url.as_deref(),
            Some("http://localhost/Patient/p1")
        );
        assert_eq!(
            bundle.entry[0].search.as_ref().unwrap().mode,
            Some(SearchEntryMode::Match)
        );
        assert_eq!(
            bundle.entry[1].full_url.as_deref(),
            Some("http://localhost/Organization/o1")
        );
        assert_eq!(
            bundle.entry[1].search.as_ref().unwrap().mode,
            Some(SearchEntryMode::Include)
        );
    }

    #[test]
    fn no_next_cursor_no_next_link() {
        let result = SearchResult::default();
        let bundle = searchset(
            "http://localhost",
            "Patient",
            result,
            &ParameterMap::new(),
            &SearchOptions::with_count(10),
        );
        assert!(bundle.link("next").is_none());
        assert!(bundle.entry.is_empty());
    }
}

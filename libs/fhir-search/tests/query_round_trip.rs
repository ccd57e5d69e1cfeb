//! Round-trip and scenario tests for the query engine.

use kupfer_models::{CapabilityStatement, SearchParameter};
use kupfer_search::{
    build_query, parse_query, DatePrecision, Error, ParameterKey, Prefix, ReferenceValue,
    SearchConfig, TokenValue, ValueKind,
};
use serde_json::json;

fn capabilities() -> CapabilityStatement {
    serde_json::from_value(json!({
        "resourceType": "CapabilityStatement",
        "status": "active",
        "kind": "instance",
        "implementation": {"description": "test server", "url": "http://example.com/fhir"},
        "rest": [{
            "mode": "server",
            "resource": [{
                "type": "Observation",
                "interaction": [{"code": "search-type"}],
                "searchParam": [
                    {"name": "number", "type": "number", "definition": "http://example.com/fhir/SearchParameter/Observation-number"},
                    {"name": "date", "type": "date", "definition": "http://example.com/fhir/SearchParameter/Observation-date"},
                    {"name": "token", "type": "token", "definition": "http://example.com/fhir/SearchParameter/Observation-token"},
                    {"name": "subject", "type": "reference", "definition": "http://example.com/fhir/SearchParameter/Observation-subject"},
                    {"name": "value-quantity", "type": "quantity", "definition": "http://example.com/fhir/SearchParameter/Observation-value-quantity"},
                    {"name": "code-value", "type": "composite", "definition": "http://example.com/fhir/SearchParameter/Observation-code-value"},
                    {"name": "note", "type": "string", "definition": "http://example.com/fhir/SearchParameter/Observation-note"},
                    {"name": "uri", "type": "uri", "definition": "http://example.com/fhir/SearchParameter/Observation-uri"}
                ]
            }]
        }]
    }))
    .unwrap()
}

fn no_resolver(_: &str) -> Option<SearchParameter> {
    None
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn parse(
    query: &[(&str, &str)],
    config: &SearchConfig,
) -> kupfer_search::Result<(kupfer_search::ParameterMap, kupfer_search::SearchOptions)> {
    parse_query(
        &capabilities(),
        "Observation",
        &no_resolver,
        &pairs(query),
        config,
    )
}

#[test]
fn number_with_prefix_scenario() {
    let config = SearchConfig::default();
    let (params, options) = parse(&[("number", "ge0.100")], &config).unwrap();

    let all = &params[&ParameterKey::new("number")];
    assert_eq!(all.0.len(), 1);
    let value = &all.0[0].0[0];
    assert_eq!(value.prefix, Some(Prefix::Ge));
    assert_eq!(value.kind, ValueKind::Number("0.100".parse().unwrap()));

    assert_eq!(
        build_query(&params, &options),
        format!("number=ge0.100&_count={}", config.default_count)
    );
}

#[test]
fn token_with_system_scenario() {
    let config = SearchConfig::default();
    let (params, options) = parse(&[("token", "scheme://system|value")], &config).unwrap();
    let value = &params[&ParameterKey::new("token")].0[0].0[0];
    assert_eq!(
        value.kind,
        ValueKind::Token(TokenValue {
            system: Some("scheme://system".into()),
            code: "value".into()
        })
    );
    assert!(build_query(&params, &options).starts_with("token=scheme://system|value&"));
}

#[test]
fn token_edge_forms() {
    let config = SearchConfig::default();
    // Bare `|code`: explicitly no system.
    let (params, _) = parse(&[("token", "|c")], &config).unwrap();
    assert_eq!(
        params[&ParameterKey::new("token")].0[0].0[0].kind,
        ValueKind::Token(TokenValue {
            system: Some(String::new()),
            code: "c".into()
        })
    );
    // `system|`: any code from that system.
    let (params, _) = parse(&[("token", "s|")], &config).unwrap();
    assert_eq!(
        params[&ParameterKey::new("token")].0[0].0[0].kind,
        ValueKind::Token(TokenValue {
            system: Some("s".into()),
            code: String::new()
        })
    );
}

#[test]
fn date_precision_day_scenario() {
    let config = SearchConfig::default();
    let (params, options) = parse(&[("date", "2024-12-25")], &config).unwrap();
    match &params[&ParameterKey::new("date")].0[0].0[0].kind {
        ValueKind::Date(d) => {
            assert_eq!(d.precision, DatePrecision::Day);
            assert_eq!(d.when.to_rfc3339(), "2024-12-25T00:00:00+00:00");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(build_query(&params, &options).starts_with("date=2024-12-25&"));
}

#[test]
fn references_local_and_absolute() {
    let config = SearchConfig::default();
    let (params, _) = parse(&[("subject", "Patient/p1")], &config).unwrap();
    assert_eq!(
        params[&ParameterKey::new("subject")].0[0].0[0].kind,
        ValueKind::Reference(ReferenceValue::Local {
            resource_type: "Patient".into(),
            id: "p1".into(),
            version: None
        })
    );

    let (params, _) = parse(&[("subject", "Patient/p1/_history/3")], &config).unwrap();
    assert_eq!(
        params[&ParameterKey::new("subject")].0[0].0[0].kind,
        ValueKind::Reference(ReferenceValue::Local {
            resource_type: "Patient".into(),
            id: "p1".into(),
            version: Some("3".into())
        })
    );

    let (params, options) =
        parse(&[("subject", "http://other.example.com/fhir/Patient/p1|2")], &config).unwrap();
    assert_eq!(
        params[&ParameterKey::new("subject")].0[0].0[0].kind,
        ValueKind::Reference(ReferenceValue::Url {
            url: "http://other.example.com/fhir/Patient/p1".into(),
            version: Some("2".into())
        })
    );
    assert!(build_query(&params, &options)
        .starts_with("subject=http://other.example.com/fhir/Patient/p1|2&"));
}

#[test]
fn quantity_and_composite() {
    let config = SearchConfig::default();
    let (params, _) = parse(
        &[
            ("value-quantity", "le5.4|http://unitsofmeasure.org|mg"),
            ("code-value", "8480-6$lt60"),
        ],
        &config,
    )
    .unwrap();
    assert_eq!(
        params[&ParameterKey::new("value-quantity")].0[0].0[0].kind,
        ValueKind::Quantity {
            value: "5.4".parse().unwrap(),
            system: Some("http://unitsofmeasure.org".into()),
            code: Some("mg".into())
        }
    );
    assert_eq!(
        params[&ParameterKey::new("code-value")].0[0].0[0].kind,
        ValueKind::Composite(vec!["8480-6".into(), "lt60".into()])
    );
}

#[test]
fn and_of_or_semantics() {
    let config = SearchConfig::default();
    let (params, _) = parse(&[("note", "a,b"), ("note", "c")], &config).unwrap();
    let all = &params[&ParameterKey::new("note")];
    assert_eq!(all.0.len(), 2);
    assert_eq!(all.0[0].0.len(), 2);
    assert_eq!(all.0[1].0.len(), 1);
}

#[test]
fn prefixes_never_strip_from_strings() {
    let config = SearchConfig::default();
    let (params, _) = parse(&[("note", "gefunden")], &config).unwrap();
    let value = &params[&ParameterKey::new("note")].0[0].0[0];
    assert_eq!(value.prefix, None);
    assert_eq!(value.kind, ValueKind::String("gefunden".into()));
}

#[test]
fn invalid_prefix_is_an_error() {
    let config = SearchConfig::default();
    assert_eq!(
        parse(&[("number", "xx5")], &config).unwrap_err(),
        Error::InvalidPrefix {
            prefix: "xx".into(),
            param_type: "number".into()
        }
    );
}

#[test]
fn modifiers_key_separately() {
    let config = SearchConfig::default();
    let (params, _) = parse(&[("note:exact", "X")], &config).unwrap();
    assert!(params.contains_key(&ParameterKey::with_modifier("note", "exact")));
}

#[test]
fn count_clamping_and_default() {
    let mut config = SearchConfig::default();
    config.max_count = 50;
    config.default_count = 20;

    let (_, options) = parse(&[], &config).unwrap();
    assert_eq!(options.count, 20);

    // _count=0 means "use default".
    let (_, options) = parse(&[("_count", "0")], &config).unwrap();
    assert_eq!(options.count, 20);

    // Above the maximum: silently clamped, recorded clamped in links.
    let (params, options) = parse(&[("_count", "999")], &config).unwrap();
    assert_eq!(options.count, 50);
    assert_eq!(build_query(&params, &options), "_count=50");

    assert_eq!(
        parse(&[("_count", "abc")], &config).unwrap_err(),
        Error::InvalidCount("abc".into())
    );
}

#[test]
fn strict_and_lenient_unknown_parameters() {
    let mut config = SearchConfig::default();
    config.strict = true;
    assert_eq!(
        parse(&[("note", "x"), ("bad", "y")], &config).unwrap_err(),
        Error::UnsupportedParameter("bad".into())
    );

    config.strict = false;
    let (params, _) = parse(&[("note", "x"), ("bad", "y")], &config).unwrap();
    assert_eq!(params.len(), 1);
    assert!(params.contains_key(&ParameterKey::new("note")));
}

#[test]
fn full_round_trip_is_stable() {
    let config = SearchConfig::default();
    let query = &[
        ("date", "ge2024-01"),
        ("note", "alpha,beta"),
        ("token", "http://loinc.org|8867-4"),
        ("_include", "Observation:subject"),
        ("_sort", "-date"),
        ("_count", "25"),
    ];
    let (params, options) = parse(query, &config).unwrap();
    let emitted = build_query(&params, &options);

    // Parsing the emitted string yields the same map and options.
    let raw_pairs: Vec<(String, String)> = emitted
        .split('&')
        .map(|p| {
            let (k, v) = p.split_once('=').unwrap();
            (k.to_string(), v.to_string())
        })
        .collect();
    let (params2, options2) = parse_query(
        &capabilities(),
        "Observation",
        &no_resolver,
        &raw_pairs,
        &config,
    )
    .unwrap();
    assert_eq!(params, params2);
    assert_eq!(options, options2);
    assert_eq!(emitted, build_query(&params2, &options2));
}

#[test]
fn resolver_refines_declared_type() {
    // The capability statement says `note` is a string, but the resolved
    // canonical definition says token; the definition wins.
    let resolver = |canonical: &str| -> Option<SearchParameter> {
        if canonical.ends_with("Observation-note") {
            Some(
                serde_json::from_value(json!({
                    "resourceType": "SearchParameter",
                    "url": canonical,
                    "name": "note",
                    "status": "active",
                    "code": "note",
                    "base": ["Observation"],
                    "type": "token",
                    "expression": "Observation.note.text"
                }))
                .unwrap(),
            )
        } else {
            None
        }
    };
    let config = SearchConfig::default();
    let (params, _) = parse_query(
        &capabilities(),
        "Observation",
        &resolver,
        &pairs(&[("note", "s|c")]),
        &config,
    )
    .unwrap();
    assert!(matches!(
        params[&ParameterKey::new("note")].0[0].0[0].kind,
        ValueKind::Token(_)
    ));
}

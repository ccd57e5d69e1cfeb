//! Router-level tests over an in-memory registry backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use kupfer_models::{OperationDefinition, Resource, SearchParameter};
use kupfer_search::{Cursor, SearchResult};
use kupfer_server::{
    router, CapabilityBase, CapabilityRegistry, Error, GenericAdapter, SearchCapabilities,
    ServerConfig, UpdateCapabilities, UpdateResult,
};
use serde_json::{json, Value};
use tower::ServiceExt;

type Store = Arc<Mutex<HashMap<String, Value>>>;

fn search_parameter(code: &str, param_type: &str) -> SearchParameter {
    serde_json::from_value(json!({
        "resourceType": "SearchParameter",
        "name": code,
        "status": "active",
        "code": code,
        "base": ["Patient"],
        "type": param_type,
        "expression": format!("Patient.{code}")
    }))
    .unwrap()
}

fn test_router(config: ServerConfig) -> (Router, Store) {
    let store: Store = Arc::new(Mutex::new(HashMap::new()));
    store.lock().unwrap().insert(
        "p1".to_string(),
        json!({"resourceType": "Patient", "id": "p1", "name": [{"family": "Everyman"}]}),
    );

    let base = CapabilityBase::new("test server", "http://fhir.example.com")
        .with_software("kupfer-test", "0.0.1")
        .with_date("2024-01-01");
    let mut registry = CapabilityRegistry::new(base);

    let (s_read, s_create, s_update, s_delete, s_search) = (
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    );
    registry
        .resource("Patient")
        .read(move |id| {
            let store = s_read.clone();
            async move {
                store
                    .lock()
                    .unwrap()
                    .get(&id)
                    .cloned()
                    .map(|v| Resource::from_value(v).expect("stored resources are valid"))
                    .ok_or(Error::NotFound {
                        resource_type: "Patient".to_string(),
                        id,
                    })
            }
        })
        .create(move |resource| {
            let store = s_create.clone();
            async move {
                let id = resource.resource_id().expect("router assigns ids").to_string();
                store
                    .lock()
                    .unwrap()
                    .insert(id, resource.as_value().clone());
                Ok(resource)
            }
        })
        .update(UpdateCapabilities { update_create: true }, move |resource| {
            let store = s_update.clone();
            async move {
                let id = resource.resource_id().expect("update requires an id").to_string();
                let created = store
                    .lock()
                    .unwrap()
                    .insert(id, resource.as_value().clone())
                    .is_none();
                Ok(UpdateResult { resource, created })
            }
        })
        .delete(move |id| {
            let store = s_delete.clone();
            async move {
                store.lock().unwrap().remove(&id);
                Ok(())
            }
        })
        .search(
            SearchCapabilities {
                parameters: vec![
                    search_parameter("name", "string"),
                    search_parameter("birthdate", "date"),
                ],
            },
            move |_params, options| {
                let store = s_search.clone();
                async move {
                    let offset = match &options.cursor {
                        Some(cursor) => cursor.offset().map_err(Error::Search)?,
                        None => 0,
                    };
                    let mut ids: Vec<String> =
                        store.lock().unwrap().keys().cloned().collect();
                    ids.sort();
                    let page: Vec<Resource> = ids
                        .iter()
                        .skip(offset)
                        .take(options.count)
                        .map(|id| {
                            Resource::from_value(store.lock().unwrap()[id].clone())
                                .expect("stored resources are valid")
                        })
                        .collect();
                    let consumed = offset + page.len();
                    let next = if consumed < ids.len() && !page.is_empty() {
                        Some(Cursor::from(consumed))
                    } else {
                        None
                    };
                    Ok(SearchResult {
                        resources: page,
                        included: Vec::new(),
                        next,
                    })
                }
            },
        );

    // Read-only resource type: everything else is not-supported.
    registry.resource("Observation").read(|id| async move {
        Err(Error::NotFound {
            resource_type: "Observation".to_string(),
            id,
        })
    });

    let mut echo = OperationDefinition::new("echo", "echo");
    echo.resource = vec!["Patient".to_string()];
    registry.operation(echo).type_level(|resource_type, params| async move {
        let value = params
            .find("input")
            .and_then(|p| p.value_string.clone())
            .unwrap_or_default();
        Resource::from_value(json!({
            "resourceType": "Parameters",
            "parameter": [
                {"name": "resourceType", "valueString": resource_type},
                {"name": "echoed", "valueString": value}
            ]
        }))
        .map_err(Into::into)
    });

    let mut reindex = OperationDefinition::new("reindex", "reindex");
    reindex.affects_state = Some(true);
    registry.operation(reindex).system(|_params| async move {
        Resource::from_value(json!({"resourceType": "Parameters"})).map_err(Into::into)
    });

    (router(Arc::new(GenericAdapter::new(registry)), config), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else if headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"))
    {
        serde_json::from_slice(&bytes).unwrap()
    } else {
        Value::String(String::from_utf8(bytes.to_vec()).unwrap())
    };
    (status, headers, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/fhir+json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn metadata_is_synthesized_and_deterministic() {
    let (app, _) = test_router(ServerConfig::default());

    let (status, _, body) = send(&app, get("/metadata")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "CapabilityStatement");
    assert_eq!(body["implementation"]["url"], "http://fhir.example.com");

    let resources = body["rest"][0]["resource"].as_array().unwrap();
    let types: Vec<&str> = resources
        .iter()
        .map(|r| r["type"].as_str().unwrap())
        .collect();
    // Name-sorted, with the synthesized SearchParameter entry present.
    assert_eq!(types, vec!["Observation", "Patient", "SearchParameter"]);

    let patient = &resources[1];
    let interactions: Vec<&str> = patient["interaction"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["code"].as_str().unwrap())
        .collect();
    assert_eq!(
        interactions,
        vec!["create", "read", "update", "delete", "search-type"]
    );
    assert_eq!(patient["updateCreate"], true);
    assert_eq!(
        patient["searchParam"][1]["definition"],
        "http://fhir.example.com/SearchParameter/Patient-name"
    );
    assert_eq!(patient["operation"][0]["name"], "echo");
    assert_eq!(body["rest"][0]["operation"][0]["name"], "reindex");

    // Byte-identical across calls.
    let (_, _, body2) = send(&app, get("/metadata")).await;
    assert_eq!(
        serde_json::to_string(&body).unwrap(),
        serde_json::to_string(&body2).unwrap()
    );
}

#[tokio::test]
async fn read_and_not_found() {
    let (app, _) = test_router(ServerConfig::default());

    let (status, headers, body) = send(&app, get("/Patient/p1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/fhir+json"));
    assert_eq!(body["id"], "p1");

    let (status, _, body) = send(&app, get("/Patient/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["resourceType"], "OperationOutcome");
    assert_eq!(body["issue"][0]["code"], "not-found");
}

#[tokio::test]
async fn unknown_resource_type_is_rejected_at_the_router() {
    let (app, _) = test_router(ServerConfig::default());
    let (status, _, body) = send(&app, get("/Bogus/x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["issue"][0]["diagnostics"]
        .as_str()
        .unwrap()
        .contains("unknown resource type"));
}

#[tokio::test]
async fn create_assigns_server_id_and_location() {
    let (app, store) = test_router(ServerConfig::default());
    let (status, headers, body) = send(
        &app,
        request(
            "POST",
            "/Patient",
            json!({"resourceType": "Patient", "id": "client-chosen"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap();
    assert_ne!(id, "client-chosen");
    assert_eq!(
        headers[header::LOCATION].to_str().unwrap(),
        format!("http://localhost/Patient/{id}")
    );
    assert!(store.lock().unwrap().contains_key(id));
}

#[tokio::test]
async fn update_semantics() {
    let (app, _) = test_router(ServerConfig::default());

    // Body id must match the path id.
    let (status, _, body) = send(
        &app,
        request(
            "PUT",
            "/Patient/p1",
            json!({"resourceType": "Patient", "id": "other"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["issue"][0]["diagnostics"]
        .as_str()
        .unwrap()
        .contains("does not match"));

    // Existing resource: 200.
    let (status, _, _) = send(
        &app,
        request(
            "PUT",
            "/Patient/p1",
            json!({"resourceType": "Patient", "id": "p1", "active": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Missing resource with updateCreate: 201.
    let (status, headers, _) = send(
        &app,
        request(
            "PUT",
            "/Patient/fresh",
            json!({"resourceType": "Patient", "id": "fresh"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        headers[header::LOCATION].to_str().unwrap(),
        "http://localhost/Patient/fresh"
    );
}

#[tokio::test]
async fn delete_returns_no_content() {
    let (app, store) = test_router(ServerConfig::default());
    let (status, _, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/Patient/p1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!store.lock().unwrap().contains_key("p1"));
}

#[tokio::test]
async fn search_bundles_with_pagination_links() {
    let (app, store) = test_router(ServerConfig::default());
    store.lock().unwrap().insert(
        "p2".to_string(),
        json!({"resourceType": "Patient", "id": "p2"}),
    );

    let (status, _, body) = send(&app, get("/Patient?name=Smith&_count=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "Bundle");
    assert_eq!(body["type"], "searchset");
    assert_eq!(body["entry"].as_array().unwrap().len(), 1);
    assert_eq!(body["entry"][0]["search"]["mode"], "match");
    assert_eq!(
        body["entry"][0]["fullUrl"],
        "http://localhost/Patient/p1"
    );

    let links: HashMap<&str, &str> = body["link"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| {
            (
                l["relation"].as_str().unwrap(),
                l["url"].as_str().unwrap(),
            )
        })
        .collect();
    // Self and next preserve the original parameter and record the
    // clamped count; next swaps in the backend cursor.
    assert_eq!(
        links["self"],
        "http://localhost/Patient?name=Smith&_count=1"
    );
    assert_eq!(
        links["next"],
        "http://localhost/Patient?name=Smith&_cursor=1&_count=1"
    );

    // Following the next link drains the result set.
    let (_, _, body) = send(&app, get("/Patient?name=Smith&_cursor=1&_count=1")).await;
    assert_eq!(body["entry"][0]["resource"]["id"], "p2");
    assert!(body["link"]
        .as_array()
        .unwrap()
        .iter()
        .all(|l| l["relation"] != "next"));
}

#[tokio::test]
async fn cursor_boundaries() {
    let (app, _) = test_router(ServerConfig::default());

    // Beyond the end: empty bundle, no next, no error.
    let (status, _, body) = send(&app, get("/Patient?_cursor=99")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("entry").is_none() || body["entry"].as_array().unwrap().is_empty());

    // Negative offset: 400.
    let (status, _, body) = send(&app, get("/Patient?_cursor=-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["issue"][0]["diagnostics"],
        "invalid cursor: offset must be non-negative"
    );
}

#[tokio::test]
async fn strict_and_lenient_unknown_parameters() {
    let mut config = ServerConfig::default();
    config.strict_search = true;
    let (app, _) = test_router(config);
    let (status, _, body) = send(&app, get("/Patient?name=x&bad=y")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["issue"][0]["diagnostics"],
        "unsupported search parameter: bad"
    );

    let (app, _) = test_router(ServerConfig::default());
    let (status, _, body) = send(&app, get("/Patient?name=x&bad=y")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "Bundle");
}

#[tokio::test]
async fn count_is_clamped_into_the_self_link() {
    let mut config = ServerConfig::default();
    config.max_count = 50;
    let (app, _) = test_router(config);
    let (_, _, body) = send(&app, get("/Patient?_count=999")).await;
    assert!(body["link"][0]["url"]
        .as_str()
        .unwrap()
        .ends_with("_count=50"));
}

#[tokio::test]
async fn operations_dispatch_and_validate() {
    let (app, _) = test_router(ServerConfig::default());

    // Type-level GET with query inputs.
    let (status, _, body) = send(&app, get("/Patient/$echo?input=hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parameter"][1]["valueString"], "hello");

    // Declared for Patient only.
    let (status, _, body) = send(&app, get("/Observation/$echo")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["issue"][0]["diagnostics"],
        "operation not allowed for resource type Observation"
    );

    // Level not declared.
    let (status, _, _) = send(&app, get("/$echo")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown operation: not-supported.
    let (status, _, body) = send(&app, get("/Patient/$nope")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["issue"][0]["code"], "not-supported");

    // affectsState rejects GET but allows POST.
    let (status, _, _) = send(&app, get("/$reindex")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/$reindex")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Instance-level invocation is not registered for echo.
    let (status, _, _) = send(&app, get("/Patient/p1/$echo")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn synthesized_search_parameters_are_readable_and_searchable() {
    let (app, _) = test_router(ServerConfig::default());

    let (status, _, body) = send(&app, get("/SearchParameter/Patient-name")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "SearchParameter");
    assert_eq!(body["code"], "name");
    assert_eq!(
        body["url"],
        "http://fhir.example.com/SearchParameter/Patient-name"
    );

    // Fallback paginator pages by numeric offset.
    let (status, _, body) = send(&app, get("/SearchParameter?_count=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"].as_array().unwrap().len(), 1);
    let next = body["link"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["relation"] == "next")
        .expect("two synthesized parameters, one per page");
    assert!(next["url"].as_str().unwrap().contains("_cursor=1"));
}

#[tokio::test]
async fn xml_responses_via_format_parameter() {
    let (app, _) = test_router(ServerConfig::default());
    let (status, headers, body) = send(&app, get("/Patient/p1?_format=xml")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/fhir+xml"));
    let text = body.as_str().unwrap();
    assert!(text.starts_with("<Patient xmlns=\"http://hl7.org/fhir\">"));
}

#[tokio::test]
async fn typed_wrappers_unwrap_envelopes_and_check_types() {
    use kupfer_models::Parameters;
    use kupfer_server::{typed, OperationScope};

    let base = CapabilityBase::new("typed test", "http://fhir.example.com");
    let mut registry = CapabilityRegistry::new(base);
    registry.resource("Patient").search(
        SearchCapabilities {
            parameters: vec![search_parameter("name", "string")],
        },
        |_params, _options| async move { Ok(SearchResult::default()) },
    );
    registry
        .operation(OperationDefinition::new("definition", "definition"))
        .system(|_params| async move {
            Resource::from_value(json!({
                "resourceType": "Parameters",
                "parameter": [{
                    "name": "return",
                    "resource": {
                        "resourceType": "SearchParameter",
                        "name": "name",
                        "status": "active",
                        "code": "name",
                        "type": "string"
                    }
                }]
            }))
            .map_err(Into::into)
        });
    let adapter = GenericAdapter::new(registry);

    // Typed read over the synthesized SearchParameter set.
    let parameter: SearchParameter = typed::read(&adapter, "Patient-name").await.unwrap();
    assert_eq!(parameter.code, "name");

    // Operation results shed their Parameters envelope before decoding.
    let parameter: SearchParameter = typed::invoke(
        &adapter,
        "definition",
        OperationScope::System,
        Parameters::new(),
    )
    .await
    .unwrap();
    assert_eq!(parameter.code, "name");

    // Asking for the wrong type is an explicit error, not a serde failure.
    let err = typed::invoke::<kupfer_models::Bundle>(
        &adapter,
        "definition",
        OperationScope::System,
        Parameters::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedResourceType { .. }
    ));
}

#[tokio::test]
async fn unregistered_interaction_is_not_supported() {
    let (app, _) = test_router(ServerConfig::default());
    let (status, _, body) = send(
        &app,
        request("POST", "/Observation", json!({"resourceType": "Observation"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["issue"][0]["code"], "not-supported");
    assert_eq!(
        body["issue"][0]["diagnostics"],
        "create not implemented for Observation"
    );
}

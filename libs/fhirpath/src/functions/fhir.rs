//! FHIR-specific functions: `extension`, `hasValue`, `getValue`,
//! `conformsTo`. (`resolve` needs the evaluator's context and lives in
//! the engine.)

use super::singleton_string;
use crate::error::Result;
use crate::value::{json_to_value, Collection, Value};

/// Extensions with the given url — both on complex elements (regular
/// `extension` children) and on primitives (the `_field` companion).
pub fn extension(target: &Collection, url: &Collection) -> Result<Collection> {
    let Some(url) = singleton_string(url, "extension")? else {
        return Ok(Collection::empty());
    };
    let mut out = Collection::empty();
    for v in target.iter() {
        match v {
            Value::Node(node) if node.is_primitive() => {
                let extensions = node
                    .companion()
                    .and_then(|c| c.get("extension"))
                    .and_then(serde_json::Value::as_array);
                for ext in extensions.into_iter().flatten() {
                    if ext.get("url").and_then(serde_json::Value::as_str) == Some(url.as_str()) {
                        if let Some(v) = json_to_value(ext, None) {
                            out.push(v);
                        }
                    }
                }
            }
            _ => {
                for ext in v.children(&["extension"]) {
                    let matches = matches!(
                        &ext,
                        Value::Node(n) if n.json().get("url").and_then(serde_json::Value::as_str)
                            == Some(url.as_str())
                    );
                    if matches {
                        out.push(ext);
                    }
                }
            }
        }
    }
    Ok(out)
}

/// True when the input is a single primitive carrying an actual value.
pub fn has_value(target: &Collection) -> Collection {
    let result = match (target.len(), target.first()) {
        (1, Some(v)) => match v {
            Value::Node(node) => node.is_primitive(),
            _ => true,
        },
        _ => false,
    };
    Collection::boolean(result)
}

/// The underlying primitive value, shed of its metadata.
pub fn get_value(target: &Collection) -> Collection {
    match (target.len(), target.first()) {
        (1, Some(v)) => match v {
            Value::Node(node) if !node.is_primitive() => Collection::empty(),
            other => Collection::single(other.resolved()),
        },
        _ => Collection::empty(),
    }
}

/// Best-effort conformance check without a terminology server: the
/// resource's `meta.profile` list, or the canonical's tail matching the
/// resource type.
pub fn conforms_to(target: &Collection, url: &Collection) -> Result<Collection> {
    let Some(url) = singleton_string(url, "conformsTo")? else {
        return Ok(Collection::empty());
    };
    let Some(v) = target.singleton()? else {
        return Ok(Collection::empty());
    };
    let Value::Node(node) = v else {
        return Ok(Collection::boolean(false));
    };

    let declared = node
        .json()
        .get("meta")
        .and_then(|m| m.get("profile"))
        .and_then(serde_json::Value::as_array)
        .map(|profiles| {
            profiles
                .iter()
                .any(|p| p.as_str() == Some(url.as_str()))
        })
        .unwrap_or(false);
    if declared {
        return Ok(Collection::boolean(true));
    }

    let base_match = url
        .strip_prefix("http://hl7.org/fhir/StructureDefinition/")
        .is_some_and(|tail| node.type_name() == Some(tail));
    Ok(Collection::boolean(base_match))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Node;
    use serde_json::json;

    #[test]
    fn extension_on_complex_elements() {
        let node = Collection::single(Value::Node(Node::from_json(json!({
            "resourceType": "Patient",
            "extension": [
                {"url": "http://example.com/a", "valueString": "x"},
                {"url": "http://example.com/b", "valueString": "y"}
            ]
        }))));
        let url = Collection::single(Value::String("http://example.com/b".into()));
        let found = extension(&node, &url).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn extension_on_primitive_companions() {
        let patient = Node::from_json(json!({
            "resourceType": "Patient",
            "birthDate": "1970-03-30",
            "_birthDate": {"extension": [{"url": "u", "valueCode": "x"}]}
        }));
        let birth = Collection::from_vec(patient.children(&["birthDate"]));
        let url = Collection::single(Value::String("u".into()));
        assert_eq!(extension(&birth, &url).unwrap().len(), 1);
        assert_eq!(has_value(&birth), Collection::boolean(true));
        assert_eq!(
            get_value(&birth),
            Collection::single(Value::String("1970-03-30".into()))
        );
    }

    #[test]
    fn conforms_to_base_definition() {
        let node = Collection::single(Value::Node(Node::from_json(
            json!({"resourceType": "Patient"}),
        )));
        let url = Collection::single(Value::String(
            "http://hl7.org/fhir/StructureDefinition/Patient".into(),
        ));
        assert_eq!(conforms_to(&node, &url).unwrap(), Collection::boolean(true));
    }
}

//! XML → JSON reading.

use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use crate::{FormatError, XHTML_NS};

pub(crate) fn read_resource(input: &str) -> Result<Value, FormatError> {
    let doc = Document::parse(input)?;
    Ok(resource_to_value(input, doc.root_element()))
}

fn resource_to_value(source: &str, node: Node) -> Value {
    let mut props = PropertyAccumulator::new();
    props.push_literal("resourceType", node.tag_name().name());
    for child in node.children().filter(Node::is_element) {
        read_child(source, &mut props, child);
    }
    props.finish()
}

fn read_child(source: &str, props: &mut PropertyAccumulator, node: Node) {
    let name = node.tag_name().name().to_string();

    // Narrative XHTML passes through verbatim.
    if node.tag_name().namespace() == Some(XHTML_NS) {
        props.push(&name, Value::String(source[node.range()].to_string()), None);
        return;
    }

    // Primitive: the value attribute carries the payload; id/extension
    // become the `_field` companion.
    if let Some(value) = node.attribute("value") {
        let companion = primitive_companion(source, node);
        props.push(&name, parse_scalar(value), companion);
        return;
    }

    // Nested resource wrapper: a single PascalCase child element.
    let elements: Vec<Node> = node.children().filter(Node::is_element).collect();
    if let [only] = elements.as_slice() {
        let starts_upper = only
            .tag_name()
            .name()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase());
        if starts_upper {
            props.push(&name, resource_to_value(source, *only), None);
            return;
        }
    }

    // Complex element.
    let mut inner = PropertyAccumulator::new();
    if let Some(id) = node.attribute("id") {
        inner.push_literal("id", id);
    }
    if let Some(url) = node.attribute("url") {
        inner.push_literal("url", url);
    }
    for child in elements {
        read_child(source, &mut inner, child);
    }
    props.push(&name, inner.finish(), None);
}

fn primitive_companion(source: &str, node: Node) -> Option<Value> {
    let mut companion = Map::new();
    if let Some(id) = node.attribute("id") {
        companion.insert("id".to_string(), Value::String(id.to_string()));
    }
    let extensions: Vec<Value> = node
        .children()
        .filter(Node::is_element)
        .filter(|c| c.tag_name().name() == "extension")
        .map(|c| {
            let mut inner = PropertyAccumulator::new();
            read_child(source, &mut inner, c);
            match inner.finish() {
                Value::Object(mut map) => map.remove("extension").unwrap_or(Value::Null),
                _ => Value::Null,
            }
        })
        .collect();
    if !extensions.is_empty() {
        companion.insert("extension".to_string(), Value::Array(extensions));
    }
    if companion.is_empty() {
        None
    } else {
        Some(Value::Object(companion))
    }
}

fn parse_scalar(input: &str) -> Value {
    match input {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match input.parse::<i64>() {
            // Leading zeros and "+" signs are FHIR strings, not numbers.
            Ok(n) if n.to_string() == input => Value::Number(n.into()),
            _ => Value::String(input.to_string()),
        },
    }
}

/// Collects repeated properties in document order and finalizes them into a
/// JSON object, aligning primitive companions into `_field` arrays with
/// `null` placeholders.
struct PropertyAccumulator {
    order: Vec<String>,
    entries: std::collections::HashMap<String, Vec<(Value, Option<Value>)>>,
}

impl PropertyAccumulator {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            entries: std::collections::HashMap::new(),
        }
    }

    fn push_literal(&mut self, name: &str, value: &str) {
        self.push(name, Value::String(value.to_string()), None);
    }

    fn push(&mut self, name: &str, value: Value, companion: Option<Value>) {
        if !self.entries.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.entries
            .entry(name.to_string())
            .or_default()
            .push((value, companion));
    }

    fn finish(mut self) -> Value {
        let mut map = Map::new();
        for name in &self.order {
            let occurrences = self.entries.remove(name).unwrap_or_default();
            let has_companion = occurrences.iter().any(|(_, c)| c.is_some());
            if occurrences.len() == 1 {
                let (value, companion) = occurrences.into_iter().next().unwrap();
                map.insert(name.clone(), value);
                if let Some(companion) = companion {
                    map.insert(format!("_{name}"), companion);
                }
            } else {
                let (values, companions): (Vec<Value>, Vec<Option<Value>>) =
                    occurrences.into_iter().unzip();
                map.insert(name.clone(), Value::Array(values));
                if has_companion {
                    map.insert(
                        format!("_{name}"),
                        Value::Array(
                            companions
                                .into_iter()
                                .map(|c| c.unwrap_or(Value::Null))
                                .collect(),
                        ),
                    );
                }
            }
        }
        Value::Object(map)
    }
}

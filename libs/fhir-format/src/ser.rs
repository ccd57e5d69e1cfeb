//! JSON → XML emission.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Value};
use std::io::Cursor;

use crate::{FormatError, FHIR_NS};

type XmlWriter = Writer<Cursor<Vec<u8>>>;

pub(crate) fn emit_resource(value: &Value) -> Result<String, FormatError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    emit_resource_element(&mut writer, value, true)?;
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn emit_resource_element(
    writer: &mut XmlWriter,
    value: &Value,
    with_namespace: bool,
) -> Result<(), FormatError> {
    let obj = value.as_object().ok_or(FormatError::ExpectedObject)?;
    let resource_type = obj
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or(FormatError::MissingResourceType)?;

    let mut root = BytesStart::new(resource_type);
    if with_namespace {
        root.push_attribute(("xmlns", FHIR_NS));
    }
    writer.write_event(Event::Start(root))?;
    // Resource-level `id` is an element, unlike element-level ids which are
    // attributes, so no special casing here.
    emit_members(writer, obj, &["resourceType"])?;
    writer.write_event(Event::End(BytesEnd::new(resource_type)))?;
    Ok(())
}

/// Emit an object's properties in declaration order, pairing each `field`
/// with its `_field` companion.
fn emit_members(
    writer: &mut XmlWriter,
    obj: &Map<String, Value>,
    skip: &[&str],
) -> Result<(), FormatError> {
    for (name, value) in obj {
        if name.starts_with('_') || skip.contains(&name.as_str()) {
            continue;
        }
        let companion = obj.get(&format!("_{name}"));
        emit_property(writer, name, value, companion)?;
    }
    // Companions without a sibling value (extension-only primitives).
    for (name, companion) in obj {
        if let Some(base) = name.strip_prefix('_') {
            if !obj.contains_key(base) && !skip.contains(&base) {
                emit_property(writer, base, &Value::Null, Some(companion))?;
            }
        }
    }
    Ok(())
}

fn emit_property(
    writer: &mut XmlWriter,
    name: &str,
    value: &Value,
    companion: Option<&Value>,
) -> Result<(), FormatError> {
    match value {
        Value::Array(items) => {
            let companions = companion.and_then(Value::as_array);
            for (idx, item) in items.iter().enumerate() {
                let item_companion = companions
                    .and_then(|c| c.get(idx))
                    .filter(|c| !c.is_null());
                emit_property(writer, name, item, item_companion)?;
            }
            Ok(())
        }
        Value::Object(map) if map.contains_key("resourceType") => {
            // A nested resource (`contained`, Bundle `resource`, ...): the
            // wrapper element holds one element named after the type.
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            emit_resource_element(writer, value, false)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
            Ok(())
        }
        Value::Object(map) => emit_complex(writer, name, map),
        Value::String(s) if name == "div" => {
            // Narrative is XHTML carried verbatim.
            writer.write_event(Event::Text(BytesText::from_escaped(s.as_str())))?;
            Ok(())
        }
        Value::Null => emit_primitive(writer, name, None, companion),
        primitive => emit_primitive(writer, name, Some(primitive), companion),
    }
}

fn emit_complex(
    writer: &mut XmlWriter,
    name: &str,
    map: &Map<String, Value>,
) -> Result<(), FormatError> {
    let mut start = BytesStart::new(name);
    let mut skip = vec!["id"];
    if let Some(Value::String(id)) = map.get("id") {
        start.push_attribute(("id", id.as_str()));
    }
    // Extensions carry their url as an attribute.
    if matches!(name, "extension" | "modifierExtension") {
        if let Some(Value::String(url)) = map.get("url") {
            start.push_attribute(("url", url.as_str()));
            skip.push("url");
        }
    }

    writer.write_event(Event::Start(start))?;
    emit_members(writer, map, &skip)?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn emit_primitive(
    writer: &mut XmlWriter,
    name: &str,
    value: Option<&Value>,
    companion: Option<&Value>,
) -> Result<(), FormatError> {
    let mut start = BytesStart::new(name);
    if let Some(v) = value {
        start.push_attribute(("value", scalar_text(v).as_str()));
    }

    let companion = companion.and_then(Value::as_object);
    let id = companion
        .and_then(|c| c.get("id"))
        .and_then(Value::as_str);
    if let Some(id) = id {
        start.push_attribute(("id", id));
    }
    let extensions = companion.and_then(|c| c.get("extension"));

    match extensions {
        Some(ext) => {
            writer.write_event(Event::Start(start))?;
            emit_property(writer, "extension", ext, None)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        None if value.is_some() || id.is_some() => {
            writer.write_event(Event::Empty(start))?;
        }
        None => {}
    }
    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

//! FHIR JSON ↔ XML conversion.
//!
//! Schema-agnostic codecs following the official HL7 mapping rules:
//! - The root element is named after `resourceType`, in the
//!   `http://hl7.org/fhir` namespace.
//! - Primitive values are carried in the `value` attribute; element `id`
//!   is an `id` attribute.
//! - Primitive metadata (`id`, `extension`) travels as `_field` companion
//!   properties in JSON and as attributes/children in XML.
//! - Repeating elements map to JSON arrays; primitive arrays keep a second,
//!   position-aligned metadata array with `null` placeholders.
//! - Narrative `div` content is XHTML (`http://www.w3.org/1999/xhtml`) and
//!   passes through verbatim.
//! - Contained resources nest as `<contained><ResourceName>…` without a
//!   namespace change.

mod de;
mod ser;

use thiserror::Error;

pub(crate) const FHIR_NS: &str = "http://hl7.org/fhir";
pub(crate) const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("expected a JSON object for the resource")]
    ExpectedObject,
    #[error("missing resourceType property")]
    MissingResourceType,
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),
}

/// Convert a FHIR resource from its JSON text to XML text.
pub fn json_to_xml(input: &str) -> Result<String, FormatError> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    value_to_xml(&value)
}

/// Convert an in-memory FHIR JSON value to XML text.
pub fn value_to_xml(value: &serde_json::Value) -> Result<String, FormatError> {
    ser::emit_resource(value)
}

/// Convert a FHIR resource from XML text to JSON text.
pub fn xml_to_json(input: &str) -> Result<String, FormatError> {
    let value = xml_to_value(input)?;
    Ok(serde_json::to_string(&value)?)
}

/// Convert XML text to an in-memory FHIR JSON value.
pub fn xml_to_value(input: &str) -> Result<serde_json::Value, FormatError> {
    de::read_resource(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_become_value_attributes() {
        let xml = value_to_xml(&json!({
            "resourceType": "Patient",
            "id": "pat-1",
            "active": true,
            "multipleBirthInteger": 2
        }))
        .unwrap();
        assert!(xml.starts_with("<Patient xmlns=\"http://hl7.org/fhir\">"));
        assert!(xml.contains("<id value=\"pat-1\"/>"));
        assert!(xml.contains("<active value=\"true\"/>"));
        assert!(xml.contains("<multipleBirthInteger value=\"2\"/>"));
    }

    #[test]
    fn primitive_metadata_round_trips() {
        let source = json!({
            "resourceType": "Patient",
            "birthDate": "1970-03-30",
            "_birthDate": {
                "id": "bd",
                "extension": [{"url": "http://example.com/ext", "valueString": "x"}]
            }
        });
        let xml = value_to_xml(&source).unwrap();
        assert!(xml.contains("<birthDate value=\"1970-03-30\" id=\"bd\">"));
        assert!(xml.contains("<extension url=\"http://example.com/ext\">"));

        let back = xml_to_value(&xml).unwrap();
        assert_eq!(back["birthDate"], "1970-03-30");
        assert_eq!(back["_birthDate"]["id"], "bd");
        assert_eq!(
            back["_birthDate"]["extension"][0]["url"],
            "http://example.com/ext"
        );
    }

    #[test]
    fn primitive_arrays_align_metadata() {
        let source = json!({
            "resourceType": "Patient",
            "name": [{
                "given": ["Adam", "Bert"],
                "_given": [null, {"id": "g2"}]
            }]
        });
        let xml = value_to_xml(&source).unwrap();
        assert!(xml.contains("<given value=\"Adam\"/>"));
        assert!(xml.contains("<given value=\"Bert\" id=\"g2\"/>"));

        let back = xml_to_value(&xml).unwrap();
        assert_eq!(back["name"][0]["given"], json!(["Adam", "Bert"]));
        assert_eq!(back["name"][0]["_given"], json!([null, {"id": "g2"}]));
    }

    #[test]
    fn contained_resources_nest() {
        let source = json!({
            "resourceType": "Observation",
            "status": "final",
            "contained": [{"resourceType": "Patient", "id": "p"}]
        });
        let xml = value_to_xml(&source).unwrap();
        assert!(xml.contains("<contained><Patient><id value=\"p\"/></Patient></contained>"));

        let back = xml_to_value(&xml).unwrap();
        assert_eq!(back["contained"][0]["resourceType"], "Patient");
    }

    #[test]
    fn narrative_passes_through() {
        let source = json!({
            "resourceType": "Patient",
            "text": {
                "status": "generated",
                "div": "<div xmlns=\"http://www.w3.org/1999/xhtml\"><p>hi</p></div>"
            }
        });
        let xml = value_to_xml(&source).unwrap();
        assert!(xml.contains("<div xmlns=\"http://www.w3.org/1999/xhtml\"><p>hi</p></div>"));

        let back = xml_to_value(&xml).unwrap();
        assert_eq!(back["text"]["status"], "generated");
        assert!(back["text"]["div"].as_str().unwrap().contains("<p>hi</p>"));
    }

    #[test]
    fn missing_resource_type_is_rejected() {
        assert!(matches!(
            value_to_xml(&json!({"id": "x"})),
            Err(FormatError::MissingResourceType)
        ));
        assert!(matches!(
            value_to_xml(&json!(42)),
            Err(FormatError::ExpectedObject)
        ));
    }
}

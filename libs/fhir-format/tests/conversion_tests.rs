//! Round-trip tests for the JSON ↔ XML codecs.

use kupfer_format::{json_to_xml, xml_to_json, xml_to_value};
use serde_json::{json, Value};

#[test]
fn json_xml_json_round_trip_is_stable() {
    let source = json!({
        "resourceType": "Observation",
        "id": "obs-1",
        "status": "final",
        "code": {
            "coding": [
                {"system": "http://loinc.org", "code": "8867-4"}
            ],
            "text": "Heart rate"
        },
        "valueQuantity": {
            "value": 80,
            "unit": "beats/minute",
            "system": "http://unitsofmeasure.org",
            "code": "/min"
        }
    });

    let xml = json_to_xml(&source.to_string()).unwrap();
    let back: Value = serde_json::from_str(&xml_to_json(&xml).unwrap()).unwrap();

    assert_eq!(back["resourceType"], "Observation");
    assert_eq!(back["id"], "obs-1");
    assert_eq!(back["code"]["coding"][0]["code"], "8867-4");
    assert_eq!(back["valueQuantity"]["value"], 80);

    // A second pass must be byte-identical.
    let xml2 = json_to_xml(&back.to_string()).unwrap();
    assert_eq!(xml, xml2);
}

#[test]
fn repeated_elements_collect_into_arrays() {
    let xml = r#"<Patient xmlns="http://hl7.org/fhir">
        <name><family value="Everyman"/><given value="Adam"/><given value="A."/></name>
        <name><family value="Other"/></name>
    </Patient>"#;

    let value = xml_to_value(xml).unwrap();
    let names = value["name"].as_array().unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(names[0]["given"], json!(["Adam", "A."]));
    assert_eq!(names[1]["family"], "Other");
}

#[test]
fn operation_outcome_round_trip() {
    let source = json!({
        "resourceType": "OperationOutcome",
        "issue": [
            {"severity": "error", "code": "not-found", "diagnostics": "no such resource"}
        ]
    });
    let xml = json_to_xml(&source.to_string()).unwrap();
    assert!(xml.contains("<severity value=\"error\"/>"));
    assert!(xml.contains("<code value=\"not-found\"/>"));

    let back: Value = serde_json::from_str(&xml_to_json(&xml).unwrap()).unwrap();
    assert_eq!(back["issue"]["severity"], "error");
}

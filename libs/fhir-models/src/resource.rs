//! Dynamic resource view
//!
//! The server core treats clinical resources as opaque JSON: everything it
//! needs is the `resourceType` discriminator, the logical `id`, and FHIRPath
//! navigation (which works on the raw tree). [`Resource`] wraps a
//! `serde_json::Value` object and provides exactly that surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("expected a JSON object for the resource")]
    ExpectedObject,
    #[error("missing resourceType property")]
    MissingResourceType,
    #[error("unexpected resource type: expected {expected}, got {actual}")]
    UnexpectedType { expected: String, actual: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A FHIR resource of any type, backed by its JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Value);

impl Resource {
    /// Wrap a JSON value, validating that it is an object with a string
    /// `resourceType` property.
    pub fn from_value(value: Value) -> Result<Self, ResourceError> {
        let obj = value.as_object().ok_or(ResourceError::ExpectedObject)?;
        match obj.get("resourceType") {
            Some(Value::String(_)) => Ok(Self(value)),
            _ => Err(ResourceError::MissingResourceType),
        }
    }

    /// The `resourceType` discriminator.
    pub fn resource_type(&self) -> &str {
        // Validated in `from_value`.
        self.0
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// The logical id, if the resource carries one.
    pub fn resource_id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Overwrite (or set) the logical id.
    pub fn set_id(&mut self, id: &str) {
        if let Some(obj) = self.0.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.to_string()));
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Decode into a typed model, checking the `resourceType` first so a
    /// mismatch yields a clear error instead of a field-level serde failure.
    pub fn decode<T: TypedResource>(&self) -> Result<T, ResourceError> {
        if self.resource_type() != T::TYPE {
            return Err(ResourceError::UnexpectedType {
                expected: T::TYPE.to_string(),
                actual: self.resource_type().to_string(),
            });
        }
        Ok(serde_json::from_value(self.0.clone())?)
    }

    /// Unwrap a contained-resource envelope.
    ///
    /// Operation results are often wrapped: a `Parameters` resource whose
    /// single parameter carries a resource, or a one-entry `Bundle`. Callers
    /// that expect a concrete type peel that envelope off first. A resource
    /// that is not an envelope is returned unchanged.
    pub fn unwrap_envelope(self) -> Resource {
        match self.resource_type() {
            "Parameters" => {
                let params = self
                    .0
                    .get("parameter")
                    .and_then(Value::as_array)
                    .map(|a| a.as_slice())
                    .unwrap_or(&[]);
                let mut inner = params.iter().filter_map(|p| p.get("resource"));
                match (inner.next(), inner.next()) {
                    (Some(resource), None) => Resource::from_value(resource.clone())
                        .map(Resource::unwrap_envelope)
                        .unwrap_or(self),
                    _ => self,
                }
            }
            "Bundle" => {
                let entries = self
                    .0
                    .get("entry")
                    .and_then(Value::as_array)
                    .map(|a| a.as_slice())
                    .unwrap_or(&[]);
                match entries {
                    [entry] => entry
                        .get("resource")
                        .cloned()
                        .and_then(|r| Resource::from_value(r).ok())
                        .unwrap_or(self),
                    _ => self,
                }
            }
            _ => self,
        }
    }
}

impl TryFrom<Value> for Resource {
    type Error = ResourceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// A resource type with a statically known `resourceType`.
///
/// Implemented by the typed infrastructure models in this crate; embedding
/// applications implement it for their own generated or hand-written types
/// to use the typed client-side wrappers.
pub trait TypedResource: Serialize + serde::de::DeserializeOwned {
    const TYPE: &'static str;

    fn to_resource(&self) -> Result<Resource, ResourceError> {
        Resource::from_value(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_requires_resource_type() {
        assert!(Resource::from_value(json!({"resourceType": "Patient"})).is_ok());
        assert!(matches!(
            Resource::from_value(json!({"id": "1"})),
            Err(ResourceError::MissingResourceType)
        ));
        assert!(matches!(
            Resource::from_value(json!([1, 2])),
            Err(ResourceError::ExpectedObject)
        ));
    }

    #[test]
    fn accessors() {
        let mut r =
            Resource::from_value(json!({"resourceType": "Patient", "id": "a1"})).unwrap();
        assert_eq!(r.resource_type(), "Patient");
        assert_eq!(r.resource_id(), Some("a1"));
        r.set_id("b2");
        assert_eq!(r.resource_id(), Some("b2"));
    }

    #[test]
    fn unwraps_parameters_envelope() {
        let r = Resource::from_value(json!({
            "resourceType": "Parameters",
            "parameter": [{"name": "return", "resource": {"resourceType": "Patient", "id": "x"}}]
        }))
        .unwrap();
        let inner = r.unwrap_envelope();
        assert_eq!(inner.resource_type(), "Patient");
        assert_eq!(inner.resource_id(), Some("x"));
    }

    #[test]
    fn ambiguous_envelope_is_left_alone() {
        let r = Resource::from_value(json!({
            "resourceType": "Parameters",
            "parameter": [
                {"name": "a", "resource": {"resourceType": "Patient"}},
                {"name": "b", "resource": {"resourceType": "Observation"}}
            ]
        }))
        .unwrap();
        assert_eq!(r.clone().unwrap_envelope(), r);
    }
}

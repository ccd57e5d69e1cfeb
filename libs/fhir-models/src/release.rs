//! FHIR release markers

use serde::{Deserialize, Serialize};

/// A major FHIR release.
///
/// Resource shapes differ across releases but the server core is
/// release-agnostic; the marker only feeds the synthesized
/// CapabilityStatement's `fhirVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FhirRelease {
    R4,
    R4B,
    #[default]
    R5,
}

impl FhirRelease {
    /// The `fhirVersion` wire value.
    pub fn version(self) -> &'static str {
        match self {
            Self::R4 => "4.0",
            Self::R4B => "4.3",
            Self::R5 => "5.0",
        }
    }
}

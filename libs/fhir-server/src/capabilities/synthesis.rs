//! CapabilityStatement synthesis
//!
//! Walks the registry and derives the full statement: one resource entry
//! per registered type with its interactions, declared search parameters
//! (canonical URLs anchored at the implementation URL) and operations.
//! All output is deterministically ordered so identical registries yield
//! byte-identical statements.

use std::collections::BTreeMap;

use kupfer_fhirpath::{EvalContext, Expression};
use kupfer_models::{
    CapabilityStatement, Implementation, Interaction, InteractionCode, Rest, RestMode,
    RestOperation, RestResource, RestSearchParam, SearchParamType, SearchParameter,
};

use super::registry::CapabilityRegistry;
use crate::error::{Error, Result};

pub fn synthesize(registry: &CapabilityRegistry) -> Result<CapabilityStatement> {
    let base = &registry.base;
    let implementation_url = base
        .implementation_url
        .clone()
        .ok_or_else(|| Error::Config("implementation.url is required".to_string()))?;

    let mut resources: BTreeMap<String, RestResource> = BTreeMap::new();

    for (resource_type, capability) in &registry.resources {
        let entry = resources
            .entry(resource_type.clone())
            .or_insert_with(|| RestResource {
                resource_type: resource_type.clone(),
                ..Default::default()
            });

        // Interactions in the fixed declaration order.
        let mut interactions = Vec::new();
        if capability.create.is_some() {
            interactions.push(InteractionCode::Create);
        }
        if capability.read.is_some() {
            interactions.push(InteractionCode::Read);
        }
        if capability.update.is_some() {
            interactions.push(InteractionCode::Update);
        }
        if capability.delete.is_some() {
            interactions.push(InteractionCode::Delete);
        }
        if capability.search.is_some() {
            interactions.push(InteractionCode::SearchType);
        }
        interactions.sort_by_key(|c| c.order());
        entry.interaction = interactions
            .into_iter()
            .map(|code| Interaction { code })
            .collect();

        if let Some((_, update_caps)) = &capability.update {
            entry.update_create = Some(update_caps.update_create);
        }

        if let Some((_, search_caps)) = &capability.search {
            let mut params = Vec::new();
            for parameter in &search_caps.parameters {
                let id = parameter_id(resource_type, parameter);
                params.push(RestSearchParam {
                    name: parameter.code.clone(),
                    definition: Some(format!("{implementation_url}/SearchParameter/{id}")),
                    param_type: declared_type(parameter),
                });
            }
            params.sort_by(|a, b| a.name.cmp(&b.name));
            entry.search_param = params;
        }
    }

    // Synthesized SearchParameter reads are always available when any
    // search parameter is declared.
    let has_params = resources.values().any(|r| !r.search_param.is_empty());
    if has_params && !resources.contains_key("SearchParameter") {
        resources.insert(
            "SearchParameter".to_string(),
            RestResource {
                resource_type: "SearchParameter".to_string(),
                interaction: vec![
                    Interaction {
                        code: InteractionCode::Read,
                    },
                    Interaction {
                        code: InteractionCode::SearchType,
                    },
                ],
                ..Default::default()
            },
        );
    }

    let mut system_operations = Vec::new();
    for operation in &registry.operations {
        let definition = &operation.definition;
        let id = definition
            .id
            .clone()
            .unwrap_or_else(|| sanitize(&definition.code));
        let canonical = format!("{implementation_url}/OperationDefinition/{id}");
        let rest_operation = RestOperation {
            name: definition.code.clone(),
            definition: canonical,
        };

        if definition.system {
            system_operations.push(rest_operation.clone());
        }
        if definition.type_level || definition.instance {
            let targets: Vec<String> = if definition.resource.is_empty() {
                registry.resources.keys().cloned().collect()
            } else {
                definition.resource.clone()
            };
            for target in targets {
                resources
                    .entry(target.clone())
                    .or_insert_with(|| RestResource {
                        resource_type: target,
                        ..Default::default()
                    })
                    .operation
                    .push(rest_operation.clone());
            }
        }
    }
    system_operations.sort_by(|a, b| a.name.cmp(&b.name));
    for entry in resources.values_mut() {
        entry.operation.sort_by(|a, b| a.name.cmp(&b.name));
    }

    Ok(CapabilityStatement {
        resource_type: "CapabilityStatement".to_string(),
        id: None,
        status: base.status.clone(),
        date: base.date.clone(),
        kind: base.kind,
        software: base.software.clone(),
        implementation: Some(Implementation {
            description: base.description.clone(),
            url: Some(implementation_url),
        }),
        fhir_version: Some(base.release.version().to_string()),
        format: base.formats.clone(),
        rest: vec![Rest {
            mode: RestMode::Server,
            resource: resources.into_values().collect(),
            operation: system_operations,
        }],
        extensions: Default::default(),
    })
}

/// Full SearchParameter resources for `SearchParameter/<id>` reads and
/// the fallback paginator, keyed and sorted by id.
pub(crate) fn synthesized_search_parameters(
    registry: &CapabilityRegistry,
) -> Result<BTreeMap<String, SearchParameter>> {
    let implementation_url = registry
        .base
        .implementation_url
        .clone()
        .ok_or_else(|| Error::Config("implementation.url is required".to_string()))?;

    let mut out = BTreeMap::new();
    for (resource_type, capability) in &registry.resources {
        let Some((_, search_caps)) = &capability.search else {
            continue;
        };
        for parameter in &search_caps.parameters {
            let id = parameter_id(resource_type, parameter);
            let mut parameter = parameter.clone();
            parameter.id = Some(id.clone());
            parameter.url = Some(format!("{implementation_url}/SearchParameter/{id}"));
            if parameter.base.is_empty() {
                parameter.base = vec![resource_type.clone()];
            }
            out.insert(id, parameter);
        }
    }
    Ok(out)
}

/// `<id>` for the canonical URL: the declared id, else `<Type>-<name>`
/// with unsafe characters stripped.
fn parameter_id(resource_type: &str, parameter: &SearchParameter) -> String {
    match &parameter.id {
        Some(id) => sanitize(id),
        None => sanitize(&format!("{resource_type}-{}", parameter.code)),
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'))
        .collect()
}

/// The parameter's FHIR type, read off the SearchParameter object with
/// FHIRPath; the typed field is the fallback for malformed objects.
fn declared_type(parameter: &SearchParameter) -> SearchParamType {
    let json = match serde_json::to_value(parameter) {
        Ok(json) => json,
        Err(_) => return parameter.param_type,
    };
    static TYPE_EXPR: &str = "type";
    Expression::parse(TYPE_EXPR)
        .ok()
        .and_then(|expr| expr.evaluate_resource(&EvalContext::new(), &json).ok())
        .and_then(|result| result.first().and_then(|v| v.render()))
        .and_then(|name| SearchParamType::parse(&name))
        .unwrap_or(parameter.param_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize("Patient-name"), "Patient-name");
        assert_eq!(sanitize("value[x] (test)"), "valuextest");
    }
}

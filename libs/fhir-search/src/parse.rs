//! Query parsing
//!
//! Turns decoded query pairs into a typed [`ParameterMap`] plus
//! [`SearchOptions`], governed by the server's CapabilityStatement and
//! its SearchParameter definitions.

use std::collections::HashMap;

use chrono::FixedOffset;
use kupfer_models::{CapabilityStatement, SearchParamType, SearchParameter};
use rust_decimal::Decimal;

use crate::dates::SearchDate;
use crate::error::{Error, Result};
use crate::escape::{split_unescaped, unescape};
use crate::options::{Cursor, SearchOptions, SummaryMode};
use crate::values::{
    MatchAll, MatchAny, ParameterKey, ParameterMap, Prefix, ReferenceValue, SearchValue,
    TokenValue, ValueKind,
};

/// Reserved result-modifying parameter names.
const RESULT_PARAMETERS: &[&str] = &[
    "_count",
    "_cursor",
    "_include",
    "_revinclude",
    "_summary",
    "_elements",
    "_contained",
    "_sort",
    "_format",
];

/// Server-side search configuration; purely programmatic.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Timezone applied to date values without an explicit offset.
    pub timezone: FixedOffset,
    /// Hard upper bound for `_count`.
    pub max_count: usize,
    /// Page size when the client sends no `_count` (or `_count=0`).
    pub default_count: usize,
    /// Strict mode fails on unknown parameters; lenient mode drops them.
    pub strict: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timezone: FixedOffset::east_opt(0).expect("UTC"),
            max_count: 500,
            default_count: 100,
            strict: false,
        }
    }
}

impl SearchConfig {
    pub fn clamp(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_count.min(self.max_count)
        } else {
            requested.min(self.max_count)
        }
    }
}

/// Resolves a SearchParameter canonical URL to its full definition.
pub trait DefinitionResolver {
    fn resolve(&self, canonical: &str) -> Option<SearchParameter>;
}

impl<F> DefinitionResolver for F
where
    F: Fn(&str) -> Option<SearchParameter>,
{
    fn resolve(&self, canonical: &str) -> Option<SearchParameter> {
        self(canonical)
    }
}

/// Parse decoded query pairs against the declared search parameters of
/// `resource_type`.
pub fn parse_query(
    capabilities: &CapabilityStatement,
    resource_type: &str,
    resolver: &dyn DefinitionResolver,
    query: &[(String, String)],
    config: &SearchConfig,
) -> Result<(ParameterMap, SearchOptions)> {
    let declared = capabilities
        .rest_resource(resource_type)
        .map(|r| r.search_param.as_slice())
        .unwrap_or(&[]);

    // Canonical resolution is memoized for the duration of one request.
    let mut definition_cache: HashMap<String, Option<SearchParameter>> = HashMap::new();

    let mut params = ParameterMap::new();
    let mut options = SearchOptions::with_count(config.clamp(0));

    for (raw_key, raw_value) in query {
        if RESULT_PARAMETERS.contains(&raw_key.as_str()) {
            apply_result_parameter(raw_key, raw_value, config, &mut options)?;
            continue;
        }

        let (name, modifier) = match raw_key.split_once(':') {
            Some((n, m)) => (n, Some(m.to_string())),
            None => (raw_key.as_str(), None),
        };

        let Some(declaration) = declared.iter().find(|p| p.name == name) else {
            if config.strict || name.starts_with('_') {
                return Err(Error::UnsupportedParameter(name.to_string()));
            }
            continue;
        };

        // The canonical definition refines the declared type when it
        // resolves; otherwise the CapabilityStatement's type stands.
        let param_type = match &declaration.definition {
            Some(canonical) => {
                let resolved = definition_cache
                    .entry(canonical.clone())
                    .or_insert_with(|| resolver.resolve(canonical));
                resolved
                    .as_ref()
                    .map(|d| d.param_type)
                    .unwrap_or(declaration.param_type)
            }
            None => declaration.param_type,
        };

        let mut group = MatchAny::default();
        for alternative in split_unescaped(raw_value, ',') {
            group.0.push(decode_value(alternative, param_type, config)?);
        }

        let key = ParameterKey {
            name: name.to_string(),
            modifier,
        };
        params.entry(key).or_insert_with(MatchAll::default).0.push(group);
    }

    Ok((params, options))
}

fn apply_result_parameter(
    key: &str,
    value: &str,
    config: &SearchConfig,
    options: &mut SearchOptions,
) -> Result<()> {
    match key {
        "_count" => {
            let requested: usize = value
                .parse()
                .map_err(|_| Error::InvalidCount(value.to_string()))?;
            options.count = config.clamp(requested);
        }
        "_cursor" => options.cursor = Some(Cursor(value.to_string())),
        "_include" => options.includes.push(value.to_string()),
        "_revinclude" => options.rev_includes.push(value.to_string()),
        "_summary" => {
            // Unknown summary modes are dropped rather than failed; they
            // are hints, not filters.
            options.summary = SummaryMode::parse(value);
        }
        "_elements" => options.elements.extend(
            split_unescaped(value, ',')
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        ),
        "_contained" => options.contained = Some(value.to_string()),
        "_sort" => options.sort.extend(
            split_unescaped(value, ',')
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        ),
        "_format" => {
            // Content negotiation; handled by the HTTP layer.
        }
        _ => unreachable!("caller checked RESULT_PARAMETERS"),
    }
    Ok(())
}

fn decode_value(alternative: &str, param_type: SearchParamType, config: &SearchConfig) -> Result<SearchValue> {
    let (prefix, rest) = strip_prefix(alternative, param_type)?;
    let kind = match param_type {
        SearchParamType::Number => {
            let number: Decimal = unescape(rest)
                .parse()
                .map_err(|_| Error::MalformedNumber(alternative.to_string()))?;
            ValueKind::Number(number)
        }
        SearchParamType::Date => {
            ValueKind::Date(SearchDate::parse(&unescape(rest), config.timezone)?)
        }
        SearchParamType::String => ValueKind::String(unescape(rest)),
        SearchParamType::Token => ValueKind::Token(decode_token(rest)),
        SearchParamType::Reference => ValueKind::Reference(decode_reference(rest)?),
        SearchParamType::Composite => ValueKind::Composite(
            split_unescaped(rest, '$')
                .into_iter()
                .map(unescape)
                .collect(),
        ),
        SearchParamType::Quantity => decode_quantity(rest)?,
        SearchParamType::Uri => ValueKind::Uri(unescape(rest)),
        SearchParamType::Special => ValueKind::Special(unescape(rest)),
    };
    Ok(SearchValue { prefix, kind })
}

/// Strip a two-letter comparison prefix where the type permits one.
/// Strings, tokens and URIs never lose their first two characters.
fn strip_prefix(value: &str, param_type: SearchParamType) -> Result<(Option<Prefix>, &str)> {
    if !param_type.allows_prefix() {
        return Ok((None, value));
    }
    let head: String = value.chars().take(2).collect();
    if head.len() < 2 || !head.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok((None, value));
    }
    match Prefix::parse(&head) {
        Some(prefix) => Ok((Some(prefix), &value[2..])),
        None => Err(Error::InvalidPrefix {
            prefix: head,
            param_type: param_type.as_str().to_string(),
        }),
    }
}

fn decode_token(value: &str) -> TokenValue {
    let parts = split_unescaped(value, '|');
    match parts.as_slice() {
        [code] => TokenValue {
            system: None,
            code: unescape(code),
        },
        [system, code @ ..] => TokenValue {
            system: Some(unescape(system)),
            code: unescape(&code.join("|")),
        },
        [] => TokenValue {
            system: None,
            code: String::new(),
        },
    }
}

fn decode_reference(value: &str) -> Result<ReferenceValue> {
    let parts = split_unescaped(value, '|');
    let (body, version) = match parts.as_slice() {
        [body] => (*body, None),
        [body, version] => (*body, Some(unescape(version))),
        _ => return Err(Error::MalformedReference(value.to_string())),
    };

    // Absolute URL references keep the URL verbatim.
    if url::Url::parse(body).is_ok() {
        return Ok(ReferenceValue::Url {
            url: unescape(body),
            version,
        });
    }

    let segments: Vec<&str> = body.split('/').collect();
    match segments.as_slice() {
        [resource_type, id] => Ok(ReferenceValue::Local {
            resource_type: unescape(resource_type),
            id: unescape(id),
            version,
        }),
        [resource_type, id, "_history", history_version] => {
            if version.is_some() {
                return Err(Error::MalformedReference(value.to_string()));
            }
            Ok(ReferenceValue::Local {
                resource_type: unescape(resource_type),
                id: unescape(id),
                version: Some(unescape(history_version)),
            })
        }
        [id] if !id.is_empty() && !id.contains('|') => Ok(ReferenceValue::Local {
            resource_type: String::new(),
            id: unescape(id),
            version,
        }),
        _ => Err(Error::MalformedReference(value.to_string())),
    }
}

fn decode_quantity(value: &str) -> Result<ValueKind> {
    let malformed = || Error::MalformedQuantity(value.to_string());
    let parts = split_unescaped(value, '|');
    let (number, system, code) = match parts.as_slice() {
        [v] => (*v, None, None),
        [v, s] => (*v, non_empty(s), None),
        [v, s, c] => (*v, non_empty(s), non_empty(c)),
        _ => return Err(malformed()),
    };
    let number: Decimal = unescape(number).parse().map_err(|_| malformed())?;
    Ok(ValueKind::Quantity {
        value: number,
        system,
        code,
    })
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(unescape(s))
    }
}

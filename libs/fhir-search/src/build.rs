//! Query emission — the inverse of parsing.
//!
//! Emission is deterministic: parameter keys come out in lexicographic
//! order (the map is a BTreeMap), option parameters follow in a fixed
//! order, and `_count` is always stamped last so self-links round-trip
//! even when the client never sent one.

use crate::dates::SearchDate;
use crate::escape::escape;
use crate::options::SearchOptions;
use crate::values::{ParameterMap, ReferenceValue, SearchValue, TokenValue, ValueKind};

/// Render a parameter map plus options as a query string (no leading `?`).
pub fn build_query(params: &ParameterMap, options: &SearchOptions) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for (key, match_all) in params {
        let key_text = match &key.modifier {
            Some(modifier) => format!("{}:{}", key.name, modifier),
            None => key.name.clone(),
        };
        for group in &match_all.0 {
            let value = group
                .0
                .iter()
                .map(render_value)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push((key_text.clone(), value));
        }
    }

    for include in &options.includes {
        pairs.push(("_include".to_string(), include.clone()));
    }
    for include in &options.rev_includes {
        pairs.push(("_revinclude".to_string(), include.clone()));
    }
    if !options.sort.is_empty() {
        pairs.push(("_sort".to_string(), options.sort.join(",")));
    }
    if let Some(summary) = options.summary {
        pairs.push(("_summary".to_string(), summary.as_str().to_string()));
    }
    if !options.elements.is_empty() {
        pairs.push(("_elements".to_string(), options.elements.join(",")));
    }
    if let Some(contained) = &options.contained {
        pairs.push(("_contained".to_string(), contained.clone()));
    }
    if let Some(cursor) = &options.cursor {
        pairs.push(("_cursor".to_string(), cursor.as_str().to_string()));
    }
    pairs.push(("_count".to_string(), options.count.to_string()));

    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", encode(&k), encode(&v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn render_value(value: &SearchValue) -> String {
    let prefix = value.prefix.map(|p| p.as_str()).unwrap_or("");
    format!("{prefix}{}", render_kind(&value.kind))
}

fn render_kind(kind: &ValueKind) -> String {
    match kind {
        ValueKind::Number(n) => n.to_string(),
        ValueKind::Date(d) => d.render(),
        ValueKind::String(s) | ValueKind::Uri(s) | ValueKind::Special(s) | ValueKind::Raw(s) => {
            escape(s)
        }
        ValueKind::Token(token) => render_token(token),
        ValueKind::Reference(reference) => render_reference(reference),
        ValueKind::Composite(parts) => parts
            .iter()
            .map(|p| escape(p))
            .collect::<Vec<_>>()
            .join("$"),
        ValueKind::Quantity {
            value,
            system,
            code,
        } => {
            if system.is_none() && code.is_none() {
                value.to_string()
            } else {
                format!(
                    "{}|{}|{}",
                    value,
                    system.as_deref().map(escape).unwrap_or_default(),
                    code.as_deref().map(escape).unwrap_or_default()
                )
            }
        }
    }
}

fn render_token(token: &TokenValue) -> String {
    match &token.system {
        None => escape(&token.code),
        Some(system) => format!("{}|{}", escape(system), escape(&token.code)),
    }
}

fn render_reference(reference: &ReferenceValue) -> String {
    match reference {
        ReferenceValue::Local {
            resource_type,
            id,
            version,
        } => {
            let mut out = if resource_type.is_empty() {
                escape(id)
            } else {
                format!("{}/{}", escape(resource_type), escape(id))
            };
            if let Some(version) = version {
                out.push_str("/_history/");
                out.push_str(&escape(version));
            }
            out
        }
        ReferenceValue::Url { url, version } => match version {
            Some(version) => format!("{}|{}", url, escape(version)),
            None => url.clone(),
        },
    }
}

/// Minimal percent-encoding: only characters that would break the query
/// string structure itself. Separators like `|`, `:` and `/` stay
/// readable, matching the forms clients send.
fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' | '=' | '#' | '+' | '%' | ' ' => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DatePrecision;
    use crate::options::Cursor;
    use crate::values::{MatchAll, MatchAny, ParameterKey, Prefix};
    use chrono::FixedOffset;

    #[test]
    fn keys_come_out_sorted_and_count_is_stamped() {
        let mut params = ParameterMap::new();
        params.insert(
            ParameterKey::new("zebra"),
            MatchAll(vec![MatchAny(vec![SearchValue::new(ValueKind::String(
                "z".into(),
            ))])]),
        );
        params.insert(
            ParameterKey::new("alpha"),
            MatchAll(vec![MatchAny(vec![SearchValue::new(ValueKind::String(
                "a".into(),
            ))])]),
        );
        let query = build_query(&params, &SearchOptions::with_count(100));
        assert_eq!(query, "alpha=a&zebra=z&_count=100");
    }

    #[test]
    fn number_with_prefix() {
        let mut params = ParameterMap::new();
        params.insert(
            ParameterKey::new("number"),
            MatchAll(vec![MatchAny(vec![SearchValue::with_prefix(
                Prefix::Ge,
                ValueKind::Number("0.100".parse().unwrap()),
            )])]),
        );
        let query = build_query(&params, &SearchOptions::with_count(100));
        assert_eq!(query, "number=ge0.100&_count=100");
    }

    #[test]
    fn cursor_and_date_render() {
        let date = SearchDate::parse("2024-12-25", FixedOffset::east_opt(0).unwrap()).unwrap();
        assert_eq!(date.precision, DatePrecision::Day);
        let mut params = ParameterMap::new();
        params.insert(
            ParameterKey::new("date"),
            MatchAll(vec![MatchAny(vec![SearchValue::new(ValueKind::Date(date))])]),
        );
        let mut options = SearchOptions::with_count(10);
        options.cursor = Some(Cursor("2".into()));
        assert_eq!(
            build_query(&params, &options),
            "date=2024-12-25&_cursor=2&_count=10"
        );
    }

    #[test]
    fn values_escape_separators() {
        let mut params = ParameterMap::new();
        params.insert(
            ParameterKey::new("name"),
            MatchAll(vec![MatchAny(vec![SearchValue::new(ValueKind::String(
                "a,b".into(),
            ))])]),
        );
        let query = build_query(&params, &SearchOptions::with_count(5));
        assert_eq!(query, r"name=a\,b&_count=5");
    }
}

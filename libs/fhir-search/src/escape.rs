//! FHIR search value escaping
//!
//! Search values escape the separator characters `,`, `|`, `$` and the
//! backslash itself with `\`. Splitting must ignore escaped separators;
//! unescaping happens after the split.

/// Split on an unescaped separator character.
pub fn split_unescaped(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&value[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Remove one level of `\`-escaping.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape the separator set for emission.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '|' | ',' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitting_respects_escapes() {
        assert_eq!(split_unescaped("a,b,c", ','), vec!["a", "b", "c"]);
        assert_eq!(split_unescaped(r"a\,b,c", ','), vec![r"a\,b", "c"]);
        assert_eq!(split_unescaped("", ','), vec![""]);
    }

    #[test]
    fn escape_round_trip() {
        let raw = r"a,b|c$d\e";
        assert_eq!(unescape(&escape(raw)), raw);
    }
}

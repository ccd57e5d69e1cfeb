//! String manipulation functions.
//!
//! All of these require a singleton string focus (empty propagates) and
//! operate on characters, not bytes.

use regex::Regex;

use super::singleton_string;
use crate::error::{Error, Result};
use crate::value::{Collection, Value};

fn focus(target: &Collection, what: &str) -> Result<Option<String>> {
    singleton_string(target, what)
}

pub fn index_of(target: &Collection, substring: &Collection) -> Result<Collection> {
    let (Some(s), Some(sub)) = (focus(target, "indexOf")?, singleton_string(substring, "indexOf")?)
    else {
        return Ok(Collection::empty());
    };
    let index = match s.find(&sub) {
        Some(byte_idx) => s[..byte_idx].chars().count() as i32,
        None => -1,
    };
    Ok(Collection::single(Value::Integer(index)))
}

pub fn substring(target: &Collection, args: &[Collection]) -> Result<Collection> {
    if args.is_empty() || args.len() > 2 {
        return Err(Error::Evaluation(
            "substring expects 1 or 2 arguments".to_string(),
        ));
    }
    let Some(s) = focus(target, "substring")? else {
        return Ok(Collection::empty());
    };
    let Some(start) = super::singleton_integer(&args[0], "substring")? else {
        return Ok(Collection::empty());
    };
    let chars: Vec<char> = s.chars().collect();
    if start < 0 || start as usize >= chars.len() {
        return Ok(Collection::empty());
    }
    let start = start as usize;
    let end = match args.get(1) {
        Some(len_arg) => match super::singleton_integer(len_arg, "substring")? {
            Some(len) if len > 0 => (start + len as usize).min(chars.len()),
            Some(_) => start,
            None => return Ok(Collection::empty()),
        },
        None => chars.len(),
    };
    Ok(Collection::single(Value::String(
        chars[start..end].iter().collect(),
    )))
}

pub fn starts_with(target: &Collection, prefix: &Collection) -> Result<Collection> {
    let (Some(s), Some(p)) = (
        focus(target, "startsWith")?,
        singleton_string(prefix, "startsWith")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(Collection::boolean(s.starts_with(&p)))
}

pub fn ends_with(target: &Collection, suffix: &Collection) -> Result<Collection> {
    let (Some(s), Some(p)) = (
        focus(target, "endsWith")?,
        singleton_string(suffix, "endsWith")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(Collection::boolean(s.ends_with(&p)))
}

pub fn contains(target: &Collection, needle: &Collection) -> Result<Collection> {
    let (Some(s), Some(n)) = (
        focus(target, "contains")?,
        singleton_string(needle, "contains")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(Collection::boolean(s.contains(&n)))
}

pub fn upper(target: &Collection) -> Result<Collection> {
    Ok(match focus(target, "upper")? {
        Some(s) => Collection::single(Value::String(s.to_uppercase())),
        None => Collection::empty(),
    })
}

pub fn lower(target: &Collection) -> Result<Collection> {
    Ok(match focus(target, "lower")? {
        Some(s) => Collection::single(Value::String(s.to_lowercase())),
        None => Collection::empty(),
    })
}

pub fn replace(target: &Collection, pattern: &Collection, substitution: &Collection) -> Result<Collection> {
    let (Some(s), Some(pat), Some(sub)) = (
        focus(target, "replace")?,
        singleton_string(pattern, "replace")?,
        singleton_string(substitution, "replace")?,
    ) else {
        return Ok(Collection::empty());
    };
    // An empty pattern surrounds every character with the substitution.
    let replaced = if pat.is_empty() {
        let mut out = sub.clone();
        for c in s.chars() {
            out.push(c);
            out.push_str(&sub);
        }
        out
    } else {
        s.replace(&pat, &sub)
    };
    Ok(Collection::single(Value::String(replaced)))
}

pub fn matches(target: &Collection, pattern: &Collection) -> Result<Collection> {
    let (Some(s), Some(pat)) = (
        focus(target, "matches")?,
        singleton_string(pattern, "matches")?,
    ) else {
        return Ok(Collection::empty());
    };
    let re = compile(&pat)?;
    Ok(Collection::boolean(re.is_match(&s)))
}

pub fn replace_matches(
    target: &Collection,
    pattern: &Collection,
    substitution: &Collection,
) -> Result<Collection> {
    let (Some(s), Some(pat), Some(sub)) = (
        focus(target, "replaceMatches")?,
        singleton_string(pattern, "replaceMatches")?,
        singleton_string(substitution, "replaceMatches")?,
    ) else {
        return Ok(Collection::empty());
    };
    let re = compile(&pat)?;
    Ok(Collection::single(Value::String(
        re.replace_all(&s, sub.as_str()).into_owned(),
    )))
}

pub fn length(target: &Collection) -> Result<Collection> {
    Ok(match focus(target, "length")? {
        Some(s) => Collection::single(Value::Integer(s.chars().count() as i32)),
        None => Collection::empty(),
    })
}

pub fn to_chars(target: &Collection) -> Result<Collection> {
    Ok(match focus(target, "toChars")? {
        Some(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
        None => Collection::empty(),
    })
}

pub fn trim(target: &Collection) -> Result<Collection> {
    Ok(match focus(target, "trim")? {
        Some(s) => Collection::single(Value::String(s.trim().to_string())),
        None => Collection::empty(),
    })
}

pub fn split(target: &Collection, separator: &Collection) -> Result<Collection> {
    let (Some(s), Some(sep)) = (
        focus(target, "split")?,
        singleton_string(separator, "split")?,
    ) else {
        return Ok(Collection::empty());
    };
    if sep.is_empty() {
        return Ok(s.chars().map(|c| Value::String(c.to_string())).collect());
    }
    Ok(s.split(sep.as_str())
        .map(|part| Value::String(part.to_string()))
        .collect())
}

/// Joins a collection of strings; unlike the rest of this module the
/// focus may hold many items.
pub fn join(target: &Collection, separator: Option<&Collection>) -> Result<Collection> {
    let sep = match separator {
        Some(c) => singleton_string(c, "join")?.unwrap_or_default(),
        None => String::new(),
    };
    let mut parts = Vec::with_capacity(target.len());
    for v in target.iter() {
        match v.resolved() {
            Value::String(s) => parts.push(s),
            other => {
                return Err(Error::Type(format!(
                    "join expects a collection of strings, found {}",
                    other.kind_name()
                )));
            }
        }
    }
    Ok(Collection::single(Value::String(parts.join(&sep))))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidRegex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Collection {
        Collection::single(Value::String(text.to_string()))
    }

    #[test]
    fn substring_bounds() {
        assert_eq!(substring(&s("hello"), &[Collection::single(Value::Integer(1))]).unwrap(), s("ello"));
        assert_eq!(
            substring(
                &s("hello"),
                &[
                    Collection::single(Value::Integer(1)),
                    Collection::single(Value::Integer(2))
                ]
            )
            .unwrap(),
            s("el")
        );
        // Start past the end yields empty, not an error.
        assert_eq!(
            substring(&s("hi"), &[Collection::single(Value::Integer(9))]).unwrap(),
            Collection::empty()
        );
    }

    #[test]
    fn index_of_counts_characters() {
        assert_eq!(
            index_of(&s("äbc"), &s("c")).unwrap(),
            Collection::single(Value::Integer(2))
        );
        assert_eq!(
            index_of(&s("abc"), &s("x")).unwrap(),
            Collection::single(Value::Integer(-1))
        );
    }

    #[test]
    fn regex_errors_are_reported() {
        assert!(matches!(
            matches(&s("abc"), &s("[")),
            Err(Error::InvalidRegex(_))
        ));
        assert_eq!(
            replace_matches(&s("a1b2"), &s(r"\d"), &s("#")).unwrap(),
            s("a#b#")
        );
    }

    #[test]
    fn join_and_split() {
        let parts = split(&s("a,b,c"), &s(",")).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(join(&parts, Some(&s("-"))).unwrap(), s("a-b-c"));
    }
}

//! Conversion functions: `toX` and `convertsToX`.
//!
//! In `convertsTo` mode a failed conversion is `false`; in `to` mode it is
//! an evaluation error. Empty input propagates in both modes.

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::temporal;
use crate::value::{Collection, Date, DateTime, DateTimePrecision, Quantity, Value};

/// Shared driver: resolve the singleton, attempt the conversion, map the
/// outcome per mode.
fn convert(
    target: &Collection,
    probe: bool,
    to: &'static str,
    f: impl Fn(&Value) -> Option<Value>,
) -> Result<Collection> {
    let Some(v) = target.singleton()? else {
        return Ok(Collection::empty());
    };
    let v = v.resolved();
    match f(&v) {
        Some(converted) => Ok(if probe {
            Collection::boolean(true)
        } else {
            Collection::single(converted)
        }),
        None => {
            if probe {
                Ok(Collection::boolean(false))
            } else {
                Err(Error::conversion(v.kind_name(), to))
            }
        }
    }
}

pub fn to_boolean(target: &Collection, probe: bool) -> Result<Collection> {
    convert(target, probe, "Boolean", |v| match v {
        Value::Boolean(b) => Some(Value::Boolean(*b)),
        Value::Integer(1) => Some(Value::Boolean(true)),
        Value::Integer(0) => Some(Value::Boolean(false)),
        Value::Long(1) => Some(Value::Boolean(true)),
        Value::Long(0) => Some(Value::Boolean(false)),
        Value::Decimal(d) if *d == Decimal::ONE => Some(Value::Boolean(true)),
        Value::Decimal(d) if d.is_zero() => Some(Value::Boolean(false)),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(Value::Boolean(true)),
            "false" | "f" | "no" | "n" | "0" | "0.0" => Some(Value::Boolean(false)),
            _ => None,
        },
        _ => None,
    })
}

pub fn to_integer(target: &Collection, probe: bool) -> Result<Collection> {
    convert(target, probe, "Integer", |v| match v {
        Value::Integer(i) => Some(Value::Integer(*i)),
        Value::Long(l) => i32::try_from(*l).ok().map(Value::Integer),
        Value::Boolean(b) => Some(Value::Integer(*b as i32)),
        Value::String(s) => s.parse::<i32>().ok().map(Value::Integer),
        _ => None,
    })
}

pub fn to_long(target: &Collection, probe: bool) -> Result<Collection> {
    convert(target, probe, "Long", |v| match v {
        Value::Integer(i) => Some(Value::Long(*i as i64)),
        Value::Long(l) => Some(Value::Long(*l)),
        Value::Boolean(b) => Some(Value::Long(*b as i64)),
        Value::String(s) => s.parse::<i64>().ok().map(Value::Long),
        _ => None,
    })
}

pub fn to_decimal(target: &Collection, probe: bool) -> Result<Collection> {
    convert(target, probe, "Decimal", |v| match v {
        Value::Integer(i) => Some(Value::Decimal(Decimal::from(*i))),
        Value::Long(l) => Some(Value::Decimal(Decimal::from(*l))),
        Value::Decimal(d) => Some(Value::Decimal(*d)),
        Value::Boolean(b) => Some(Value::Decimal(if *b { Decimal::ONE } else { Decimal::ZERO })),
        Value::String(s) => s.trim().parse::<Decimal>().ok().map(Value::Decimal),
        _ => None,
    })
}

pub fn to_string(target: &Collection, probe: bool) -> Result<Collection> {
    convert(target, probe, "String", |v| v.render().map(Value::String))
}

pub fn to_date(target: &Collection, probe: bool) -> Result<Collection> {
    convert(target, probe, "Date", |v| match v {
        Value::Date(d) => Some(Value::Date(*d)),
        Value::DateTime(dt) => Some(Value::Date(Date {
            date: dt.date,
            precision: match dt.precision {
                DateTimePrecision::Year => crate::value::DatePrecision::Year,
                DateTimePrecision::Month => crate::value::DatePrecision::Month,
                _ => crate::value::DatePrecision::Day,
            },
        })),
        Value::String(s) => temporal::parse_date(s).map(Value::Date),
        _ => None,
    })
}

pub fn to_datetime(target: &Collection, probe: bool) -> Result<Collection> {
    convert(target, probe, "DateTime", |v| match v {
        Value::DateTime(dt) => Some(Value::DateTime(*dt)),
        Value::Date(d) => Some(Value::DateTime(DateTime {
            date: d.date,
            time: chrono::NaiveTime::from_hms_opt(0, 0, 0)?,
            precision: d.precision.into(),
            offset: None,
        })),
        Value::String(s) => temporal::parse_datetime(s).map(Value::DateTime),
        _ => None,
    })
}

pub fn to_time(target: &Collection, probe: bool) -> Result<Collection> {
    convert(target, probe, "Time", |v| match v {
        Value::Time(t) => Some(Value::Time(*t)),
        Value::String(s) => temporal::parse_time(s).map(Value::Time),
        _ => None,
    })
}

pub fn to_quantity(
    target: &Collection,
    unit: Option<&Collection>,
    probe: bool,
) -> Result<Collection> {
    let expected_unit = match unit {
        Some(c) => match super::singleton_string(c, "toQuantity")? {
            Some(u) => Some(u),
            None => return Ok(Collection::empty()),
        },
        None => None,
    };
    convert(target, probe, "Quantity", move |v| {
        let q = match v {
            Value::Quantity(q) => Some(q.clone()),
            Value::Integer(i) => Some(Quantity::new(Decimal::from(*i), "1")),
            Value::Long(l) => Some(Quantity::new(Decimal::from(*l), "1")),
            Value::Decimal(d) => Some(Quantity::new(*d, "1")),
            Value::Boolean(b) => Some(Quantity::new(
                if *b { Decimal::ONE } else { Decimal::ZERO },
                "1",
            )),
            Value::String(s) => parse_quantity_string(s),
            _ => None,
        }?;
        // With a target unit the value must already carry a compatible one;
        // no unit conversion is attempted.
        if let Some(expected) = &expected_unit {
            if crate::value::normalize_unit(expected) != q.normalized_unit() {
                return None;
            }
        }
        Some(Value::Quantity(q))
    })
}

/// `"4.5 'mg'"` or `"4 days"` or plain `"4"`.
fn parse_quantity_string(s: &str) -> Option<Quantity> {
    let s = s.trim();
    let (number, rest) = match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    };
    let value: Decimal = number.parse().ok()?;
    if rest.is_empty() {
        return Some(Quantity::new(value, "1"));
    }
    let unit = rest
        .strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .unwrap_or(rest);
    if unit.is_empty() || unit.contains(char::is_whitespace) {
        return None;
    }
    Some(Quantity::new(value, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(v: Value) -> Collection {
        Collection::single(v)
    }

    #[test]
    fn converts_mode_vs_strict_mode() {
        let bad = one(Value::String("abc".into()));
        assert_eq!(
            to_integer(&bad, true).unwrap(),
            Collection::boolean(false)
        );
        assert!(matches!(
            to_integer(&bad, false),
            Err(Error::ConversionFailed { .. })
        ));
        // Empty propagates in both modes.
        assert_eq!(to_integer(&Collection::empty(), false).unwrap(), Collection::empty());
    }

    #[test]
    fn boolean_string_forms() {
        for s in ["true", "T", "yes", "Y", "1", "1.0"] {
            assert_eq!(
                to_boolean(&one(Value::String(s.into())), false).unwrap(),
                Collection::boolean(true),
                "{s}"
            );
        }
        assert_eq!(
            to_boolean(&one(Value::String("no".into())), false).unwrap(),
            Collection::boolean(false)
        );
    }

    #[test]
    fn quantity_strings() {
        let q = parse_quantity_string("4.5 'mg'").unwrap();
        assert_eq!(q.unit, "mg");
        let q = parse_quantity_string("4 days").unwrap();
        assert_eq!(q.normalized_unit(), "day");
        assert!(parse_quantity_string("x days").is_none());
    }

    #[test]
    fn datetime_from_date_keeps_precision() {
        let d = temporal::parse_date("2024-12").unwrap();
        let result = to_datetime(&one(Value::Date(d)), false).unwrap();
        match result.first().unwrap() {
            Value::DateTime(dt) => assert_eq!(dt.precision, DateTimePrecision::Month),
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Math functions.
//!
//! Exponential and logarithmic functions compute through `f64` and return
//! Decimal results; non-finite outcomes yield empty. Integer-preserving
//! functions keep integer types.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};
use crate::value::{
    Collection, DatePrecision, DateTimePrecision, Number, Quantity, TimePrecision, Value,
};

fn numeric(target: &Collection, what: &str) -> Result<Option<Value>> {
    match target.singleton()? {
        None => Ok(None),
        Some(v) => {
            let v = v.resolved();
            match v {
                Value::Integer(_) | Value::Long(_) | Value::Decimal(_) | Value::Quantity(_) => {
                    Ok(Some(v))
                }
                other => Err(Error::Type(format!(
                    "{what} expects a number, found {}",
                    other.kind_name()
                ))),
            }
        }
    }
}

fn decimal(target: &Collection, what: &str) -> Result<Option<Decimal>> {
    Ok(match numeric(target, what)? {
        None => None,
        Some(Value::Quantity(_)) => {
            return Err(Error::Type(format!("{what} expects a number, found Quantity")));
        }
        Some(v) => Number::of(&v).map(Number::as_decimal),
    })
}

pub fn abs(target: &Collection) -> Result<Collection> {
    Ok(match numeric(target, "abs")? {
        None => Collection::empty(),
        Some(Value::Integer(i)) => Collection::single(Value::Integer(
            i.checked_abs().ok_or(Error::ArithmeticOverflow)?,
        )),
        Some(Value::Long(l)) => Collection::single(Value::Long(
            l.checked_abs().ok_or(Error::ArithmeticOverflow)?,
        )),
        Some(Value::Decimal(d)) => Collection::single(Value::Decimal(d.abs())),
        Some(Value::Quantity(q)) => {
            Collection::single(Value::Quantity(Quantity::new(q.value.abs(), q.unit)))
        }
        Some(_) => unreachable!("filtered by numeric()"),
    })
}

pub fn ceiling(target: &Collection) -> Result<Collection> {
    integral(target, "ceiling", Decimal::ceil)
}

pub fn floor(target: &Collection) -> Result<Collection> {
    integral(target, "floor", Decimal::floor)
}

pub fn truncate(target: &Collection) -> Result<Collection> {
    integral(target, "truncate", Decimal::trunc)
}

fn integral(
    target: &Collection,
    what: &str,
    f: impl Fn(&Decimal) -> Decimal,
) -> Result<Collection> {
    Ok(match decimal(target, what)? {
        None => Collection::empty(),
        Some(d) => {
            let result = f(&d).to_i64().ok_or(Error::ArithmeticOverflow)?;
            match i32::try_from(result) {
                Ok(i) => Collection::single(Value::Integer(i)),
                Err(_) => Collection::single(Value::Long(result)),
            }
        }
    })
}

pub fn round(target: &Collection, digits: Option<&Collection>) -> Result<Collection> {
    let Some(d) = decimal(target, "round")? else {
        return Ok(Collection::empty());
    };
    let digits = match digits {
        Some(c) => match super::singleton_integer(c, "round")? {
            Some(n) if n >= 0 => n as u32,
            Some(_) => {
                return Err(Error::Evaluation(
                    "round expects a non-negative precision".to_string(),
                ));
            }
            None => return Ok(Collection::empty()),
        },
        None => 0,
    };
    Ok(Collection::single(Value::Decimal(
        d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero),
    )))
}

pub fn exp(target: &Collection) -> Result<Collection> {
    through_f64(target, "exp", f64::exp)
}

pub fn ln(target: &Collection) -> Result<Collection> {
    through_f64(target, "ln", f64::ln)
}

pub fn sqrt(target: &Collection) -> Result<Collection> {
    through_f64(target, "sqrt", f64::sqrt)
}

pub fn log(target: &Collection, base: &Collection) -> Result<Collection> {
    let (Some(d), Some(b)) = (decimal(target, "log")?, decimal(base, "log")?) else {
        return Ok(Collection::empty());
    };
    let (Some(d), Some(b)) = (d.to_f64(), b.to_f64()) else {
        return Ok(Collection::empty());
    };
    finite(d.log(b))
}

pub fn power(target: &Collection, exponent: &Collection) -> Result<Collection> {
    let (Some(base), Some(exp)) = (numeric(target, "power")?, decimal(exponent, "power")?) else {
        return Ok(Collection::empty());
    };
    // Integer base with non-negative integer exponent stays integral.
    if let (Value::Integer(b), Some(e)) = (&base, exp.to_u32().filter(|_| exp.fract().is_zero())) {
        if let Some(result) = b.checked_pow(e) {
            return Ok(Collection::single(Value::Integer(result)));
        }
        return Err(Error::ArithmeticOverflow);
    }
    let Some(b) = Number::of(&base).map(Number::as_decimal).and_then(|d| d.to_f64()) else {
        return Ok(Collection::empty());
    };
    let Some(e) = exp.to_f64() else {
        return Ok(Collection::empty());
    };
    finite(b.powf(e))
}

fn through_f64(target: &Collection, what: &str, f: impl Fn(f64) -> f64) -> Result<Collection> {
    let Some(d) = decimal(target, what)? else {
        return Ok(Collection::empty());
    };
    let Some(x) = d.to_f64() else {
        return Ok(Collection::empty());
    };
    finite(f(x))
}

fn finite(x: f64) -> Result<Collection> {
    if !x.is_finite() {
        return Ok(Collection::empty());
    }
    Ok(Decimal::from_f64(x)
        .map(|d| Collection::single(Value::Decimal(d)))
        .unwrap_or_default())
}

/// Number of significant positions in the value's written form.
pub fn precision(target: &Collection) -> Result<Collection> {
    let Some(v) = target.singleton()? else {
        return Ok(Collection::empty());
    };
    let digits = match v.resolved() {
        Value::Decimal(d) => d.scale() as i32,
        Value::Integer(_) | Value::Long(_) => 0,
        Value::Date(d) => match d.precision {
            DatePrecision::Year => 4,
            DatePrecision::Month => 6,
            DatePrecision::Day => 8,
        },
        Value::DateTime(dt) => match dt.precision {
            DateTimePrecision::Year => 4,
            DateTimePrecision::Month => 6,
            DateTimePrecision::Day => 8,
            DateTimePrecision::Hour => 10,
            DateTimePrecision::Minute => 12,
            DateTimePrecision::Second => 14,
            DateTimePrecision::Millisecond => 17,
        },
        Value::Time(t) => match t.precision {
            TimePrecision::Hour => 2,
            TimePrecision::Minute => 4,
            TimePrecision::Second => 6,
            TimePrecision::Millisecond => 9,
        },
        other => {
            return Err(Error::Type(format!(
                "precision is not defined for {}",
                other.kind_name()
            )));
        }
    };
    Ok(Collection::single(Value::Integer(digits)))
}

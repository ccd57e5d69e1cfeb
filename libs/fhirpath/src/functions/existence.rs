//! Existence functions: `empty`, `exists`, `count`, boolean aggregates,
//! subset tests.

use crate::error::{Error, Result};
use crate::value::{Collection, Value};

pub fn empty(target: &Collection) -> Collection {
    Collection::boolean(target.is_empty())
}

pub fn exists(target: &Collection) -> Collection {
    Collection::boolean(!target.is_empty())
}

pub fn count(target: &Collection) -> Collection {
    Collection::single(Value::Integer(target.len() as i32))
}

pub fn is_distinct(target: &Collection) -> Collection {
    Collection::boolean(target.distinct().len() == target.len())
}

pub fn not(target: &Collection) -> Result<Collection> {
    Ok(match target.as_boolean()? {
        Some(b) => Collection::boolean(!b),
        None => Collection::empty(),
    })
}

pub fn all_true(target: &Collection) -> Result<Collection> {
    booleans(target).map(|bs| Collection::boolean(bs.iter().all(|b| *b)))
}

pub fn any_true(target: &Collection) -> Result<Collection> {
    booleans(target).map(|bs| Collection::boolean(bs.iter().any(|b| *b)))
}

pub fn all_false(target: &Collection) -> Result<Collection> {
    booleans(target).map(|bs| Collection::boolean(bs.iter().all(|b| !*b)))
}

pub fn any_false(target: &Collection) -> Result<Collection> {
    booleans(target).map(|bs| Collection::boolean(bs.iter().any(|b| !*b)))
}

pub fn subset_of(candidate: &Collection, of: &Collection) -> Collection {
    Collection::boolean(candidate.iter().all(|v| of.contains_value(v)))
}

fn booleans(target: &Collection) -> Result<Vec<bool>> {
    target
        .iter()
        .map(|v| match v.resolved() {
            Value::Boolean(b) => Ok(b),
            other => Err(Error::Type(format!(
                "expected a collection of booleans, found {}",
                other.kind_name()
            ))),
        })
        .collect()
}

//! The FHIRPath standard function library
//!
//! Eagerly-evaluated functions, grouped the way the FHIRPath
//! specification groups them.
//! Iterator functions that need lazy argument evaluation (`where`,
//! `select`, `repeat`, `iif`, `defineVariable`, `sort`, ...) live in the
//! engine because they re-enter evaluation.

pub mod combining;
pub mod conversion;
pub mod existence;
pub mod fhir;
pub mod math;
pub mod navigation;
pub mod string;
pub mod subsetting;
pub mod temporal;

use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::value::{Collection, Node, Value};

pub(crate) fn dispatch(
    ctx: &EvalContext,
    name: &str,
    target: Collection,
    args: Vec<Collection>,
) -> Result<Collection> {
    match name {
        // Existence
        "empty" => arity(name, &args, 0).map(|_| existence::empty(&target)),
        "exists" => arity(name, &args, 0).map(|_| existence::exists(&target)),
        "count" => arity(name, &args, 0).map(|_| existence::count(&target)),
        "distinct" => arity(name, &args, 0).map(|_| target.distinct()),
        "isDistinct" => arity(name, &args, 0).map(|_| existence::is_distinct(&target)),
        "allTrue" => arity(name, &args, 0).and_then(|_| existence::all_true(&target)),
        "anyTrue" => arity(name, &args, 0).and_then(|_| existence::any_true(&target)),
        "allFalse" => arity(name, &args, 0).and_then(|_| existence::all_false(&target)),
        "anyFalse" => arity(name, &args, 0).and_then(|_| existence::any_false(&target)),
        "subsetOf" => one_arg(name, args).map(|other| existence::subset_of(&target, &other)),
        "supersetOf" => one_arg(name, args).map(|other| existence::subset_of(&other, &target)),
        "not" => arity(name, &args, 0).and_then(|_| existence::not(&target)),

        // Subsetting
        "first" => arity(name, &args, 0).map(|_| subsetting::first(&target)),
        "last" => arity(name, &args, 0).map(|_| subsetting::last(&target)),
        "tail" => arity(name, &args, 0).map(|_| subsetting::tail(&target)),
        "skip" => one_arg(name, args).and_then(|n| subsetting::skip(&target, &n)),
        "take" => one_arg(name, args).and_then(|n| subsetting::take(&target, &n)),
        "intersect" => one_arg(name, args).map(|other| subsetting::intersect(&target, &other)),
        "exclude" => one_arg(name, args).map(|other| subsetting::exclude(&target, &other)),
        "single" => arity(name, &args, 0).and_then(|_| subsetting::single(&target)),

        // Combining
        "union" => one_arg(name, args).map(|other| combining::union(&target, &other)),
        "combine" => one_arg(name, args).map(|other| combining::combine(target, other)),

        // Conversion
        "toBoolean" => conversion::to_boolean(&target, false),
        "convertsToBoolean" => conversion::to_boolean(&target, true),
        "toInteger" => conversion::to_integer(&target, false),
        "convertsToInteger" => conversion::to_integer(&target, true),
        "toLong" => conversion::to_long(&target, false),
        "convertsToLong" => conversion::to_long(&target, true),
        "toDecimal" => conversion::to_decimal(&target, false),
        "convertsToDecimal" => conversion::to_decimal(&target, true),
        "toString" => conversion::to_string(&target, false),
        "convertsToString" => conversion::to_string(&target, true),
        "toDate" => conversion::to_date(&target, false),
        "convertsToDate" => conversion::to_date(&target, true),
        "toDateTime" => conversion::to_datetime(&target, false),
        "convertsToDateTime" => conversion::to_datetime(&target, true),
        "toTime" => conversion::to_time(&target, false),
        "convertsToTime" => conversion::to_time(&target, true),
        "toQuantity" => conversion::to_quantity(&target, args.first(), false),
        "convertsToQuantity" => conversion::to_quantity(&target, args.first(), true),

        // Strings
        "indexOf" => one_arg(name, args).and_then(|sub| string::index_of(&target, &sub)),
        "substring" => string::substring(&target, &args),
        "startsWith" => one_arg(name, args).and_then(|p| string::starts_with(&target, &p)),
        "endsWith" => one_arg(name, args).and_then(|s| string::ends_with(&target, &s)),
        "contains" => one_arg(name, args).and_then(|s| string::contains(&target, &s)),
        "upper" => arity(name, &args, 0).and_then(|_| string::upper(&target)),
        "lower" => arity(name, &args, 0).and_then(|_| string::lower(&target)),
        "replace" => two_args(name, args).and_then(|(p, s)| string::replace(&target, &p, &s)),
        "matches" => one_arg(name, args).and_then(|r| string::matches(&target, &r)),
        "replaceMatches" => {
            two_args(name, args).and_then(|(r, s)| string::replace_matches(&target, &r, &s))
        }
        "length" => arity(name, &args, 0).and_then(|_| string::length(&target)),
        "toChars" => arity(name, &args, 0).and_then(|_| string::to_chars(&target)),
        "trim" => arity(name, &args, 0).and_then(|_| string::trim(&target)),
        "split" => one_arg(name, args).and_then(|sep| string::split(&target, &sep)),
        "join" => string::join(&target, args.first()),

        // Math
        "abs" => arity(name, &args, 0).and_then(|_| math::abs(&target)),
        "ceiling" => arity(name, &args, 0).and_then(|_| math::ceiling(&target)),
        "floor" => arity(name, &args, 0).and_then(|_| math::floor(&target)),
        "round" => math::round(&target, args.first()),
        "truncate" => arity(name, &args, 0).and_then(|_| math::truncate(&target)),
        "exp" => arity(name, &args, 0).and_then(|_| math::exp(&target)),
        "ln" => arity(name, &args, 0).and_then(|_| math::ln(&target)),
        "log" => one_arg(name, args).and_then(|base| math::log(&target, &base)),
        "power" => one_arg(name, args).and_then(|e| math::power(&target, &e)),
        "sqrt" => arity(name, &args, 0).and_then(|_| math::sqrt(&target)),
        "precision" => arity(name, &args, 0).and_then(|_| math::precision(&target)),

        // Tree navigation
        "children" => arity(name, &args, 0).map(|_| navigation::children(&target)),
        "descendants" => arity(name, &args, 0).map(|_| navigation::descendants(&target)),

        // Type reflection
        "type" => arity(name, &args, 0).map(|_| type_of(&target)),

        // Temporal
        "now" => arity(name, &args, 0).map(|_| temporal::now(ctx)),
        "today" => arity(name, &args, 0).map(|_| temporal::today(ctx)),
        "timeOfDay" => arity(name, &args, 0).map(|_| temporal::time_of_day(ctx)),

        // FHIR-specific
        "extension" => one_arg(name, args).and_then(|url| fhir::extension(&target, &url)),
        "hasValue" => arity(name, &args, 0).map(|_| fhir::has_value(&target)),
        "getValue" => arity(name, &args, 0).map(|_| fhir::get_value(&target)),
        "conformsTo" => one_arg(name, args).and_then(|url| fhir::conforms_to(&target, &url)),

        _ => Err(Error::UnknownFunction(name.to_string())),
    }
}

fn type_of(target: &Collection) -> Collection {
    target
        .iter()
        .map(|v| {
            let (namespace, name) = v.type_info();
            Value::Node(Node::from_json(serde_json::json!({
                "namespace": namespace,
                "name": name,
            })))
        })
        .collect()
}

// ----------------------------------------------------------------------
// Argument plumbing
// ----------------------------------------------------------------------

fn arity(name: &str, args: &[Collection], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Error::Evaluation(format!(
            "{name} expects {expected} argument(s), got {}",
            args.len()
        )))
    }
}

fn one_arg(name: &str, mut args: Vec<Collection>) -> Result<Collection> {
    if args.len() == 1 {
        Ok(args.remove(0))
    } else {
        Err(Error::Evaluation(format!(
            "{name} expects exactly one argument, got {}",
            args.len()
        )))
    }
}

fn two_args(name: &str, mut args: Vec<Collection>) -> Result<(Collection, Collection)> {
    if args.len() == 2 {
        let second = args.remove(1);
        Ok((args.remove(0), second))
    } else {
        Err(Error::Evaluation(format!(
            "{name} expects exactly two arguments, got {}",
            args.len()
        )))
    }
}

/// Singleton string extraction: empty propagates, anything non-string is
/// a type error.
pub(crate) fn singleton_string(c: &Collection, what: &str) -> Result<Option<String>> {
    match c.singleton()? {
        None => Ok(None),
        Some(v) => match v.resolved() {
            Value::String(s) => Ok(Some(s)),
            other => Err(Error::Type(format!(
                "{what} expects a string, found {}",
                other.kind_name()
            ))),
        },
    }
}

pub(crate) fn singleton_integer(c: &Collection, what: &str) -> Result<Option<i64>> {
    match c.singleton()? {
        None => Ok(None),
        Some(v) => match v.resolved() {
            Value::Integer(i) => Ok(Some(i as i64)),
            Value::Long(l) => Ok(Some(l)),
            other => Err(Error::Type(format!(
                "{what} expects an integer, found {}",
                other.kind_name()
            ))),
        },
    }
}

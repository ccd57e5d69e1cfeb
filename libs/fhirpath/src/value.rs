//! FHIRPath values and collections
//!
//! The evaluator works on [`Collection`]s of [`Value`]s. Primitives carry
//! their own precision/unit metadata; everything non-primitive is a
//! [`Node`] backed by the resource's JSON tree. Navigating to a primitive
//! child yields the primitive value directly unless a `_field` companion
//! is present, in which case a primitive node carries the metadata along
//! (equality and equivalence ignore it, `extension()` can read it).

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::temporal;

// ============================================================================
// Precisions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateTimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimePrecision {
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl From<DatePrecision> for DateTimePrecision {
    fn from(p: DatePrecision) -> Self {
        match p {
            DatePrecision::Year => Self::Year,
            DatePrecision::Month => Self::Month,
            DatePrecision::Day => Self::Day,
        }
    }
}

impl From<TimePrecision> for DateTimePrecision {
    fn from(p: TimePrecision) -> Self {
        match p {
            TimePrecision::Hour => Self::Hour,
            TimePrecision::Minute => Self::Minute,
            TimePrecision::Second => Self::Second,
            TimePrecision::Millisecond => Self::Millisecond,
        }
    }
}

// ============================================================================
// Temporal values
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub date: NaiveDate,
    pub precision: DatePrecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub precision: DateTimePrecision,
    /// Zone offset in seconds east of UTC; `None` when unzoned.
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub time: NaiveTime,
    pub precision: TimePrecision,
}

impl DateTime {
    /// The instant components normalized to UTC (unzoned values are taken
    /// as UTC so comparisons stay deterministic).
    fn utc_parts(&self) -> NaiveDateTime {
        let local = NaiveDateTime::new(self.date, self.time);
        match self.offset {
            Some(secs) => local - chrono::Duration::seconds(secs as i64),
            None => local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// The unit with UCUM calendar codes mapped to their word forms and
    /// plural words singularized, for comparison purposes.
    pub fn normalized_unit(&self) -> String {
        normalize_unit(&self.unit)
    }
}

/// Map UCUM time-valued codes (`a`, `mo`, `d`, ...) and plural calendar
/// words onto the singular calendar words.
pub fn normalize_unit(unit: &str) -> String {
    match unit {
        "a" | "years" | "year" => "year".to_string(),
        "mo" | "months" | "month" => "month".to_string(),
        "wk" | "weeks" | "week" => "week".to_string(),
        "d" | "days" | "day" => "day".to_string(),
        "h" | "hours" | "hour" => "hour".to_string(),
        "min" | "minutes" | "minute" => "minute".to_string(),
        "s" | "seconds" | "second" => "second".to_string(),
        "ms" | "milliseconds" | "millisecond" => "millisecond".to_string(),
        "" => "1".to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// JSON-backed nodes
// ============================================================================

/// A tree node backed by resource JSON.
///
/// Complex nodes wrap an object; primitive nodes wrap a scalar together
/// with its `_field` companion metadata.
#[derive(Debug, Clone)]
pub struct Node {
    json: Arc<serde_json::Value>,
    companion: Option<Arc<serde_json::Value>>,
    type_name: Option<String>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        *self.json == *other.json
    }
}

impl Node {
    pub fn from_json(json: serde_json::Value) -> Self {
        Self::from_json_typed(json, None)
    }

    /// Wrap JSON with an externally known type name (used for choice-type
    /// properties, where `valueQuantity` implies the `Quantity` type).
    /// An embedded `resourceType` always wins.
    pub fn from_json_typed(json: serde_json::Value, type_hint: Option<String>) -> Self {
        let type_name = json
            .get("resourceType")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .or(type_hint);
        Self {
            json: Arc::new(json),
            companion: None,
            type_name,
        }
    }

    fn primitive(json: serde_json::Value, companion: Option<serde_json::Value>) -> Self {
        Self {
            json: Arc::new(json),
            companion: companion.map(Arc::new),
            type_name: None,
        }
    }

    pub fn json(&self) -> &serde_json::Value {
        &self.json
    }

    pub fn companion(&self) -> Option<&serde_json::Value> {
        self.companion.as_deref()
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn is_primitive(&self) -> bool {
        !self.json.is_object() && !self.json.is_array()
    }

    /// Named children in declaration order. With an empty name list, all
    /// children are returned; otherwise only the named ones, still in the
    /// order they are declared on the element.
    ///
    /// Choice-type properties match on their prefix: asking for `value`
    /// finds `valueQuantity`, and the suffix becomes the child's type name.
    pub fn children(&self, names: &[&str]) -> Vec<Value> {
        let Some(obj) = self.json.as_object() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (key, json) in obj {
            if key == "resourceType" || key.starts_with('_') {
                continue;
            }
            let type_hint = if names.is_empty() {
                None
            } else if names.contains(&key.as_str()) {
                None
            } else {
                match names.iter().find_map(|n| choice_suffix(key, n)) {
                    Some(suffix) => Some(suffix),
                    None => continue,
                }
            };
            let companion = obj.get(&format!("_{key}"));
            match json {
                serde_json::Value::Array(items) => {
                    let companions = companion.and_then(serde_json::Value::as_array);
                    for (idx, item) in items.iter().enumerate() {
                        let item_companion =
                            companions.and_then(|c| c.get(idx)).filter(|c| !c.is_null());
                        if let Some(v) = json_to_child(item, item_companion, type_hint.clone()) {
                            out.push(v);
                        }
                    }
                }
                other => {
                    if let Some(v) = json_to_child(other, companion, type_hint) {
                        out.push(v);
                    }
                }
            }
        }
        out
    }
}

/// The choice-type suffix when `key` is `name` + a PascalCase tail
/// (`valueQuantity` for `value` → `Quantity`).
fn choice_suffix(key: &str, name: &str) -> Option<String> {
    let suffix = key.strip_prefix(name)?;
    if suffix.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        Some(suffix.to_string())
    } else {
        None
    }
}

/// Convert a JSON leaf or subtree to a FHIRPath value.
///
/// Returns `None` for `null` (an absent element).
pub fn json_to_value(
    json: &serde_json::Value,
    companion: Option<&serde_json::Value>,
) -> Option<Value> {
    json_to_child(json, companion, None)
}

fn json_to_child(
    json: &serde_json::Value,
    companion: Option<&serde_json::Value>,
    type_hint: Option<String>,
) -> Option<Value> {
    if json.is_null() {
        return None;
    }
    if companion.is_some() && !json.is_object() && !json.is_array() {
        return Some(Value::Node(Node::primitive(
            json.clone(),
            companion.cloned(),
        )));
    }
    Some(match json {
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => number_to_value(n),
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::Node(Node::from_json_typed(other.clone(), type_hint)),
    })
}

fn number_to_value(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        if let Ok(small) = i32::try_from(i) {
            return Value::Integer(small);
        }
        return Value::Long(i);
    }
    match n.to_string().parse::<Decimal>() {
        Ok(d) => Value::Decimal(d),
        Err(_) => Value::String(n.to_string()),
    }
}

// ============================================================================
// Value
// ============================================================================

/// A single FHIRPath value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Decimal(Decimal),
    String(String),
    Date(Date),
    DateTime(DateTime),
    Time(Time),
    Quantity(Quantity),
    Node(Node),
}

impl Value {
    /// Unwrap a primitive node into its plain primitive value; all other
    /// values are returned as-is.
    pub fn resolved(&self) -> Value {
        match self {
            Value::Node(node) if node.is_primitive() => {
                json_to_value(node.json(), None).unwrap_or_else(|| self.clone())
            }
            other => other.clone(),
        }
    }

    /// Short type name for diagnostics and `type()`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Long(_) => "Long",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Date(_) => "Date",
            Value::DateTime(_) => "DateTime",
            Value::Time(_) => "Time",
            Value::Quantity(_) => "Quantity",
            Value::Node(_) => "Node",
        }
    }

    /// `(namespace, name)` per the FHIRPath type reflection model.
    pub fn type_info(&self) -> (String, String) {
        match self {
            Value::Node(node) => {
                if node.is_primitive() {
                    let (ns, name) = self.resolved().type_info_primitive();
                    (ns, name)
                } else {
                    match node.type_name() {
                        Some(name) => ("FHIR".to_string(), name.to_string()),
                        None => ("FHIR".to_string(), "Element".to_string()),
                    }
                }
            }
            _ => self.type_info_primitive(),
        }
    }

    fn type_info_primitive(&self) -> (String, String) {
        ("System".to_string(), self.kind_name().to_string())
    }

    /// Child navigation; primitives have no children.
    pub fn children(&self, names: &[&str]) -> Vec<Value> {
        match self {
            Value::Node(node) => node.children(names),
            _ => Vec::new(),
        }
    }

    /// Render per the FHIRPath `toString` rules; complex nodes have no
    /// string form.
    pub fn render(&self) -> Option<String> {
        match self.resolved() {
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Long(l) => Some(l.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::String(s) => Some(s),
            Value::Date(d) => Some(render_date(&d)),
            Value::DateTime(dt) => Some(render_datetime(&dt)),
            Value::Time(t) => Some(render_time(&t)),
            Value::Quantity(q) => {
                let unit = q.normalized_unit();
                if is_calendar_unit(&unit) {
                    Some(format!("{} {}", q.value, unit))
                } else {
                    Some(format!("{} '{}'", q.value, q.unit))
                }
            }
            Value::Node(_) => None,
        }
    }
}

fn is_calendar_unit(unit: &str) -> bool {
    matches!(
        unit,
        "year" | "month" | "week" | "day" | "hour" | "minute" | "second" | "millisecond"
    )
}

pub(crate) fn render_date(d: &Date) -> String {
    match d.precision {
        DatePrecision::Year => d.date.format("%Y").to_string(),
        DatePrecision::Month => d.date.format("%Y-%m").to_string(),
        DatePrecision::Day => d.date.format("%Y-%m-%d").to_string(),
    }
}

pub(crate) fn render_datetime(dt: &DateTime) -> String {
    let date_part = match dt.precision {
        DateTimePrecision::Year => return dt.date.format("%Y").to_string(),
        DateTimePrecision::Month => return dt.date.format("%Y-%m").to_string(),
        DateTimePrecision::Day => return dt.date.format("%Y-%m-%d").to_string(),
        _ => dt.date.format("%Y-%m-%d").to_string(),
    };
    let time_part = match dt.precision {
        DateTimePrecision::Hour => format!("{:02}", dt.time.hour()),
        DateTimePrecision::Minute => dt.time.format("%H:%M").to_string(),
        DateTimePrecision::Second => dt.time.format("%H:%M:%S").to_string(),
        _ => format!(
            "{}.{:03}",
            dt.time.format("%H:%M:%S"),
            dt.time.nanosecond() / 1_000_000
        ),
    };
    let zone = match dt.offset {
        None => String::new(),
        Some(0) => "Z".to_string(),
        Some(secs) => {
            let sign = if secs < 0 { '-' } else { '+' };
            let abs = secs.abs();
            format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
        }
    };
    format!("{date_part}T{time_part}{zone}")
}

pub(crate) fn render_time(t: &Time) -> String {
    match t.precision {
        TimePrecision::Hour => format!("{:02}", t.time.hour()),
        TimePrecision::Minute => t.time.format("%H:%M").to_string(),
        TimePrecision::Second => t.time.format("%H:%M:%S").to_string(),
        TimePrecision::Millisecond => format!(
            "{}.{:03}",
            t.time.format("%H:%M:%S"),
            t.time.nanosecond() / 1_000_000
        ),
    }
}

// ============================================================================
// Equality, equivalence, ordering
// ============================================================================

/// Numeric tower used by comparisons and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Integer(i32),
    Long(i64),
    Decimal(Decimal),
}

impl Number {
    pub(crate) fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(i) => Some(Number::Integer(*i)),
            Value::Long(l) => Some(Number::Long(*l)),
            Value::Decimal(d) => Some(Number::Decimal(*d)),
            _ => None,
        }
    }

    pub(crate) fn as_decimal(self) -> Decimal {
        match self {
            Number::Integer(i) => Decimal::from(i),
            Number::Long(l) => Decimal::from(l),
            Number::Decimal(d) => d,
        }
    }
}

/// FHIRPath `=`. `None` means the comparison is undefined (empty result).
pub fn equal(a: &Value, b: &Value) -> Option<bool> {
    let a = a.resolved();
    let b = b.resolved();

    if let (Some(x), Some(y)) = (Number::of(&a), Number::of(&b)) {
        return Some(x.as_decimal() == y.as_decimal());
    }

    match (&a, &b) {
        (Value::Boolean(x), Value::Boolean(y)) => Some(x == y),
        (Value::String(x), Value::String(y)) => Some(x == y),
        (Value::Quantity(x), Value::Quantity(y)) => {
            if x.normalized_unit() == y.normalized_unit() {
                Some(x.value == y.value)
            } else {
                None
            }
        }
        (Value::Time(x), Value::Time(y)) => compare_times(x, y).map(Ordering::is_eq),
        (Value::Date(_) | Value::DateTime(_), Value::Date(_) | Value::DateTime(_)) => {
            compare_temporal(&a, &b).map(Ordering::is_eq)
        }
        // FHIR primitives surface as strings without a schema; compare
        // against temporal literals by parsing.
        (Value::String(s), Value::Date(_) | Value::DateTime(_) | Value::Time(_)) => {
            coerce_temporal_string(s, &b).as_ref().and_then(|v| equal(v, &b))
        }
        (Value::Date(_) | Value::DateTime(_) | Value::Time(_), Value::String(s)) => {
            coerce_temporal_string(s, &a).as_ref().and_then(|v| equal(&a, v))
        }
        (Value::Node(x), Value::Node(y)) => Some(x == y),
        _ => Some(false),
    }
}

/// FHIRPath `~`: always defined.
pub fn equivalent(a: &Value, b: &Value) -> bool {
    let a = a.resolved();
    let b = b.resolved();

    if let (Some(x), Some(y)) = (Number::of(&a), Number::of(&b)) {
        let (x, y) = (x.as_decimal(), y.as_decimal());
        let dp = x.scale().min(y.scale());
        return x.round_dp(dp) == y.round_dp(dp);
    }

    match (&a, &b) {
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::String(x), Value::String(y)) => normalize_string(x) == normalize_string(y),
        (Value::Quantity(x), Value::Quantity(y)) => {
            x.normalized_unit() == y.normalized_unit() && x.value == y.value
        }
        (Value::Time(x), Value::Time(y)) => compare_times(x, y) == Some(Ordering::Equal),
        (Value::Date(_) | Value::DateTime(_), Value::Date(_) | Value::DateTime(_)) => {
            // Precision mismatch is a definite "not equivalent", not empty.
            compare_temporal(&a, &b) == Some(Ordering::Equal)
        }
        (Value::String(s), Value::Date(_) | Value::DateTime(_) | Value::Time(_)) => {
            coerce_temporal_string(s, &b).is_some_and(|v| equivalent(&v, &b))
        }
        (Value::Date(_) | Value::DateTime(_) | Value::Time(_), Value::String(s)) => {
            coerce_temporal_string(s, &a).is_some_and(|v| equivalent(&a, &v))
        }
        (Value::Node(x), Value::Node(y)) => json_equivalent(x.json(), y.json()),
        _ => false,
    }
}

fn normalize_string(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Structural equivalence on JSON subtrees, ignoring element `id`,
/// `extension` and `_field` companions.
fn json_equivalent(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value as J;
    match (a, b) {
        (J::Object(x), J::Object(y)) => {
            let keep = |m: &serde_json::Map<String, J>| {
                m.iter()
                    .filter(|(k, _)| {
                        !k.starts_with('_') && k.as_str() != "id" && k.as_str() != "extension"
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>()
            };
            let (xs, ys) = (keep(x), keep(y));
            xs.len() == ys.len()
                && xs.iter().all(|(k, v)| {
                    ys.iter()
                        .any(|(k2, v2)| k == k2 && json_equivalent(v, v2))
                })
        }
        (J::Array(x), J::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(v, w)| json_equivalent(v, w))
        }
        (J::String(x), J::String(y)) => normalize_string(x) == normalize_string(y),
        _ => a == b,
    }
}

fn coerce_temporal_string(s: &str, like: &Value) -> Option<Value> {
    match like {
        Value::Date(_) => temporal::parse_date(s).map(Value::Date),
        Value::DateTime(_) => temporal::parse_datetime(s).map(Value::DateTime),
        Value::Time(_) => temporal::parse_time(s).map(Value::Time),
        _ => None,
    }
}

/// Ordering for `<  <=  >  >=`.
///
/// `Ok(None)` is the undefined case (differing temporal precision);
/// incomparable types are an error.
pub fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>> {
    let a = a.resolved();
    let b = b.resolved();

    if let (Some(x), Some(y)) = (Number::of(&a), Number::of(&b)) {
        return Ok(Some(x.as_decimal().cmp(&y.as_decimal())));
    }

    match (&a, &b) {
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        (Value::Quantity(x), Value::Quantity(y)) => {
            if x.normalized_unit() == y.normalized_unit() {
                Ok(Some(x.value.cmp(&y.value)))
            } else {
                Err(Error::Type(format!(
                    "cannot compare quantities with units '{}' and '{}'",
                    x.unit, y.unit
                )))
            }
        }
        (Value::Time(x), Value::Time(y)) => Ok(compare_times(x, y)),
        (Value::Date(_) | Value::DateTime(_), Value::Date(_) | Value::DateTime(_)) => {
            Ok(compare_temporal(&a, &b))
        }
        (Value::String(s), Value::Date(_) | Value::DateTime(_) | Value::Time(_)) => {
            match coerce_temporal_string(s, &b) {
                Some(v) => compare(&v, &b),
                None => Err(Error::Type(format!("cannot compare String to {}", b.kind_name()))),
            }
        }
        (Value::Date(_) | Value::DateTime(_) | Value::Time(_), Value::String(s)) => {
            match coerce_temporal_string(s, &a) {
                Some(v) => compare(&a, &v),
                None => Err(Error::Type(format!("cannot compare {} to String", a.kind_name()))),
            }
        }
        _ => Err(Error::Type(format!(
            "cannot compare {} to {}",
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

/// Precision-aware comparison for Date/DateTime operands.
fn compare_temporal(a: &Value, b: &Value) -> Option<Ordering> {
    let (pa, parts_a) = datetime_parts(a)?;
    let (pb, parts_b) = datetime_parts(b)?;

    let common = precision_index(pa).min(precision_index(pb));
    for i in 0..=common {
        match parts_a[i].cmp(&parts_b[i]) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    if pa == pb {
        Some(Ordering::Equal)
    } else {
        None
    }
}

fn datetime_parts(v: &Value) -> Option<(DateTimePrecision, [u32; 7])> {
    let (precision, parts) = match v {
        Value::Date(d) => (
            d.precision.into(),
            NaiveDateTime::new(d.date, NaiveTime::from_hms_opt(0, 0, 0)?),
        ),
        Value::DateTime(dt) => (dt.precision, dt.utc_parts()),
        _ => return None,
    };
    Some((
        precision,
        [
            parts.year() as u32,
            parts.month(),
            parts.day(),
            parts.hour(),
            parts.minute(),
            parts.second(),
            parts.nanosecond() / 1_000_000,
        ],
    ))
}

fn precision_index(p: DateTimePrecision) -> usize {
    match p {
        DateTimePrecision::Year => 0,
        DateTimePrecision::Month => 1,
        DateTimePrecision::Day => 2,
        DateTimePrecision::Hour => 3,
        DateTimePrecision::Minute => 4,
        DateTimePrecision::Second => 5,
        DateTimePrecision::Millisecond => 6,
    }
}

fn compare_times(a: &Time, b: &Time) -> Option<Ordering> {
    let parts = |t: &Time| {
        [
            t.time.hour(),
            t.time.minute(),
            t.time.second(),
            t.time.nanosecond() / 1_000_000,
        ]
    };
    let (pa, pb) = (a.precision, b.precision);
    let common = time_precision_index(pa).min(time_precision_index(pb));
    let (xs, ys) = (parts(a), parts(b));
    for i in 0..=common {
        match xs[i].cmp(&ys[i]) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    if pa == pb {
        Some(Ordering::Equal)
    } else {
        None
    }
}

fn time_precision_index(p: TimePrecision) -> usize {
    match p {
        TimePrecision::Hour => 0,
        TimePrecision::Minute => 1,
        TimePrecision::Second => 2,
        TimePrecision::Millisecond => 3,
    }
}

// ============================================================================
// Collection
// ============================================================================

/// An ordered, possibly-empty collection of values — the result of every
/// FHIRPath evaluation step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection(SmallVec<[Value; 1]>);

impl Collection {
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    pub fn single(value: Value) -> Self {
        let mut v = SmallVec::new();
        v.push(value);
        Self(v)
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        Self(values.into())
    }

    pub fn boolean(value: bool) -> Self {
        Self::single(Value::Boolean(value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn extend(&mut self, other: Collection) {
        self.0.extend(other.0);
    }

    /// The singleton rule: empty stays empty, one element is the scalar,
    /// more is an error.
    pub fn singleton(&self) -> Result<Option<&Value>> {
        match self.0.len() {
            0 => Ok(None),
            1 => Ok(Some(&self.0[0])),
            n => Err(Error::SingletonRequired { found: n }),
        }
    }

    /// Boolean singleton evaluation: a lone non-boolean value counts as
    /// `true` (collection-exists semantics).
    pub fn as_boolean(&self) -> Result<Option<bool>> {
        match self.singleton()? {
            None => Ok(None),
            Some(v) => match v.resolved() {
                Value::Boolean(b) => Ok(Some(b)),
                _ => Ok(Some(true)),
            },
        }
    }

    /// Membership using `=` semantics; an undefined comparison counts as
    /// not-a-member.
    pub fn contains_value(&self, value: &Value) -> bool {
        self.0.iter().any(|v| equal(v, value) == Some(true))
    }

    /// Deduplicate using `=` semantics, preserving first occurrence order.
    pub fn distinct(&self) -> Collection {
        let mut out = Collection::empty();
        for v in self.iter() {
            if !out.contains_value(v) {
                out.push(v.clone());
            }
        }
        out
    }
}

impl IntoIterator for Collection {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 1]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Value> for Collection {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> Value {
        Value::Date(temporal::parse_date(s).unwrap())
    }

    fn datetime(s: &str) -> Value {
        Value::DateTime(temporal::parse_datetime(s).unwrap())
    }

    #[test]
    fn numeric_equality_widens() {
        assert_eq!(
            equal(&Value::Integer(2), &Value::Decimal(Decimal::new(20, 1))),
            Some(true)
        );
        assert_eq!(equal(&Value::Long(2), &Value::Integer(2)), Some(true));
    }

    #[test]
    fn temporal_equality_respects_precision() {
        assert_eq!(equal(&date("2024-12-25"), &date("2024-12-25")), Some(true));
        // Same prefix, different precision: undefined.
        assert_eq!(equal(&date("2024-12"), &date("2024-12-25")), None);
        // Different prefix: defined false.
        assert_eq!(equal(&date("2024-11"), &date("2024-12-25")), Some(false));
        // Date at day precision vs dateTime at second precision: undefined.
        assert_eq!(
            equal(&date("2024-12-25"), &datetime("2024-12-25T10:00:00Z")),
            None
        );
    }

    #[test]
    fn datetime_offsets_normalize() {
        assert_eq!(
            equal(
                &datetime("2015-02-04T14:00:00+01:00"),
                &datetime("2015-02-04T13:00:00Z")
            ),
            Some(true)
        );
    }

    #[test]
    fn equivalence_is_total() {
        assert!(!equivalent(&date("2024-12"), &date("2024-12-25")));
        assert!(equivalent(
            &Value::String("Hello  World".into()),
            &Value::String("hello world".into())
        ));
        assert!(equivalent(
            &Value::Decimal("1.01".parse().unwrap()),
            &Value::Decimal("1.012".parse().unwrap())
        ));
    }

    #[test]
    fn quantity_units_normalize() {
        let a = Value::Quantity(Quantity::new(Decimal::ONE, "a"));
        let b = Value::Quantity(Quantity::new(Decimal::ONE, "year"));
        assert_eq!(equal(&a, &b), Some(true));
        let c = Value::Quantity(Quantity::new(Decimal::ONE, "kg"));
        assert_eq!(equal(&a, &c), None);
    }

    #[test]
    fn node_children_follow_declaration_order() {
        let node = Node::from_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "name": [{"family": "Everyman"}, {"family": "Other"}],
            "active": true
        }));
        let all = node.children(&[]);
        assert_eq!(all.len(), 4);
        let names = node.children(&["name"]);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn primitive_companion_rides_along() {
        let node = Node::from_json(json!({
            "resourceType": "Patient",
            "birthDate": "1970-03-30",
            "_birthDate": {"extension": [{"url": "u", "valueCode": "x"}]}
        }));
        let birth = &node.children(&["birthDate"])[0];
        assert!(matches!(birth, Value::Node(n) if n.companion().is_some()));
        // Equality ignores the companion.
        assert_eq!(
            equal(birth, &Value::String("1970-03-30".into())),
            Some(true)
        );
    }

    #[test]
    fn singleton_rule() {
        let c = Collection::from_vec(vec![Value::Integer(1), Value::Integer(2)]);
        assert!(matches!(
            c.singleton(),
            Err(Error::SingletonRequired { found: 2 })
        ));
        assert_eq!(Collection::empty().as_boolean().unwrap(), None);
        assert_eq!(
            Collection::single(Value::String("x".into()))
                .as_boolean()
                .unwrap(),
            Some(true)
        );
    }
}

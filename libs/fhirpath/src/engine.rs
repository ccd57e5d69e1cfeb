//! FHIRPath evaluation
//!
//! [`Expression::parse`] produces an immutable, reusable expression;
//! [`Expression::evaluate`] walks it against an input collection. The
//! walker owns the lexical variable scopes (`defineVariable`) and the
//! iterator bindings (`$this`, `$index`, `$total`); everything shared and
//! immutable lives in [`EvalContext`].

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expr, Literal, TypeOp, TypeSpecifier};
use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::functions;
use crate::value::{
    self, Collection, Date, DateTime, Node, Number, Quantity, Time, Value,
};

/// A parsed FHIRPath expression, immutable and reusable across evaluations.
#[derive(Debug, Clone)]
pub struct Expression {
    root: Expr,
    source: String,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            root: crate::parser::Parser::parse(source)?,
            source: source.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.root
    }

    /// Evaluate against an input collection.
    pub fn evaluate(&self, ctx: &EvalContext, input: Collection) -> Result<Collection> {
        let mut evaluator = Evaluator {
            ctx,
            scopes: vec![HashMap::new()],
        };
        let env = Env {
            this: &input,
            index: None,
            total: None,
        };
        evaluator.eval(&self.root, &input, env)
    }

    /// Evaluate with a resource as the root element.
    pub fn evaluate_resource(
        &self,
        ctx: &EvalContext,
        resource: &serde_json::Value,
    ) -> Result<Collection> {
        let input = Collection::single(Value::Node(Node::from_json(resource.clone())));
        self.evaluate(ctx, input)
    }
}

/// One-shot convenience: parse and evaluate against a resource.
pub fn evaluate(
    ctx: &EvalContext,
    source: &str,
    resource: &serde_json::Value,
) -> Result<Collection> {
    Expression::parse(source)?.evaluate_resource(ctx, resource)
}

/// Per-iteration bindings.
#[derive(Clone, Copy)]
struct Env<'a> {
    this: &'a Collection,
    index: Option<i32>,
    total: Option<&'a Collection>,
}

struct Evaluator<'a> {
    ctx: &'a EvalContext,
    scopes: Vec<HashMap<String, Collection>>,
}

impl<'a> Evaluator<'a> {
    fn eval(&mut self, expr: &Expr, input: &Collection, env: Env<'_>) -> Result<Collection> {
        match expr {
            Expr::Empty => Ok(Collection::empty()),
            Expr::Literal(lit) => Ok(Collection::single(literal_value(lit))),
            Expr::Identifier(name) => Ok(navigate(input, name)),
            Expr::ExternalConstant(name) => self.constant(name),
            Expr::This => Ok(env.this.clone()),
            Expr::Index => Ok(match env.index {
                Some(i) => Collection::single(Value::Integer(i)),
                None => Collection::empty(),
            }),
            Expr::Total => Ok(env.total.cloned().unwrap_or_default()),
            Expr::Member { target, member } => {
                let t = self.eval(target, input, env)?;
                match member.as_ref() {
                    Expr::Identifier(name) => Ok(navigate(&t, name)),
                    Expr::Function { name, args } => self.call(name, args, t, env),
                    other => self.eval(other, &t, env),
                }
            }
            Expr::Function { name, args } => self.call(name, args, input.clone(), env),
            Expr::Indexer { target, index } => {
                let t = self.eval(target, input, env)?;
                let idx = self.eval(index, input, env)?;
                match idx.singleton()? {
                    None => Ok(Collection::empty()),
                    Some(v) => match integer_of(v) {
                        Some(i) if i >= 0 => Ok(t
                            .get(i as usize)
                            .cloned()
                            .map(Collection::single)
                            .unwrap_or_default()),
                        Some(_) => Ok(Collection::empty()),
                        None => Err(Error::Type("indexer expects an integer".to_string())),
                    },
                }
            }
            Expr::Polarity { negate, operand } => {
                let v = self.eval(operand, input, env)?;
                if !negate {
                    return Ok(v);
                }
                match v.singleton()? {
                    None => Ok(Collection::empty()),
                    Some(v) => Ok(Collection::single(negate_value(v)?)),
                }
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right, input, env),
            Expr::TypeTest {
                op,
                operand,
                type_name,
            } => {
                let v = self.eval(operand, input, env)?;
                match op {
                    TypeOp::Is => match v.singleton()? {
                        None => Ok(Collection::empty()),
                        Some(v) => Ok(Collection::boolean(value_is_type(v, type_name))),
                    },
                    TypeOp::As => match v.singleton()? {
                        None => Ok(Collection::empty()),
                        Some(v) if value_is_type(v, type_name) => {
                            Ok(Collection::single(v.clone()))
                        }
                        Some(_) => Ok(Collection::empty()),
                    },
                }
            }
        }
    }

    fn constant(&self, name: &str) -> Result<Collection> {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.get(name) {
                return Ok(v.clone());
            }
        }
        self.ctx
            .external(name)
            .cloned()
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        input: &Collection,
        env: Env<'_>,
    ) -> Result<Collection> {
        use BinaryOp::*;
        match op {
            And | Or | Xor | Implies => self.logical(op, left, right, input, env),
            _ => {
                let l = self.eval(left, input, env)?;
                let r = self.eval(right, input, env)?;
                self.binary_values(op, l, r)
            }
        }
    }

    /// Three-valued logic with short-circuiting: `and` is false as soon as
    /// one side is false, `or` is true as soon as one side is true,
    /// regardless of the other side being empty.
    fn logical(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        input: &Collection,
        env: Env<'_>,
    ) -> Result<Collection> {
        let l = self.eval(left, input, env)?.as_boolean()?;
        match (op, l) {
            (BinaryOp::And, Some(false)) => return Ok(Collection::boolean(false)),
            (BinaryOp::Or, Some(true)) => return Ok(Collection::boolean(true)),
            (BinaryOp::Implies, Some(false)) => return Ok(Collection::boolean(true)),
            _ => {}
        }
        let r = self.eval(right, input, env)?.as_boolean()?;
        let result = match op {
            BinaryOp::And => match (l, r) {
                (Some(true), Some(true)) => Some(true),
                (_, Some(false)) => Some(false),
                _ => None,
            },
            BinaryOp::Or => match (l, r) {
                (Some(false), Some(false)) => Some(false),
                (_, Some(true)) => Some(true),
                _ => None,
            },
            BinaryOp::Xor => match (l, r) {
                (Some(a), Some(b)) => Some(a != b),
                _ => None,
            },
            BinaryOp::Implies => match (l, r) {
                (Some(true), r) => r,
                (None, Some(true)) => Some(true),
                (None, _) => None,
                (Some(false), _) => unreachable!("short-circuited"),
            },
            _ => unreachable!("not a logical operator"),
        };
        Ok(match result {
            Some(b) => Collection::boolean(b),
            None => Collection::empty(),
        })
    }

    fn binary_values(&mut self, op: BinaryOp, l: Collection, r: Collection) -> Result<Collection> {
        use BinaryOp::*;
        match op {
            Equal | NotEqual => {
                let eq = collections_equal(&l, &r);
                Ok(match eq {
                    None => Collection::empty(),
                    Some(b) => Collection::boolean(if op == NotEqual { !b } else { b }),
                })
            }
            Equivalent | NotEquivalent => {
                let eq = collections_equivalent(&l, &r);
                Ok(Collection::boolean(if op == NotEquivalent { !eq } else { eq }))
            }
            Less | LessEqual | Greater | GreaterEqual => {
                let (Some(a), Some(b)) = (l.singleton()?, r.singleton()?) else {
                    return Ok(Collection::empty());
                };
                let Some(ordering) = value::compare(a, b)? else {
                    return Ok(Collection::empty());
                };
                let result = match op {
                    Less => ordering.is_lt(),
                    LessEqual => ordering.is_le(),
                    Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Collection::boolean(result))
            }
            Union => {
                let mut out = l.distinct();
                for v in r.iter() {
                    if !out.contains_value(v) {
                        out.push(v.clone());
                    }
                }
                Ok(out)
            }
            In => {
                let Some(needle) = l.singleton()? else {
                    return Ok(Collection::empty());
                };
                Ok(Collection::boolean(r.contains_value(needle)))
            }
            Contains => {
                let Some(needle) = r.singleton()? else {
                    return Ok(Collection::empty());
                };
                Ok(Collection::boolean(l.contains_value(needle)))
            }
            Concat => {
                let a = string_or_empty(&l)?;
                let b = string_or_empty(&r)?;
                Ok(Collection::single(Value::String(format!("{a}{b}"))))
            }
            Add | Sub | Mul | Div | IntDiv | Mod => {
                let (Some(a), Some(b)) = (l.singleton()?, r.singleton()?) else {
                    return Ok(Collection::empty());
                };
                Ok(Collection::single(arithmetic(op, &a.resolved(), &b.resolved())?))
            }
            _ => unreachable!("handled elsewhere"),
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn call(
        &mut self,
        name: &str,
        args: &[Expr],
        target: Collection,
        env: Env<'_>,
    ) -> Result<Collection> {
        match name {
            "where" => self.filter(args, target, env),
            "select" => self.project(args, target, env),
            "repeat" => self.repeat(args, target, env, true),
            "repeatAll" => self.repeat(args, target, env, false),
            "exists" if !args.is_empty() => {
                let filtered = self.filter(args, target, env)?;
                Ok(Collection::boolean(!filtered.is_empty()))
            }
            "all" => self.all(args, target, env),
            "iif" => self.iif(args, target, env),
            "coalesce" => self.coalesce(args, target, env),
            "defineVariable" => self.define_variable(args, target, env),
            "trace" => self.trace(args, target, env),
            "sort" => self.sort(args, target, env),
            "ofType" => {
                let spec = type_argument(name, args)?;
                Ok(target
                    .iter()
                    .filter(|v| value_is_type(v, &spec))
                    .cloned()
                    .collect())
            }
            "is" => {
                let spec = type_argument(name, args)?;
                match target.singleton()? {
                    None => Ok(Collection::empty()),
                    Some(v) => Ok(Collection::boolean(value_is_type(v, &spec))),
                }
            }
            "as" => {
                let spec = type_argument(name, args)?;
                match target.singleton()? {
                    Some(v) if value_is_type(v, &spec) => Ok(Collection::single(v.clone())),
                    _ => Ok(Collection::empty()),
                }
            }
            "resolve" => self.resolve(target),
            _ => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg, env.this, env)?);
                }
                functions::dispatch(self.ctx, name, target, evaluated)
            }
        }
    }

    /// Evaluate `expr` once per element with `$this`/`$index` bound and a
    /// fresh variable scope.
    fn per_element(
        &mut self,
        expr: &Expr,
        element: &Value,
        index: usize,
        env: Env<'_>,
    ) -> Result<Collection> {
        let focus = Collection::single(element.clone());
        let inner = Env {
            this: &focus,
            index: Some(index as i32),
            total: env.total,
        };
        self.scopes.push(HashMap::new());
        let result = self.eval(expr, &focus, inner);
        self.scopes.pop();
        result
    }

    fn filter(&mut self, args: &[Expr], target: Collection, env: Env<'_>) -> Result<Collection> {
        let criterion = single_arg("where", args)?;
        let mut out = Collection::empty();
        for (i, item) in target.iter().enumerate() {
            if self.per_element(criterion, item, i, env)?.as_boolean()? == Some(true) {
                out.push(item.clone());
            }
        }
        Ok(out)
    }

    fn project(&mut self, args: &[Expr], target: Collection, env: Env<'_>) -> Result<Collection> {
        let projection = single_arg("select", args)?;
        let mut out = Collection::empty();
        for (i, item) in target.iter().enumerate() {
            out.extend(self.per_element(projection, item, i, env)?);
        }
        Ok(out)
    }

    fn repeat(
        &mut self,
        args: &[Expr],
        target: Collection,
        env: Env<'_>,
        dedup: bool,
    ) -> Result<Collection> {
        let projection = single_arg("repeat", args)?;
        let mut out = Collection::empty();
        let mut frontier = target;
        while !frontier.is_empty() {
            let mut next = Collection::empty();
            for (i, item) in frontier.iter().enumerate() {
                for v in self.per_element(projection, item, i, env)? {
                    if dedup {
                        if !out.contains_value(&v) && !next.contains_value(&v) {
                            next.push(v);
                        }
                    } else {
                        next.push(v);
                    }
                }
            }
            out.extend(next.clone());
            frontier = next;
            if !dedup && out.len() > 1_000_000 {
                return Err(Error::Evaluation(
                    "repeatAll expansion exceeded 1000000 elements".to_string(),
                ));
            }
        }
        Ok(out)
    }

    fn all(&mut self, args: &[Expr], target: Collection, env: Env<'_>) -> Result<Collection> {
        let criterion = single_arg("all", args)?;
        for (i, item) in target.iter().enumerate() {
            if self.per_element(criterion, item, i, env)?.as_boolean()? != Some(true) {
                return Ok(Collection::boolean(false));
            }
        }
        Ok(Collection::boolean(true))
    }

    fn iif(&mut self, args: &[Expr], target: Collection, env: Env<'_>) -> Result<Collection> {
        if args.len() < 2 || args.len() > 3 {
            return Err(Error::Evaluation(
                "iif expects 2 or 3 arguments".to_string(),
            ));
        }
        let cond = self.eval(&args[0], &target, env)?.as_boolean()?;
        if cond == Some(true) {
            self.eval(&args[1], &target, env)
        } else if let Some(otherwise) = args.get(2) {
            self.eval(otherwise, &target, env)
        } else {
            Ok(Collection::empty())
        }
    }

    /// First non-empty argument, short-circuiting.
    fn coalesce(&mut self, args: &[Expr], target: Collection, env: Env<'_>) -> Result<Collection> {
        for arg in args {
            let v = self.eval(arg, &target, env)?;
            if !v.is_empty() {
                return Ok(v);
            }
        }
        Ok(Collection::empty())
    }

    fn define_variable(
        &mut self,
        args: &[Expr],
        target: Collection,
        env: Env<'_>,
    ) -> Result<Collection> {
        if args.is_empty() || args.len() > 2 {
            return Err(Error::Evaluation(
                "defineVariable expects 1 or 2 arguments".to_string(),
            ));
        }
        let name = self
            .eval(&args[0], &target, env)?
            .singleton()?
            .and_then(|v| match v.resolved() {
                Value::String(s) => Some(s),
                _ => None,
            })
            .ok_or_else(|| {
                Error::Evaluation("defineVariable expects a string name".to_string())
            })?;
        if self.scopes.iter().any(|s| s.contains_key(&name)) {
            return Err(Error::Evaluation(format!(
                "variable '%{name}' is already defined"
            )));
        }
        let value = match args.get(1) {
            Some(expr) => self.eval(expr, &target, env)?,
            None => target.clone(),
        };
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name, value);
        Ok(target)
    }

    fn trace(&mut self, args: &[Expr], target: Collection, env: Env<'_>) -> Result<Collection> {
        let name = match args.first() {
            Some(expr) => self
                .eval(expr, &target, env)?
                .singleton()?
                .and_then(|v| v.render())
                .unwrap_or_default(),
            None => String::new(),
        };
        let projected = match args.get(1) {
            Some(projection) => {
                let mut out = Collection::empty();
                for (i, item) in target.iter().enumerate() {
                    out.extend(self.per_element(projection, item, i, env)?);
                }
                out
            }
            None => target.clone(),
        };
        self.ctx.trace(&name, &projected);
        Ok(target)
    }

    /// Stable multi-key sort. A unary minus on a key expression marks the
    /// key as descending; without keys the values sort by themselves.
    fn sort(&mut self, args: &[Expr], target: Collection, env: Env<'_>) -> Result<Collection> {
        let keys: Vec<(&Expr, bool)> = if args.is_empty() {
            Vec::new()
        } else {
            args.iter()
                .map(|a| match a {
                    Expr::Polarity {
                        negate: true,
                        operand,
                    } => (operand.as_ref(), true),
                    other => (other, false),
                })
                .collect()
        };

        let mut decorated: Vec<(Vec<Option<Value>>, Value)> = Vec::with_capacity(target.len());
        for (i, item) in target.iter().enumerate() {
            let mut item_keys = Vec::with_capacity(keys.len().max(1));
            if keys.is_empty() {
                item_keys.push(Some(item.clone()));
            } else {
                for (expr, _) in &keys {
                    let k = self.per_element(expr, item, i, env)?;
                    item_keys.push(k.singleton()?.cloned());
                }
            }
            decorated.push((item_keys, item.clone()));
        }

        let mut error: Option<Error> = None;
        decorated.sort_by(|(ka, _), (kb, _)| {
            for (idx, (a, b)) in ka.iter().zip(kb.iter()).enumerate() {
                let descending = keys.get(idx).map(|(_, d)| *d).unwrap_or(false);
                let ordering = match (a, b) {
                    (None, None) => std::cmp::Ordering::Equal,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (Some(a), Some(b)) => match value::compare(a, b) {
                        Ok(Some(o)) => o,
                        Ok(None) => std::cmp::Ordering::Equal,
                        Err(e) => {
                            error.get_or_insert(e);
                            std::cmp::Ordering::Equal
                        }
                    },
                };
                let ordering = if descending { ordering.reverse() } else { ordering };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        if let Some(e) = error {
            return Err(e);
        }
        Ok(decorated.into_iter().map(|(_, v)| v).collect())
    }

    fn resolve(&mut self, target: Collection) -> Result<Collection> {
        let mut out = Collection::empty();
        for item in target.iter() {
            let reference = match item {
                Value::Node(node) => node
                    .json()
                    .get("reference")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string),
                Value::String(s) => Some(s.clone()),
                _ => None,
            };
            let Some(reference) = reference else {
                continue;
            };
            if let Some(local) = reference.strip_prefix('#') {
                if let Some(contained) = self.contained_resource(local) {
                    out.push(Value::Node(Node::from_json(contained)));
                }
                continue;
            }
            if let Some(resolver) = self.ctx.resolver() {
                if let Some(resource) = resolver.resolve(&reference) {
                    out.push(Value::Node(Node::from_json(resource)));
                }
            }
        }
        Ok(out)
    }

    fn contained_resource(&self, local_id: &str) -> Option<serde_json::Value> {
        let root = self.ctx.external("rootResource")?;
        let Some(Value::Node(root)) = root.first() else {
            return None;
        };
        let contained = root.json().get("contained")?.as_array()?;
        contained
            .iter()
            .find(|c| c.get("id").and_then(serde_json::Value::as_str) == Some(local_id))
            .cloned()
    }
}

// ============================================================================
// Navigation and literals
// ============================================================================

/// A path step: type-name match on the element itself, else child lookup.
fn navigate(input: &Collection, name: &str) -> Collection {
    if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        let matched: Vec<Value> = input
            .iter()
            .filter(|v| matches!(v, Value::Node(n) if n.type_name() == Some(name)))
            .cloned()
            .collect();
        if !matched.is_empty() {
            return Collection::from_vec(matched);
        }
    }
    let mut out = Collection::empty();
    for v in input.iter() {
        for child in v.children(&[name]) {
            out.push(child);
        }
    }
    out
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Long(l) => Value::Long(*l),
        Literal::Decimal(d) => Value::Decimal(*d),
        Literal::Date(date, precision) => Value::Date(Date {
            date: *date,
            precision: *precision,
        }),
        Literal::DateTime(date, time, precision, offset) => Value::DateTime(DateTime {
            date: *date,
            time: *time,
            precision: *precision,
            offset: *offset,
        }),
        Literal::Time(time, precision) => Value::Time(Time {
            time: *time,
            precision: *precision,
        }),
        Literal::Quantity { value, unit } => Value::Quantity(Quantity::new(*value, unit.clone())),
    }
}

fn integer_of(v: &Value) -> Option<i64> {
    match v.resolved() {
        Value::Integer(i) => Some(i as i64),
        Value::Long(l) => Some(l),
        _ => None,
    }
}

fn negate_value(v: &Value) -> Result<Value> {
    match v.resolved() {
        Value::Integer(i) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or(Error::ArithmeticOverflow),
        Value::Long(l) => l
            .checked_neg()
            .map(Value::Long)
            .ok_or(Error::ArithmeticOverflow),
        Value::Decimal(d) => Ok(Value::Decimal(-d)),
        Value::Quantity(q) => Ok(Value::Quantity(Quantity::new(-q.value, q.unit))),
        other => Err(Error::Type(format!("cannot negate {}", other.kind_name()))),
    }
}

fn string_or_empty(c: &Collection) -> Result<String> {
    match c.singleton()? {
        None => Ok(String::new()),
        Some(v) => v
            .render()
            .ok_or_else(|| Error::Type("'&' expects string operands".to_string())),
    }
}

// ============================================================================
// Collection-level equality
// ============================================================================

fn collections_equal(a: &Collection, b: &Collection) -> Option<bool> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if a.len() != b.len() {
        return Some(false);
    }
    for (x, y) in a.iter().zip(b.iter()) {
        match value::equal(x, y) {
            None => return None,
            Some(false) => return Some(false),
            Some(true) => {}
        }
    }
    Some(true)
}

/// Set equivalence: order-insensitive, multiplicity-respecting.
fn collections_equivalent(a: &Collection, b: &Collection) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for x in a.iter() {
        let found = b.iter().enumerate().find(|(i, y)| {
            !used[*i] && value::equivalent(x, y)
        });
        match found {
            Some((i, _)) => used[i] = true,
            None => return false,
        }
    }
    true
}

// ============================================================================
// Arithmetic
// ============================================================================

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    use BinaryOp::*;

    if let (Some(x), Some(y)) = (Number::of(a), Number::of(b)) {
        return numeric_arithmetic(op, x, y);
    }

    match (op, a, b) {
        (Add, Value::String(x), Value::String(y)) => Ok(Value::String(format!("{x}{y}"))),
        (Add | Sub, Value::Quantity(x), Value::Quantity(y)) => {
            if x.normalized_unit() != y.normalized_unit() {
                return Err(Error::Type(format!(
                    "cannot {} quantities with units '{}' and '{}'",
                    if op == Add { "add" } else { "subtract" },
                    x.unit,
                    y.unit
                )));
            }
            let value = if op == Add {
                x.value.checked_add(y.value)
            } else {
                x.value.checked_sub(y.value)
            }
            .ok_or(Error::ArithmeticOverflow)?;
            Ok(Value::Quantity(Quantity::new(value, x.unit.clone())))
        }
        (Mul, Value::Quantity(q), other) | (Mul, other, Value::Quantity(q)) => {
            let n = Number::of(other)
                .ok_or_else(|| Error::Type("quantity multiplier must be numeric".to_string()))?;
            let value = q
                .value
                .checked_mul(n.as_decimal())
                .ok_or(Error::ArithmeticOverflow)?;
            Ok(Value::Quantity(Quantity::new(value, q.unit.clone())))
        }
        (Add | Sub, Value::Date(_) | Value::DateTime(_) | Value::Time(_), Value::Quantity(q)) => {
            temporal_arithmetic(a, q, op == Sub)
        }
        _ => Err(Error::Type(format!(
            "cannot apply arithmetic to {} and {}",
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

fn numeric_arithmetic(op: BinaryOp, x: Number, y: Number) -> Result<Value> {
    use BinaryOp::*;

    // Integer-only lanes keep integer types and error on overflow.
    if let (Number::Integer(a), Number::Integer(b)) = (x, y) {
        match op {
            Add => return a.checked_add(b).map(Value::Integer).ok_or(Error::ArithmeticOverflow),
            Sub => return a.checked_sub(b).map(Value::Integer).ok_or(Error::ArithmeticOverflow),
            Mul => return a.checked_mul(b).map(Value::Integer).ok_or(Error::ArithmeticOverflow),
            IntDiv => {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                return a.checked_div(b).map(Value::Integer).ok_or(Error::ArithmeticOverflow);
            }
            Mod => {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                return Ok(Value::Integer(a % b));
            }
            _ => {}
        }
    }
    if let (Number::Integer(_) | Number::Long(_), Number::Integer(_) | Number::Long(_)) = (x, y) {
        let (a, b) = (long_of(x), long_of(y));
        match op {
            Add => return a.checked_add(b).map(Value::Long).ok_or(Error::ArithmeticOverflow),
            Sub => return a.checked_sub(b).map(Value::Long).ok_or(Error::ArithmeticOverflow),
            Mul => return a.checked_mul(b).map(Value::Long).ok_or(Error::ArithmeticOverflow),
            IntDiv => {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                return a.checked_div(b).map(Value::Long).ok_or(Error::ArithmeticOverflow);
            }
            Mod => {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                return Ok(Value::Long(a % b));
            }
            _ => {}
        }
    }

    let (a, b) = (x.as_decimal(), y.as_decimal());
    match op {
        Add => a.checked_add(b).map(Value::Decimal).ok_or(Error::ArithmeticOverflow),
        Sub => a.checked_sub(b).map(Value::Decimal).ok_or(Error::ArithmeticOverflow),
        Mul => a.checked_mul(b).map(Value::Decimal).ok_or(Error::ArithmeticOverflow),
        Div => {
            if b.is_zero() {
                return Err(Error::DivisionByZero);
            }
            a.checked_div(b).map(Value::Decimal).ok_or(Error::ArithmeticOverflow)
        }
        IntDiv => {
            if b.is_zero() {
                return Err(Error::DivisionByZero);
            }
            let q = a.checked_div(b).ok_or(Error::ArithmeticOverflow)?.trunc();
            decimal_to_integer(q)
        }
        Mod => {
            if b.is_zero() {
                return Err(Error::DivisionByZero);
            }
            let q = a.checked_div(b).ok_or(Error::ArithmeticOverflow)?.trunc();
            let m = a
                .checked_sub(q.checked_mul(b).ok_or(Error::ArithmeticOverflow)?)
                .ok_or(Error::ArithmeticOverflow)?;
            Ok(Value::Decimal(m))
        }
        _ => unreachable!("non-arithmetic op"),
    }
}

fn long_of(n: Number) -> i64 {
    match n {
        Number::Integer(i) => i as i64,
        Number::Long(l) => l,
        Number::Decimal(_) => unreachable!("checked by caller"),
    }
}

fn decimal_to_integer(d: Decimal) -> Result<Value> {
    let as_i64 = d.to_i64().ok_or(Error::ArithmeticOverflow)?;
    match i32::try_from(as_i64) {
        Ok(i) => Ok(Value::Integer(i)),
        Err(_) => Ok(Value::Long(as_i64)),
    }
}

// ============================================================================
// Temporal arithmetic
// ============================================================================

fn temporal_arithmetic(temporal: &Value, quantity: &Quantity, negate: bool) -> Result<Value> {
    let unit = quantity.normalized_unit();
    let amount = if negate {
        -quantity.value
    } else {
        quantity.value
    };

    match temporal {
        Value::Date(d) => {
            let date = match unit.as_str() {
                "year" => add_months(d.date, whole(amount)? * 12),
                "month" => add_months(d.date, whole(amount)?),
                "week" => add_days(d.date, whole(amount)? as i64 * 7)?,
                "day" => add_days(d.date, whole(amount)? as i64)?,
                other => {
                    return Err(Error::Type(format!(
                        "cannot add '{other}' quantities to a Date"
                    )));
                }
            };
            Ok(Value::Date(Date {
                date,
                precision: d.precision,
            }))
        }
        Value::DateTime(dt) => {
            let (date, time) = match unit.as_str() {
                "year" => (add_months(dt.date, whole(amount)? * 12), dt.time),
                "month" => (add_months(dt.date, whole(amount)?), dt.time),
                "week" => (add_days(dt.date, whole(amount)? as i64 * 7)?, dt.time),
                "day" => (add_days(dt.date, whole(amount)? as i64)?, dt.time),
                "hour" | "minute" | "second" | "millisecond" => {
                    let ms = milliseconds(amount, &unit)?;
                    let shifted = chrono::NaiveDateTime::new(dt.date, dt.time)
                        .checked_add_signed(chrono::Duration::milliseconds(ms))
                        .ok_or(Error::ArithmeticOverflow)?;
                    (shifted.date(), shifted.time())
                }
                other => {
                    return Err(Error::Type(format!(
                        "cannot add '{other}' quantities to a DateTime"
                    )));
                }
            };
            Ok(Value::DateTime(DateTime {
                date,
                time,
                precision: dt.precision,
                offset: dt.offset,
            }))
        }
        Value::Time(t) => {
            let ms = milliseconds(amount, &unit)?;
            // Time-of-day arithmetic wraps around midnight.
            let day_ms = 24 * 3600 * 1000;
            let current = (t.time.signed_duration_since(
                chrono::NaiveTime::from_hms_opt(0, 0, 0).expect("midnight"),
            ))
            .num_milliseconds();
            let shifted = (current + ms).rem_euclid(day_ms);
            let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                (shifted / 1000) as u32,
                ((shifted % 1000) * 1_000_000) as u32,
            )
            .ok_or(Error::ArithmeticOverflow)?;
            Ok(Value::Time(Time {
                time,
                precision: t.precision,
            }))
        }
        _ => unreachable!("caller matched temporal"),
    }
}

fn whole(amount: Decimal) -> Result<i32> {
    amount.trunc().to_i32().ok_or(Error::ArithmeticOverflow)
}

fn milliseconds(amount: Decimal, unit: &str) -> Result<i64> {
    let per_unit = match unit {
        "hour" => 3_600_000,
        "minute" => 60_000,
        "second" => 1_000,
        "millisecond" => 1,
        other => {
            return Err(Error::Type(format!(
                "cannot add '{other}' quantities to a time value"
            )));
        }
    };
    let ms = amount
        .checked_mul(Decimal::from(per_unit))
        .ok_or(Error::ArithmeticOverflow)?;
    ms.trunc().to_i64().ok_or(Error::ArithmeticOverflow)
}

/// Month-stepping with end-of-month clamping.
fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months;
    let (year, month0) = (total.div_euclid(12), total.rem_euclid(12));
    let day = date.day();
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month0 as u32 + 1, d))
        .unwrap_or(date)
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    date.checked_add_signed(chrono::Duration::days(days))
        .ok_or(Error::ArithmeticOverflow)
}

// ============================================================================
// Type tests
// ============================================================================

fn single_arg<'e>(name: &str, args: &'e [Expr]) -> Result<&'e Expr> {
    match args {
        [arg] => Ok(arg),
        _ => Err(Error::Evaluation(format!(
            "{name} expects exactly one argument"
        ))),
    }
}

fn type_argument(name: &str, args: &[Expr]) -> Result<TypeSpecifier> {
    let arg = single_arg(name, args)?;
    expr_to_type(arg).ok_or_else(|| {
        Error::Evaluation(format!("{name} expects a type name argument"))
    })
}

fn expr_to_type(expr: &Expr) -> Option<TypeSpecifier> {
    match expr {
        Expr::Identifier(name) => Some(TypeSpecifier::new(None, name.clone())),
        Expr::Member { target, member } => match (target.as_ref(), member.as_ref()) {
            (Expr::Identifier(ns), Expr::Identifier(name))
                if matches!(ns.as_str(), "System" | "FHIR") =>
            {
                Some(TypeSpecifier::new(Some(ns.clone()), name.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn value_is_type(v: &Value, spec: &TypeSpecifier) -> bool {
    let ns = spec.namespace.as_deref();
    let name = spec.name.as_str();

    if let Value::Node(node) = v {
        if !node.is_primitive() {
            return (ns.is_none() || ns == Some("FHIR")) && node.type_name() == Some(name);
        }
    }

    let kind = v.resolved().kind_name();
    match ns {
        Some("System") => kind == name,
        Some("FHIR") => fhir_primitive_kind(name) == Some(kind),
        None => kind == name || fhir_primitive_kind(name) == Some(kind),
        _ => false,
    }
}

/// Dynamic mapping from FHIR primitive type names to value kinds; without
/// a schema this is a best effort over the JSON representation.
fn fhir_primitive_kind(name: &str) -> Option<&'static str> {
    match name {
        "boolean" => Some("Boolean"),
        "integer" | "positiveInt" | "unsignedInt" => Some("Integer"),
        "integer64" => Some("Long"),
        "decimal" => Some("Decimal"),
        "string" | "code" | "uri" | "url" | "canonical" | "id" | "markdown" | "oid" | "uuid"
        | "base64Binary" | "date" | "dateTime" | "instant" | "time" => Some("String"),
        _ => None,
    }
}

//! FHIRPath expression tree
//!
//! A compact AST: precedence is resolved by the parser, so there is one
//! binary node with an operator tag instead of one node type per grammar
//! rule. Trees are immutable after parse and reusable across evaluations.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use crate::value::{DatePrecision, DateTimePrecision, TimePrecision};

/// A parsed expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `{}` — the empty collection literal.
    Empty,
    Literal(Literal),
    /// Path step or type name, e.g. `name` in `Patient.name`.
    Identifier(String),
    /// `%name` external constant.
    ExternalConstant(String),
    /// `$this`, `$index`, `$total`.
    This,
    Index,
    Total,
    /// `expression.invocation`
    Member {
        target: Box<Expr>,
        member: Box<Expr>,
    },
    /// `f(args...)` — either bare or as the member of a path.
    Function { name: String, args: Vec<Expr> },
    /// `expression[index]`
    Indexer {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// `+x` / `-x`
    Polarity { negate: bool, operand: Box<Expr> },
    /// Any binary operator.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `expression is Type` / `expression as Type`
    TypeTest {
        op: TypeOp,
        operand: Box<Expr>,
        type_name: TypeSpecifier,
    },
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    String(String),
    Integer(i32),
    Long(i64),
    Decimal(Decimal),
    Date(NaiveDate, DatePrecision),
    /// Date-time parts: date, time-of-day, precision, offset seconds east
    /// of UTC (`None` when no zone was written).
    DateTime(NaiveDate, NaiveTime, DateTimePrecision, Option<i32>),
    Time(NaiveTime, TimePrecision),
    Quantity { value: Decimal, unit: String },
}

/// Binary operators in precedence-resolved form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Multiplicative
    Mul,
    Div,
    IntDiv,
    Mod,
    // Additive
    Add,
    Sub,
    Concat,
    // Union
    Union,
    // Comparison
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    // Equality
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,
    // Membership
    In,
    Contains,
    // Logical
    And,
    Or,
    Xor,
    Implies,
}

/// `is` vs `as`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOp {
    Is,
    As,
}

/// Possibly-qualified type name, e.g. `System.Integer` or `Patient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpecifier {
    pub namespace: Option<String>,
    pub name: String,
}

impl TypeSpecifier {
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

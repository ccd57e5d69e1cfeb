//! Recursive-descent parser for FHIRPath
//!
//! Implements the official precedence ladder (implies weakest, postfix
//! invocation strongest). Word operators (`and`, `div`, `is`, ...) are
//! plain identifier tokens; they only act as operators in operator
//! position, so paths like `Patient.contains` keep working.

use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expr, Literal, TypeOp, TypeSpecifier};
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::temporal;
use crate::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn parse(input: &str) -> Result<Expr> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        let expr = parser.expression()?;
        let token = parser.peek().clone();
        if token.kind != TokenKind::Eof {
            return Err(Error::parse(
                format!("unexpected token '{}'", token.text),
                token.line,
                token.column,
            ));
        }
        Ok(expr)
    }

    fn expression(&mut self) -> Result<Expr> {
        self.implies_expr()
    }

    fn implies_expr(&mut self) -> Result<Expr> {
        let mut left = self.or_expr()?;
        while self.eat_word("implies") {
            let right = self.or_expr()?;
            left = binary(BinaryOp::Implies, left, right);
        }
        Ok(left)
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        loop {
            if self.eat_word("or") {
                let right = self.and_expr()?;
                left = binary(BinaryOp::Or, left, right);
            } else if self.eat_word("xor") {
                let right = self.and_expr()?;
                left = binary(BinaryOp::Xor, left, right);
            } else {
                return Ok(left);
            }
        }
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.membership_expr()?;
        while self.eat_word("and") {
            let right = self.membership_expr()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn membership_expr(&mut self) -> Result<Expr> {
        let mut left = self.equality_expr()?;
        loop {
            if self.eat_word("in") {
                let right = self.equality_expr()?;
                left = binary(BinaryOp::In, left, right);
            } else if self.eat_word("contains") {
                let right = self.equality_expr()?;
                left = binary(BinaryOp::Contains, left, right);
            } else {
                return Ok(left);
            }
        }
    }

    fn equality_expr(&mut self) -> Result<Expr> {
        let mut left = self.inequality_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Equal => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                TokenKind::Equivalent => BinaryOp::Equivalent,
                TokenKind::NotEquivalent => BinaryOp::NotEquivalent,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.inequality_expr()?;
            left = binary(op, left, right);
        }
    }

    fn inequality_expr(&mut self) -> Result<Expr> {
        let mut left = self.union_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.union_expr()?;
            left = binary(op, left, right);
        }
    }

    fn union_expr(&mut self) -> Result<Expr> {
        let mut left = self.type_expr()?;
        while self.peek().kind == TokenKind::Pipe {
            self.advance();
            let right = self.type_expr()?;
            left = binary(BinaryOp::Union, left, right);
        }
        Ok(left)
    }

    fn type_expr(&mut self) -> Result<Expr> {
        let mut left = self.additive_expr()?;
        loop {
            let op = if self.eat_word("is") {
                TypeOp::Is
            } else if self.eat_word("as") {
                TypeOp::As
            } else {
                return Ok(left);
            };
            let type_name = self.type_specifier()?;
            left = Expr::TypeTest {
                op,
                operand: Box::new(left),
                type_name,
            };
        }
    }

    fn additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                TokenKind::Ampersand => BinaryOp::Concat,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative_expr()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.polarity_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Identifier if self.peek().text == "div" => BinaryOp::IntDiv,
                TokenKind::Identifier if self.peek().text == "mod" => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.polarity_expr()?;
            left = binary(op, left, right);
        }
    }

    fn polarity_expr(&mut self) -> Result<Expr> {
        match self.peek().kind {
            TokenKind::Plus => {
                self.advance();
                self.polarity_expr()
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.polarity_expr()?;
                Ok(Expr::Polarity {
                    negate: true,
                    operand: Box::new(operand),
                })
            }
            _ => self.postfix_expr(),
        }
    }

    fn postfix_expr(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let member = self.invocation()?;
                    expr = Expr::Member {
                        target: Box::new(expr),
                        member: Box::new(member),
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(TokenKind::RightBracket)?;
                    expr = Expr::Indexer {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// The thing after a `.`: a path step, function call or `$`-invocation.
    fn invocation(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                if self.peek().kind == TokenKind::LeftParen {
                    self.function_call(token.text)
                } else {
                    Ok(Expr::Identifier(token.text))
                }
            }
            TokenKind::Special => {
                self.advance();
                Ok(special(&token.text))
            }
            _ => Err(Error::parse(
                format!("expected member name, found '{}'", token.text),
                token.line,
                token.column,
            )),
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.expect(TokenKind::RightBrace)?;
                Ok(Expr::Empty)
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Literal(Literal::String(token.text)))
            }
            TokenKind::Number => {
                self.advance();
                self.number_term(&token)
            }
            TokenKind::LongNumber => {
                self.advance();
                let value: i64 = token.text.parse().map_err(|_| {
                    Error::parse("long literal out of range", token.line, token.column)
                })?;
                Ok(Expr::Literal(Literal::Long(value)))
            }
            TokenKind::Temporal => {
                self.advance();
                self.temporal_term(&token)
            }
            TokenKind::ExternalConstant => {
                self.advance();
                Ok(Expr::ExternalConstant(token.text))
            }
            TokenKind::Special => {
                self.advance();
                Ok(special(&token.text))
            }
            TokenKind::Identifier => {
                self.advance();
                match token.text.as_str() {
                    "true" => Ok(Expr::Literal(Literal::Boolean(true))),
                    "false" => Ok(Expr::Literal(Literal::Boolean(false))),
                    _ => {
                        if self.peek().kind == TokenKind::LeftParen {
                            self.function_call(token.text)
                        } else {
                            Ok(Expr::Identifier(token.text))
                        }
                    }
                }
            }
            _ => Err(Error::parse(
                format!("unexpected token '{}'", token.text),
                token.line,
                token.column,
            )),
        }
    }

    /// A number, possibly forming a quantity literal with a following
    /// unit (`4 days`, `4.5 'mg'`).
    fn number_term(&mut self, token: &Token) -> Result<Expr> {
        let next = self.peek().clone();
        let unit = match next.kind {
            TokenKind::String => {
                self.advance();
                Some(next.text)
            }
            TokenKind::Identifier if is_calendar_word(&next.text) => {
                self.advance();
                Some(next.text)
            }
            _ => None,
        };

        if let Some(unit) = unit {
            let value: Decimal = token.text.parse().map_err(|_| {
                Error::parse("invalid number literal", token.line, token.column)
            })?;
            return Ok(Expr::Literal(Literal::Quantity { value, unit }));
        }

        if token.text.contains('.') {
            let value: Decimal = token.text.parse().map_err(|_| {
                Error::parse("invalid decimal literal", token.line, token.column)
            })?;
            Ok(Expr::Literal(Literal::Decimal(value)))
        } else if let Ok(value) = token.text.parse::<i32>() {
            Ok(Expr::Literal(Literal::Integer(value)))
        } else if let Ok(value) = token.text.parse::<i64>() {
            Ok(Expr::Literal(Literal::Long(value)))
        } else {
            Err(Error::parse(
                "integer literal out of range",
                token.line,
                token.column,
            ))
        }
    }

    fn temporal_term(&mut self, token: &Token) -> Result<Expr> {
        let text = &token.text;
        let bad = || {
            Error::parse(
                format!("invalid date/time literal '@{text}'"),
                token.line,
                token.column,
            )
        };
        if text.starts_with('T') {
            let t = temporal::parse_time(text).ok_or_else(bad)?;
            return Ok(Expr::Literal(Literal::Time(t.time, t.precision)));
        }
        if text.contains('T') {
            let dt = temporal::parse_datetime(text).ok_or_else(bad)?;
            return Ok(Expr::Literal(Literal::DateTime(
                dt.date,
                dt.time,
                dt.precision,
                dt.offset,
            )));
        }
        let d = temporal::parse_date(text).ok_or_else(bad)?;
        Ok(Expr::Literal(Literal::Date(d.date, d.precision)))
    }

    fn function_call(&mut self, name: String) -> Result<Expr> {
        self.expect(TokenKind::LeftParen)?;
        let mut args = Vec::new();
        if self.peek().kind != TokenKind::RightParen {
            loop {
                args.push(self.expression()?);
                if self.peek().kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(Expr::Function { name, args })
    }

    fn type_specifier(&mut self) -> Result<TypeSpecifier> {
        let token = self.peek().clone();
        if token.kind != TokenKind::Identifier {
            return Err(Error::parse(
                format!("expected type name, found '{}'", token.text),
                token.line,
                token.column,
            ));
        }
        self.advance();
        // Only the two reflection namespaces qualify a type name; anything
        // else after '.' is a subsequent path step.
        if matches!(token.text.as_str(), "System" | "FHIR")
            && self.peek().kind == TokenKind::Dot
            && self.peek_at(1).kind == TokenKind::Identifier
        {
            self.advance();
            let name = self.peek().text.clone();
            self.advance();
            return Ok(TypeSpecifier::new(Some(token.text), name));
        }
        Ok(TypeSpecifier::new(None, token.text))
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        let token = self.peek();
        if token.kind == TokenKind::Identifier && token.text == word {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        let token = self.peek().clone();
        if token.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(Error::parse(
                format!("expected {kind:?}, found '{}'", token.text),
                token.line,
                token.column,
            ))
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn special(text: &str) -> Expr {
    match text {
        "$this" => Expr::This,
        "$index" => Expr::Index,
        _ => Expr::Total,
    }
}

fn is_calendar_word(word: &str) -> bool {
    matches!(
        word,
        "year"
            | "years"
            | "month"
            | "months"
            | "week"
            | "weeks"
            | "day"
            | "days"
            | "hour"
            | "hours"
            | "minute"
            | "minutes"
            | "second"
            | "seconds"
            | "millisecond"
            | "milliseconds"
    )
}

//! Hand-written lexer for FHIRPath expressions
//!
//! Produces [`Token`]s with 1-based line/column positions. Comments
//! (`// ...` and `/* ... */`) and whitespace are skipped.

use crate::error::{Error, Result};
use crate::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input, appending a final `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;

        let (line, column) = (self.line, self.column);
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", line, column));
        };

        match c {
            '(' => Ok(self.single(TokenKind::LeftParen, line, column)),
            ')' => Ok(self.single(TokenKind::RightParen, line, column)),
            '[' => Ok(self.single(TokenKind::LeftBracket, line, column)),
            ']' => Ok(self.single(TokenKind::RightBracket, line, column)),
            '{' => Ok(self.single(TokenKind::LeftBrace, line, column)),
            '}' => Ok(self.single(TokenKind::RightBrace, line, column)),
            '.' => Ok(self.single(TokenKind::Dot, line, column)),
            ',' => Ok(self.single(TokenKind::Comma, line, column)),
            '+' => Ok(self.single(TokenKind::Plus, line, column)),
            '-' => Ok(self.single(TokenKind::Minus, line, column)),
            '*' => Ok(self.single(TokenKind::Star, line, column)),
            '/' => Ok(self.single(TokenKind::Slash, line, column)),
            '&' => Ok(self.single(TokenKind::Ampersand, line, column)),
            '|' => Ok(self.single(TokenKind::Pipe, line, column)),
            '=' => Ok(self.single(TokenKind::Equal, line, column)),
            '~' => Ok(self.single(TokenKind::Equivalent, line, column)),
            '!' => {
                self.advance();
                match self.peek() {
                    Some('=') => {
                        self.advance();
                        Ok(Token::new(TokenKind::NotEqual, "!=", line, column))
                    }
                    Some('~') => {
                        self.advance();
                        Ok(Token::new(TokenKind::NotEquivalent, "!~", line, column))
                    }
                    _ => Err(Error::parse("expected '=' or '~' after '!'", line, column)),
                }
            }
            '<' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::LessEqual, "<=", line, column))
                } else {
                    Ok(Token::new(TokenKind::Less, "<", line, column))
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::GreaterEqual, ">=", line, column))
                } else {
                    Ok(Token::new(TokenKind::Greater, ">", line, column))
                }
            }
            '\'' => self.string_literal(line, column),
            '`' => self.delimited_identifier(line, column),
            '@' => self.temporal_literal(line, column),
            '%' => self.external_constant(line, column),
            '$' => self.special_invocation(line, column),
            c if c.is_ascii_digit() => self.number_literal(line, column),
            c if c.is_alphabetic() || c == '_' => Ok(self.identifier(line, column)),
            other => Err(Error::parse(
                format!("unexpected character '{other}'"),
                line,
                column,
            )),
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => {
                                self.advance();
                            }
                            (None, _) => {
                                return Err(Error::parse("unterminated comment", line, column));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn single(&mut self, kind: TokenKind, line: u32, column: u32) -> Token {
        let c = self.advance().unwrap_or_default();
        Token::new(kind, c.to_string(), line, column)
    }

    fn string_literal(&mut self, line: u32, column: u32) -> Result<Token> {
        self.advance(); // opening quote
        let text = self.escaped_until('\'', line, column)?;
        Ok(Token::new(TokenKind::String, text, line, column))
    }

    fn delimited_identifier(&mut self, line: u32, column: u32) -> Result<Token> {
        self.advance(); // opening backtick
        let text = self.escaped_until('`', line, column)?;
        Ok(Token::new(TokenKind::Identifier, text, line, column))
    }

    /// Consume characters up to a closing delimiter, applying the standard
    /// escape set (`\' \" \` \\ \/ \f \n \r \t \uXXXX`).
    fn escaped_until(&mut self, delim: char, line: u32, column: u32) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return Err(Error::parse("unterminated literal", line, column)),
                Some(c) if c == delim => return Ok(text),
                Some('\\') => match self.advance() {
                    Some('f') => text.push('\u{000C}'),
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    Some('t') => text.push('\t'),
                    Some('u') => {
                        let mut code = String::new();
                        for _ in 0..4 {
                            match self.advance() {
                                Some(h) if h.is_ascii_hexdigit() => code.push(h),
                                _ => {
                                    return Err(Error::parse(
                                        "invalid unicode escape",
                                        line,
                                        column,
                                    ));
                                }
                            }
                        }
                        let cp = u32::from_str_radix(&code, 16).expect("hex digits");
                        match char::from_u32(cp) {
                            Some(c) => text.push(c),
                            None => {
                                return Err(Error::parse("invalid unicode escape", line, column));
                            }
                        }
                    }
                    Some(other) => text.push(other),
                    None => return Err(Error::parse("unterminated escape", line, column)),
                },
                Some(other) => text.push(other),
            }
        }
    }

    fn number_literal(&mut self, line: u32, column: u32) -> Result<Token> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // Decimal part; a bare trailing dot belongs to a path, not the number.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            return Ok(Token::new(TokenKind::Number, text, line, column));
        }
        if self.peek() == Some('L') {
            self.advance();
            return Ok(Token::new(TokenKind::LongNumber, text, line, column));
        }
        Ok(Token::new(TokenKind::Number, text, line, column))
    }

    fn temporal_literal(&mut self, line: u32, column: u32) -> Result<Token> {
        self.advance(); // '@'
        let mut text = String::new();
        // Everything date/time-ish after '@': digits, '-', ':', '.', 'T',
        // 'Z', '+' and a minus-offset after 'T'.
        while let Some(c) = self.peek() {
            let is_offset_sign = (c == '+' || c == '-') && text.contains('T');
            if c.is_ascii_digit()
                || c == '-'
                || c == ':'
                || c == '.'
                || c == 'T'
                || c == 'Z'
                || is_offset_sign
            {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if text.is_empty() {
            return Err(Error::parse("empty date/time literal", line, column));
        }
        Ok(Token::new(TokenKind::Temporal, text, line, column))
    }

    fn external_constant(&mut self, line: u32, column: u32) -> Result<Token> {
        self.advance(); // '%'
        if self.peek() == Some('\'') {
            self.advance();
            let text = self.escaped_until('\'', line, column)?;
            return Ok(Token::new(TokenKind::ExternalConstant, text, line, column));
        }
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if text.is_empty() {
            return Err(Error::parse("empty external constant name", line, column));
        }
        Ok(Token::new(TokenKind::ExternalConstant, text, line, column))
    }

    fn special_invocation(&mut self, line: u32, column: u32) -> Result<Token> {
        self.advance(); // '$'
        let mut text = String::from("$");
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match text.as_str() {
            "$this" | "$index" | "$total" => {
                Ok(Token::new(TokenKind::Special, text, line, column))
            }
            other => Err(Error::parse(
                format!("unknown special invocation '{other}'"),
                line,
                column,
            )),
        }
    }

    fn identifier(&mut self, line: u32, column: u32) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Identifier, text, line, column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if let Some(c) = c {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }
}

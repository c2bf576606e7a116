//! Built-in record selection for a jq-like predicate subset.
//!
//! Supported forms, over top-level keys only:
//!
//! ```text
//! .                                   every record
//! select(P)  or bare P                records where P is truthy
//! .evt == "decision.made"             equality (!= too)
//! .evt | startswith("hook.")          string prefix
//! has("rationale")                    key present
//! .rationale                          present and not null/false
//! P and Q, P or Q, not P, P | not     boolean logic
//! ( ... )                             grouping
//! "s", 12, 1.5, true, false, null     literals
//! ```
//!
//! Unlike jq, a bare predicate selects records instead of printing a boolean
//! per record, so this backend only ever returns a subset of its input.

use serde_json::Value;

use super::RecordFilter;
use crate::errors::FilterError;

/// Evaluator with no external dependency.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeFilter;

impl NativeFilter {
    /// Parse `expression` without evaluating it.
    pub fn compile(expression: &str) -> Result<Program, FilterError> {
        Parser::new(expression)?.program()
    }
}

impl RecordFilter for NativeFilter {
    fn name(&self) -> &'static str {
        "native"
    }

    fn filter(&self, records: Vec<Value>, expression: &str) -> Result<Vec<Value>, FilterError> {
        let program = Self::compile(expression)?;
        Ok(records.into_iter().filter(|r| program.matches(r)).collect())
    }
}

/// A compiled expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Program {
    /// `.`
    Identity,
    /// `select(P)` or a bare predicate.
    Select(Expr),
}

impl Program {
    /// Whether `record` passes.
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Self::Identity => true,
            Self::Select(expr) => truthy(&expr.eval(record)),
        }
    }
}

/// Expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// `.`
    Identity,
    /// `.key`
    Field(String),
    /// A literal value.
    Literal(Value),
    /// `has("key")`
    Has(String),
    /// `lhs == rhs`
    Eq(Box<Expr>, Box<Expr>),
    /// `lhs != rhs`
    Ne(Box<Expr>, Box<Expr>),
    /// `inner | startswith("prefix")`
    StartsWith(Box<Expr>, String),
    /// `lhs and rhs`
    And(Box<Expr>, Box<Expr>),
    /// `lhs or rhs`
    Or(Box<Expr>, Box<Expr>),
    /// `not inner` or `inner | not`
    Not(Box<Expr>),
}

impl Expr {
    fn eval(&self, record: &Value) -> Value {
        match self {
            Self::Identity => record.clone(),
            Self::Field(key) => record.get(key).cloned().unwrap_or(Value::Null),
            Self::Literal(v) => v.clone(),
            Self::Has(key) => Value::Bool(record.get(key).is_some()),
            Self::Eq(l, r) => Value::Bool(values_equal(&l.eval(record), &r.eval(record))),
            Self::Ne(l, r) => Value::Bool(!values_equal(&l.eval(record), &r.eval(record))),
            Self::StartsWith(inner, prefix) => Value::Bool(
                inner
                    .eval(record)
                    .as_str()
                    .is_some_and(|s| s.starts_with(prefix.as_str())),
            ),
            Self::And(l, r) => Value::Bool(truthy(&l.eval(record)) && truthy(&r.eval(record))),
            Self::Or(l, r) => Value::Bool(truthy(&l.eval(record)) || truthy(&r.eval(record))),
            Self::Not(inner) => Value::Bool(!truthy(&inner.eval(record))),
        }
    }
}

fn truthy(v: &Value) -> bool {
    !matches!(v, Value::Null | Value::Bool(false))
}

/// Numbers compare by value, so `1 == 1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

// ── Lexer ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Dot,
    Field(String),
    Ident(String),
    Str(String),
    Num(serde_json::Number),
    LParen,
    RParen,
    Pipe,
    EqEq,
    NotEq,
}

fn lex(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                i += 1;
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                if i == start {
                    tokens.push(Token::Dot);
                } else {
                    tokens.push(Token::Field(chars[start..i].iter().collect()));
                    if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|c| is_ident_char(*c)) {
                        return Err("nested paths are not supported; use top-level keys".into());
                    }
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '"' => {
                let (s, next) = lex_string(&chars, i + 1)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E' | '+' | '-')) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = serde_json::from_str::<serde_json::Number>(&text)
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Num(num));
            }
            c if is_ident_char(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lex_string(chars: &[char], mut i: usize) -> Result<(String, usize), String> {
    let mut out = String::new();
    while let Some(&c) = chars.get(i) {
        match c {
            '"' => return Ok((out, i + 1)),
            '\\' => {
                let escaped = chars.get(i + 1).ok_or("unterminated escape")?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    '"' => '"',
                    '\\' => '\\',
                    other => return Err(format!("unsupported escape '\\{other}'")),
                });
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err("unterminated string".into())
}

// ── Parser ──────────────────────────────────────────────────────────────────

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self, FilterError> {
        let tokens = lex(source).map_err(|message| FilterError::Parse {
            expression: source.to_string(),
            message,
        })?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
        })
    }

    fn error(&self, message: impl Into<String>) -> FilterError {
        FilterError::Parse {
            expression: self.source.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn expect(&mut self, token: &Token) -> Result<(), FilterError> {
        match self.next() {
            Some(ref t) if t == token => Ok(()),
            Some(t) => Err(self.error(format!("expected {token:?}, found {t:?}"))),
            None => Err(self.error(format!("expected {token:?}, found end of input"))),
        }
    }

    fn program(mut self) -> Result<Program, FilterError> {
        if self.tokens.is_empty() {
            return Err(self.error("empty expression"));
        }
        if self.tokens == [Token::Dot] {
            return Ok(Program::Identity);
        }
        let expr = if self.peek_ident("select") {
            self.pos += 1;
            self.expect(&Token::LParen)?;
            let inner = self.pipeline()?;
            self.expect(&Token::RParen)?;
            inner
        } else {
            self.pipeline()?
        };
        if let Some(t) = self.peek() {
            return Err(self.error(format!("unexpected trailing {t:?}")));
        }
        Ok(Program::Select(expr))
    }

    /// `or ('|' (not | startswith(s)))*`
    fn pipeline(&mut self) -> Result<Expr, FilterError> {
        let mut expr = self.or()?;
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            expr = self.pipe_stage(expr)?;
        }
        Ok(expr)
    }

    fn pipe_stage(&mut self, input: Expr) -> Result<Expr, FilterError> {
        match self.next() {
            Some(Token::Ident(w)) if w == "not" => Ok(Expr::Not(Box::new(input))),
            Some(Token::Ident(w)) if w == "startswith" => {
                self.expect(&Token::LParen)?;
                let prefix = self.string_arg()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::StartsWith(Box::new(input), prefix))
            }
            Some(t) => Err(self.error(format!("unsupported pipe stage {t:?}"))),
            None => Err(self.error("expected pipe stage, found end of input")),
        }
    }

    fn or(&mut self) -> Result<Expr, FilterError> {
        let mut lhs = self.and()?;
        while self.peek_ident("or") {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, FilterError> {
        let mut lhs = self.unary()?;
        while self.peek_ident("and") {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FilterError> {
        if self.peek_ident("not") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, FilterError> {
        let lhs = self.primary()?;
        match self.peek() {
            Some(Token::EqEq) => {
                self.pos += 1;
                Ok(Expr::Eq(Box::new(lhs), Box::new(self.primary()?)))
            }
            Some(Token::NotEq) => {
                self.pos += 1;
                Ok(Expr::Ne(Box::new(lhs), Box::new(self.primary()?)))
            }
            _ => Ok(lhs),
        }
    }

    fn primary(&mut self) -> Result<Expr, FilterError> {
        match self.next() {
            Some(Token::Dot) => Ok(Expr::Identity),
            Some(Token::Field(key)) => Ok(Expr::Field(key)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::LParen) => {
                let inner = self.pipeline()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(w)) => match w.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "has" => {
                    self.expect(&Token::LParen)?;
                    let key = self.string_arg()?;
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Has(key))
                }
                other => Err(self.error(format!("unsupported function '{other}'"))),
            },
            Some(t) => Err(self.error(format!("unexpected {t:?}"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn string_arg(&mut self) -> Result<String, FilterError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(s),
            _ => Err(self.error("expected a string argument")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

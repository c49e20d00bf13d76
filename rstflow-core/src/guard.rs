//! Guard expression evaluation.
//!
//! Textual guards are boolean expressions over the host's field view
//! (`Host::fields`) and, inside callback chains, the in-flight transition.
//! The language is deliberately small and side-effect free:
//!
//! - `field` / `self.field` - host field access (truthy check)
//! - `field.nested` - nested field access, `items.0` indexes arrays
//! - `transition.event`, `transition.from`, `transition.to`,
//!   `transition.args.0`, `transition.named.key` - the in-flight transition
//! - `field == value` - equality (strings, numbers, booleans, null)
//! - `field != value` - inequality
//! - `field > value`, `>=`, `<`, `<=` - numeric comparison
//! - `!expr` - logical NOT
//! - `expr && expr` - logical AND (higher precedence than OR)
//! - `expr || expr` - logical OR
//! - `(expr)` - grouping for precedence control
//!
//! Strings may be quoted with `'` or `"`.
//!
//! Examples:
//! - `title == 'foobar'`
//! - `amount > 100 && approved`
//! - `(a || b) && !archived`
//! - `transition.event == "reject" && reviewer.senior`

use crate::error::CoreError;
use serde_json::Value;

/// Root that a field path resolves against.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPath {
    /// Path into `Host::fields()`.
    Target(String),
    /// Path into the in-flight `TransitionContext`.
    Transition(String),
}

/// A parsed guard expression.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardExpr {
    /// Boolean literal.
    Literal(bool),
    /// Field is truthy.
    Truthy(FieldPath),
    /// Equality comparison.
    Eq(FieldPath, Value),
    /// Inequality comparison.
    Ne(FieldPath, Value),
    /// Greater than.
    Gt(FieldPath, f64),
    /// Greater or equal.
    Ge(FieldPath, f64),
    /// Less than.
    Lt(FieldPath, f64),
    /// Less or equal.
    Le(FieldPath, f64),
    /// Logical AND.
    And(Box<GuardExpr>, Box<GuardExpr>),
    /// Logical OR.
    Or(Box<GuardExpr>, Box<GuardExpr>),
    /// Logical NOT.
    Not(Box<GuardExpr>),
}

/// Values an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct GuardScope<'a> {
    pub fields: &'a Value,
    pub transition: Option<&'a Value>,
}

impl<'a> GuardScope<'a> {
    pub fn new(fields: &'a Value) -> Self {
        Self {
            fields,
            transition: None,
        }
    }

    pub fn with_transition(mut self, transition: &'a Value) -> Self {
        self.transition = Some(transition);
        self
    }

    fn resolve(&self, path: &FieldPath) -> Value {
        match path {
            FieldPath::Target(field) => get_field(self.fields, field),
            FieldPath::Transition(field) => self
                .transition
                .map(|t| get_field(t, field))
                .unwrap_or(Value::Null),
        }
    }
}

impl GuardExpr {
    /// Parses a guard expression from a string.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoreError::InvalidGuard {
                reason: "empty guard expression".to_string(),
            });
        }

        let mut parser = Parser::new(s);
        let expr = parser.parse_expr()?;
        parser.skip_whitespace();
        if parser.pos < s.len() {
            return Err(CoreError::InvalidGuard {
                reason: format!("unexpected input at '{}'", &s[parser.pos..]),
            });
        }
        Ok(expr)
    }

    /// Evaluates the guard against a scope.
    pub fn evaluate(&self, scope: &GuardScope<'_>) -> bool {
        match self {
            GuardExpr::Literal(b) => *b,
            GuardExpr::Truthy(field) => is_truthy(&scope.resolve(field)),
            GuardExpr::Eq(field, expected) => values_equal(&scope.resolve(field), expected),
            GuardExpr::Ne(field, expected) => !values_equal(&scope.resolve(field), expected),
            GuardExpr::Gt(field, expected) => as_f64(&scope.resolve(field))
                .map(|v| v > *expected)
                .unwrap_or(false),
            GuardExpr::Ge(field, expected) => as_f64(&scope.resolve(field))
                .map(|v| v >= *expected)
                .unwrap_or(false),
            GuardExpr::Lt(field, expected) => as_f64(&scope.resolve(field))
                .map(|v| v < *expected)
                .unwrap_or(false),
            GuardExpr::Le(field, expected) => as_f64(&scope.resolve(field))
                .map(|v| v <= *expected)
                .unwrap_or(false),
            GuardExpr::And(left, right) => left.evaluate(scope) && right.evaluate(scope),
            GuardExpr::Or(left, right) => left.evaluate(scope) || right.evaluate(scope),
            GuardExpr::Not(inner) => !inner.evaluate(scope),
        }
    }
}

fn get_field(root: &Value, field: &str) -> Value {
    let mut current = root;

    for part in field.split('.') {
        current = match current {
            Value::Object(map) => map.get(part).unwrap_or(&Value::Null),
            Value::Array(items) => match part.parse::<usize>() {
                Ok(idx) => items.get(idx).unwrap_or(&Value::Null),
                Err(_) => return Value::Null,
            },
            _ => return Value::Null,
        };
    }

    current.clone()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .map(|(a, b)| (a - b).abs() < f64::EPSILON)
            .unwrap_or(false),
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Simple recursive descent parser for guard expressions.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_expr(&mut self) -> Result<GuardExpr, CoreError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<GuardExpr, CoreError> {
        let mut left = self.parse_and()?;
        self.skip_whitespace();

        while self.peek_str("||") {
            self.pos += 2;
            self.skip_whitespace();
            let right = self.parse_and()?;
            left = GuardExpr::Or(Box::new(left), Box::new(right));
            self.skip_whitespace();
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<GuardExpr, CoreError> {
        let mut left = self.parse_unary()?;
        self.skip_whitespace();

        while self.peek_str("&&") {
            self.pos += 2;
            self.skip_whitespace();
            let right = self.parse_unary()?;
            left = GuardExpr::And(Box::new(left), Box::new(right));
            self.skip_whitespace();
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<GuardExpr, CoreError> {
        self.skip_whitespace();

        if self.peek_char() == Some('!') && !self.peek_str("!=") {
            self.pos += 1;
            self.skip_whitespace();
            let inner = self.parse_unary()?;
            return Ok(GuardExpr::Not(Box::new(inner)));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<GuardExpr, CoreError> {
        self.skip_whitespace();

        if self.peek_char() == Some('(') {
            self.pos += 1;
            let expr = self.parse_expr()?;
            self.skip_whitespace();
            if self.peek_char() != Some(')') {
                return Err(CoreError::InvalidGuard {
                    reason: "expected ')'".to_string(),
                });
            }
            self.pos += 1;
            return Ok(expr);
        }

        if self.peek_keyword("true") {
            self.pos += 4;
            return Ok(GuardExpr::Literal(true));
        }
        if self.peek_keyword("false") {
            self.pos += 5;
            return Ok(GuardExpr::Literal(false));
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<GuardExpr, CoreError> {
        self.skip_whitespace();
        let field = self.parse_field()?;
        self.skip_whitespace();

        if self.peek_str("==") {
            self.pos += 2;
            let value = self.parse_value()?;
            return Ok(GuardExpr::Eq(field, value));
        }

        if self.peek_str("!=") {
            self.pos += 2;
            let value = self.parse_value()?;
            return Ok(GuardExpr::Ne(field, value));
        }

        if self.peek_str(">=") {
            self.pos += 2;
            let num = self.parse_number()?;
            return Ok(GuardExpr::Ge(field, num));
        }

        if self.peek_str("<=") {
            self.pos += 2;
            let num = self.parse_number()?;
            return Ok(GuardExpr::Le(field, num));
        }

        if self.peek_char() == Some('>') {
            self.pos += 1;
            let num = self.parse_number()?;
            return Ok(GuardExpr::Gt(field, num));
        }

        if self.peek_char() == Some('<') {
            self.pos += 1;
            let num = self.parse_number()?;
            return Ok(GuardExpr::Lt(field, num));
        }

        // No operator, just truthy check
        Ok(GuardExpr::Truthy(field))
    }

    fn parse_field(&mut self) -> Result<FieldPath, CoreError> {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }

        let raw = &self.input[start..self.pos];
        if raw.is_empty() {
            return Err(CoreError::InvalidGuard {
                reason: format!("expected field name at '{}'", &self.input[start..]),
            });
        }
        if raw.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(CoreError::InvalidGuard {
                reason: format!("field name cannot start with a digit: '{}'", raw),
            });
        }

        let path = if let Some(rest) = raw.strip_prefix("transition.") {
            FieldPath::Transition(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix("self.") {
            FieldPath::Target(rest.to_string())
        } else {
            FieldPath::Target(raw.to_string())
        };

        match &path {
            FieldPath::Target(f) | FieldPath::Transition(f)
                if f.is_empty() || f.split('.').any(str::is_empty) =>
            {
                Err(CoreError::InvalidGuard {
                    reason: format!("malformed field path '{}'", raw),
                })
            }
            _ => Ok(path),
        }
    }

    fn parse_value(&mut self) -> Result<Value, CoreError> {
        self.skip_whitespace();

        if self.peek_keyword("true") {
            self.pos += 4;
            return Ok(Value::Bool(true));
        }
        if self.peek_keyword("false") {
            self.pos += 5;
            return Ok(Value::Bool(false));
        }
        if self.peek_keyword("null") {
            self.pos += 4;
            return Ok(Value::Null);
        }

        if matches!(self.peek_char(), Some('"') | Some('\'')) {
            return self.parse_string_value();
        }

        let num = self.parse_number()?;
        serde_json::Number::from_f64(num)
            .map(Value::Number)
            .ok_or_else(|| CoreError::InvalidGuard {
                reason: format!("number out of range: {}", num),
            })
    }

    fn parse_string_value(&mut self) -> Result<Value, CoreError> {
        let quote = match self.peek_char() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                return Err(CoreError::InvalidGuard {
                    reason: "expected string".to_string(),
                })
            }
        };
        self.pos += 1;

        let mut out = String::new();
        let mut chars = self.input[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            if c == quote {
                self.pos += offset + 1;
                return Ok(Value::String(out));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                }
            } else {
                out.push(c);
            }
        }

        Err(CoreError::InvalidGuard {
            reason: "unterminated string".to_string(),
        })
    }

    fn parse_number(&mut self) -> Result<f64, CoreError> {
        self.skip_whitespace();
        let start = self.pos;

        if self.peek_char() == Some('-') {
            self.pos += 1;
        }

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }

        if self.peek_char() == Some('.') {
            self.pos += 1;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| CoreError::InvalidGuard {
            reason: format!("invalid number: '{}'", num_str),
        })
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_str(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    /// Matches `word` only when it is not the prefix of a longer identifier.
    fn peek_keyword(&self, word: &str) -> bool {
        let rest = &self.input[self.pos..];
        rest.starts_with(word)
            && !rest[word.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
    }
}

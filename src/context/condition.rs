//! Condition expressions for conditional steps.
//!
//! Conditions are small boolean expressions evaluated against a context:
//!
//! ```text
//! flag == "no"
//! env != 'prod' and not skip_tests
//! "error" in build.output || {{retries}} == 3
//! ```
//!
//! Operands are variable paths (bare or wrapped as `{{path}}`), quoted
//! strings, numbers, booleans and null. Operators are `==`, `!=`, `in`,
//! `not in`, `and`/`&&`, `or`/`||`, `not`/`!` and parentheses. There are no
//! function calls, so an expression can only read context values.
//!
//! `{{path}}` markers inside a quoted string are rendered against the
//! context, so `'{{flag}}' == 'no'` compares the rendered text. Nesting of
//! parentheses and `not` is limited to [`MAX_DEPTH`] levels.

use super::{Context, Value};
use std::fmt;
use thiserror::Error;

/// Maximum nesting of parentheses and negations in one condition.
pub const MAX_DEPTH: usize = 64;

/// Error raised when a condition cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("empty condition expression")]
    Empty,

    #[error("unexpected character '{ch}' at position {position} in condition '{expression}'")]
    UnexpectedChar {
        ch: char,
        position: usize,
        expression: String,
    },

    #[error("unterminated string literal at position {position} in condition '{expression}'")]
    UnterminatedString { position: usize, expression: String },

    #[error("unterminated '{{{{' at position {position} in condition '{expression}'")]
    UnterminatedMarker { position: usize, expression: String },

    #[error("invalid number '{literal}' in condition '{expression}'")]
    InvalidNumber { literal: String, expression: String },

    #[error("unexpected {token} in condition '{expression}'")]
    UnexpectedToken { token: String, expression: String },

    #[error("unexpected end of condition '{expression}'")]
    UnexpectedEnd { expression: String },

    #[error("condition nests deeper than {max} levels: '{expression}'")]
    TooDeep { max: usize, expression: String },
}

/// Evaluate a condition expression against a context.
pub fn evaluate(expression: &str, context: &Context) -> Result<bool, ConditionError> {
    let expr = parse(expression)?;
    Ok(expr.eval(context).is_truthy())
}

/// Parse a condition into an expression tree without evaluating it.
fn parse(expression: &str) -> Result<Expr, ConditionError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ConditionError::Empty);
    }

    let mut parser = ExprParser {
        tokens,
        pos: 0,
        depth: 0,
        expression,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ConditionError::UnexpectedToken {
            token: token.to_string(),
            expression: expression.to_string(),
        });
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Eq,
    NotEq,
    And,
    Or,
    Not,
    In,
    Literal(Value),
    /// Quoted string containing `{{path}}` markers.
    Interpolated(String),
    Path(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Eq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
            Token::And => write!(f, "'and'"),
            Token::Or => write!(f, "'or'"),
            Token::Not => write!(f, "'not'"),
            Token::In => write!(f, "'in'"),
            Token::Literal(value) => write!(f, "literal '{}'", value.render()),
            Token::Interpolated(text) => write!(f, "literal '{}'", text),
            Token::Path(path) => write!(f, "variable '{}'", path),
        }
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn tokenize(expression: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                match chars.next() {
                    Some((_, '=')) => tokens.push(Token::Eq),
                    _ => {
                        return Err(ConditionError::UnexpectedChar {
                            ch: '=',
                            position: pos,
                            expression: expression.to_string(),
                        });
                    }
                }
            }
            '!' => {
                chars.next();
                if let Some((_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '&' | '|' => {
                chars.next();
                match chars.next() {
                    Some((_, next)) if next == ch => {
                        tokens.push(if ch == '&' { Token::And } else { Token::Or })
                    }
                    _ => {
                        return Err(ConditionError::UnexpectedChar {
                            ch,
                            position: pos,
                            expression: expression.to_string(),
                        });
                    }
                }
            }
            '"' | '\'' => {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == ch {
                        closed = true;
                        break;
                    }
                    if c == '\\' {
                        match chars.next() {
                            Some((_, 'n')) => literal.push('\n'),
                            Some((_, 't')) => literal.push('\t'),
                            Some((_, escaped)) => literal.push(escaped),
                            None => break,
                        }
                    } else {
                        literal.push(c);
                    }
                }
                if !closed {
                    return Err(ConditionError::UnterminatedString {
                        position: pos,
                        expression: expression.to_string(),
                    });
                }
                if literal.contains("{{") {
                    tokens.push(Token::Interpolated(literal));
                } else {
                    tokens.push(Token::Literal(Value::String(literal)));
                }
            }
            '{' => {
                let rest = &expression[pos..];
                let Some(body) = rest.strip_prefix("{{") else {
                    return Err(ConditionError::UnexpectedChar {
                        ch,
                        position: pos,
                        expression: expression.to_string(),
                    });
                };
                let Some(end) = body.find("}}") else {
                    return Err(ConditionError::UnterminatedMarker {
                        position: pos,
                        expression: expression.to_string(),
                    });
                };
                let path = body[..end].trim();
                if path.is_empty() || !path.chars().all(is_path_char) {
                    return Err(ConditionError::UnexpectedChar {
                        ch,
                        position: pos,
                        expression: expression.to_string(),
                    });
                }
                tokens.push(Token::Path(path.to_string()));
                // Skip past the closing braces.
                let consumed = 2 + end + 2;
                while let Some(&(p, _)) = chars.peek() {
                    if p >= pos + consumed {
                        break;
                    }
                    chars.next();
                }
            }
            c if c.is_ascii_digit()
                || (c == '-'
                    && expression[pos + 1..]
                        .chars()
                        .next()
                        .is_some_and(|n| n.is_ascii_digit())) =>
            {
                let mut literal = String::new();
                literal.push(c);
                chars.next();
                while let Some(&(_, n)) = chars.peek() {
                    if n.is_ascii_digit() || matches!(n, '.' | '_' | 'e' | 'E') {
                        literal.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Literal(parse_number(&literal, expression)?));
            }
            c if is_path_char(c) => {
                let mut word = String::new();
                while let Some(&(_, n)) = chars.peek() {
                    if is_path_char(n) {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(keyword(word));
            }
            other => {
                return Err(ConditionError::UnexpectedChar {
                    ch: other,
                    position: pos,
                    expression: expression.to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

fn parse_number(literal: &str, expression: &str) -> Result<Value, ConditionError> {
    let cleaned = literal.replace('_', "");
    if let Ok(i) = cleaned.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    if let Ok(u) = cleaned.parse::<u64>() {
        return Ok(Value::UInt(u));
    }
    cleaned
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| ConditionError::InvalidNumber {
            literal: literal.to_string(),
            expression: expression.to_string(),
        })
}

fn keyword(word: String) -> Token {
    match word.as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "true" | "True" => Token::Literal(Value::Bool(true)),
        "false" | "False" => Token::Literal(Value::Bool(false)),
        "null" | "none" | "None" => Token::Literal(Value::Null),
        _ => Token::Path(word),
    }
}

// ---------------------------------------------------------------------------
// Expression tree
// ---------------------------------------------------------------------------

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    NotEq,
    In,
    NotIn,
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Interpolated(String),
    Var(String),
    Not(Box<Expr>),
    /// Operands of a chain of `and`, kept flat so long chains do not nest.
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate to a value. Logical and comparison nodes yield booleans.
    fn eval(&self, context: &Context) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Interpolated(text) => Value::String(context.render(text)),
            Expr::Var(path) => context.get(path).clone(),
            Expr::Not(inner) => Value::Bool(!inner.eval(context).is_truthy()),
            Expr::And(operands) => {
                Value::Bool(operands.iter().all(|e| e.eval(context).is_truthy()))
            }
            Expr::Or(operands) => Value::Bool(operands.iter().any(|e| e.eval(context).is_truthy())),
            Expr::Compare { op, left, right } => {
                let l = left.eval(context);
                let r = right.eval(context);
                Value::Bool(match op {
                    CompareOp::Eq => values_equal(&l, &r),
                    CompareOp::NotEq => !values_equal(&l, &r),
                    CompareOp::In => contains(&r, &l),
                    CompareOp::NotIn => !contains(&r, &l),
                })
            }
        }
    }
}

/// Equality with numeric coercion between integers and floats.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(i), Value::UInt(u)) | (Value::UInt(u), Value::Int(i)) => {
            u64::try_from(*i).is_ok_and(|i| i == *u)
        }
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => (*i as f64) == *f,
        (Value::UInt(u), Value::Float(f)) | (Value::Float(f), Value::UInt(u)) => (*u as f64) == *f,
        _ => a == b,
    }
}

/// Membership: substring for strings, element for lists, key for maps.
fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::String(s), Value::String(n)) => s.contains(n.as_str()),
        (Value::List(items), _) => items.iter().any(|item| values_equal(item, needle)),
        (Value::Map(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    expression: &'a str,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_error(&self) -> ConditionError {
        ConditionError::UnexpectedEnd {
            expression: self.expression.to_string(),
        }
    }

    fn token_error(&self, token: &Token) -> ConditionError {
        ConditionError::UnexpectedToken {
            token: token.to_string(),
            expression: self.expression.to_string(),
        }
    }

    /// Enter one level of nesting.
    fn descend(&mut self) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionError::TooDeep {
                max: MAX_DEPTH,
                expression: self.expression.to_string(),
            });
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let first = self.parse_and()?;
        let mut operands = vec![first];
        while let Some(Token::Or) = self.peek() {
            self.advance();
            operands.push(self.parse_and()?);
        }
        Ok(match operands.len() {
            1 => operands.remove(0),
            _ => Expr::Or(operands),
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let first = self.parse_not()?;
        let mut operands = vec![first];
        while let Some(Token::And) = self.peek() {
            self.advance();
            operands.push(self.parse_not()?);
        }
        Ok(match operands.len() {
            1 => operands.remove(0),
            _ => Expr::And(operands),
        })
    }

    fn parse_not(&mut self) -> Result<Expr, ConditionError> {
        if let Some(Token::Not) = self.peek() {
            self.advance();
            self.descend()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let left = self.parse_operand()?;

        let op = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Eq), _) => CompareOp::Eq,
            (Some(Token::NotEq), _) => CompareOp::NotEq,
            (Some(Token::In), _) => CompareOp::In,
            (Some(Token::Not), Some(Token::In)) => {
                self.advance();
                CompareOp::NotIn
            }
            _ => return Ok(left),
        };
        self.advance();

        let right = self.parse_operand()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_operand(&mut self) -> Result<Expr, ConditionError> {
        match self.advance() {
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => Err(self.token_error(&token)),
                    None => Err(self.end_error()),
                }
            }
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Interpolated(text)) => Ok(Expr::Interpolated(text)),
            Some(Token::Path(path)) => Ok(Expr::Var(path)),
            Some(token) => Err(self.token_error(&token)),
            None => Err(self.end_error()),
        }
    }
}

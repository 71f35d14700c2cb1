use std::fmt;

use crate::builtins::{format_number, to_number};

/// A cell value: a double or a piece of text.
///
/// The numeric missing value is NaN. Anything arithmetic produces as NaN
/// (0/0, sqrt(-1), a failed coercion) is therefore missing as well, and
/// propagates through further arithmetic without extra checks. The text
/// missing value is the empty string.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub const MISSING: Value = Value::Number(f64::NAN);

    pub fn from_number(n: f64) -> Self {
        Value::Number(n)
    }

    pub fn from_text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn from_bool(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Value::Number(n) => n.is_nan(),
            Value::Text(s) => s.trim().is_empty(),
        }
    }

    /// Numeric view. Text that does not parse as a number is missing.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(s) => to_number(s),
        }
    }

    /// Non-missing and non-zero.
    pub fn is_truthy(&self) -> bool {
        let n = self.to_number();
        !n.is_nan() && n != 0.0
    }

    /// The missing value of the same type: empty text or numeric missing.
    pub fn missing_like(&self) -> Value {
        match self {
            Value::Number(_) => Value::MISSING,
            Value::Text(_) => Value::Text(String::new()),
        }
    }

    /// Text view used by concatenation and text functions.
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(_) => self.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::MISSING
    }
}

/// Missing equals missing; text ignores trailing blanks.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a.trim_end() == b.trim_end(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.is_nan() => f.write_str("."),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

//! Scalar values and the canonical string coercion rule
//!
//! Every variable and resolved fact in Varka is one of four scalar kinds.
//! Strings coming back from a resolver are coerced on read: "true"/"false"
//! become booleans, numeric text becomes a number, anything else stays a
//! raw string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar script value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Coerce a raw string by the canonical rule: case-insensitive
    /// "true"/"false" become Bool; text without a '.' that parses as an
    /// integer becomes Int; text with a '.' that parses becomes Float;
    /// everything else stays a raw string.
    pub fn coerce_str(raw: &str) -> Value {
        if raw.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if raw.contains('.') {
            if let Ok(f) = raw.trim().parse::<f64>() {
                return Value::Float(f);
            }
        } else if let Ok(i) = raw.trim().parse::<i64>() {
            return Value::Int(i);
        }
        Value::Str(raw.to_string())
    }

    /// Apply the coercion rule to string values, pass others through
    pub fn coerced(self) -> Value {
        match self {
            Value::Str(s) => Value::coerce_str(&s),
            other => other,
        }
    }

    /// Truthiness: false/0/0.0/"" are false, everything else is true
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Numeric view, with booleans acting as 0/1. `None` for non-numeric
    /// strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Demote a float result to Int when it is mathematically whole
    pub fn from_f64_demoted(f: f64) -> Value {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            Value::Int(f as i64)
        } else {
            Value::Float(f)
        }
    }
}

impl fmt::Display for Value {
    /// Stringification mirrors the original runtime: booleans render as
    /// `True`/`False` and whole floats keep a trailing `.0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_booleans() {
        assert_eq!(Value::coerce_str("true"), Value::Bool(true));
        assert_eq!(Value::coerce_str("FALSE"), Value::Bool(false));
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(Value::coerce_str("42"), Value::Int(42));
        assert_eq!(Value::coerce_str("-7"), Value::Int(-7));
        assert_eq!(Value::coerce_str("3.5"), Value::Float(3.5));
    }

    #[test]
    fn test_coerce_raw_string() {
        assert_eq!(
            Value::coerce_str("hello world"),
            Value::Str("hello world".to_string())
        );
        // dotted but non-numeric stays raw
        assert_eq!(
            Value::coerce_str("member.name"),
            Value::Str("member.name".to_string())
        );
    }

    #[test]
    fn test_display_python_style() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Int(9).to_string(), "9");
    }

    #[test]
    fn test_demotion() {
        assert_eq!(Value::from_f64_demoted(3.0), Value::Int(3));
        assert_eq!(Value::from_f64_demoted(3.25), Value::Float(3.25));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Str("false".into()).is_truthy()); // raw string, not coerced
        assert!(!Value::Str("".into()).is_truthy());
    }

    #[test]
    fn test_serde_untagged() {
        let v: Value = serde_json::from_str("3").unwrap();
        assert_eq!(v, Value::Int(3));
        let v: Value = serde_json::from_str("3.5").unwrap();
        assert_eq!(v, Value::Float(3.5));
        let v: Value = serde_json::from_str("\"hi\"").unwrap();
        assert_eq!(v, Value::Str("hi".into()));
        assert_eq!(serde_json::to_string(&Value::Bool(true)).unwrap(), "true");
    }
}

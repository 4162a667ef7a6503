//! Script values: numbers, strings, and the absent result of failed lookups.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use zest_common::ConfigValue;

/// A runtime value produced by evaluating a script node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Str(String),
    /// Result of unknown operators and unresolved references
    Absent,
}

impl Default for Value {
    fn default() -> Self {
        Value::Number(0.0)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
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

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Number(n) => Value::Number(n),
            ConfigValue::Text(s) => Value::Str(s),
        }
    }
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Absent => false,
        }
    }

    /// Numeric view. Numeric strings parse; anything else is 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Str(s) => s.trim().parse().unwrap_or(0.0),
            Value::Absent => 0.0,
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Absent => Some(0.0),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Loose equality: numeric when both sides are numeric, else by display text
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Ordering for `<`, `>`, ... comparisons
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) if self.numeric().is_none() || other.numeric().is_none() => {
                Some(a.cmp(b))
            }
            _ => self.as_number().partial_cmp(&other.as_number()),
        }
    }

    pub fn into_config(self) -> ConfigValue {
        match self {
            Value::Str(s) => ConfigValue::Text(s),
            other => ConfigValue::Number(other.as_number()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Absent => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-2.0).to_string(), "-2");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Absent.to_string(), "");
    }

    #[test]
    fn truthiness() {
        assert!(Value::Number(1.0).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Absent.is_truthy());
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Number(2.0).loose_eq(&Value::from("2")));
        assert!(Value::from("wall").loose_eq(&Value::from("wall")));
        assert!(!Value::from("wall").loose_eq(&Value::from("floor")));
        assert!(Value::Absent.loose_eq(&Value::Number(0.0)));
    }

    #[test]
    fn ordering() {
        assert_eq!(Value::Number(1.0).compare(&Value::Number(2.0)), Some(Ordering::Less));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("10").compare(&Value::Number(9.0)), Some(Ordering::Greater));
    }
}

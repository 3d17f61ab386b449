//! Conversions between expression values
//!
//! Expressions operate on `serde_json::Value`. Conversions follow XPath 1.0
//! rules: an array behaves like a node-set (its first element supplies the
//! string value), null behaves like an empty node-set.

use serde_json::{Number, Value};

/// String value of `value`
pub fn to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.first().map(to_string).unwrap_or_default(),
        Value::Object(_) => value.to_string(),
    }
}

/// String value of `value`, or `None` for null
pub fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(to_string(other)),
    }
}

/// Numeric value of `value`. Unconvertible values are NaN
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => f64::NAN,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Array(items) => items.first().map(to_number).unwrap_or(f64::NAN),
        Value::Object(_) => f64::NAN,
    }
}

/// Boolean value of `value`
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Wrap a number. Non-finite numbers have no JSON form and are kept as their
/// text, `NaN`, `Infinity` or `-Infinity`, which [`to_number`] reads back
pub fn from_number(n: f64) -> Value {
    Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(format_number(n)))
}

/// Format a number the way it should appear in text: integral values
/// without a fractional part
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Short description of a value's type, for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "collection",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_to_string() {
        assert_eq!(to_string(&Value::Null), "");
        assert_eq!(to_string(&json!(true)), "true");
        assert_eq!(to_string(&json!(4.0)), "4");
        assert_eq!(to_string(&json!(["a", "b"])), "a");
        assert_eq!(to_text(&Value::Null), None);
        assert_eq!(to_text(&json!("")), Some(String::new()));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!("3")), 3.0);
        assert_eq!(to_number(&json!(" 2.5 ")), 2.5);
        assert!(to_number(&json!("1/2")).is_nan());
        assert!(to_number(&Value::Null).is_nan());
    }

    #[test]
    fn test_to_bool() {
        assert!(!to_bool(&json!("")));
        assert!(to_bool(&json!("x")));
        assert!(!to_bool(&json!(0)));
        assert!(to_bool(&json!({})));
        assert!(!to_bool(&json!([])));
    }

    #[test]
    fn test_from_number_non_finite() {
        assert_eq!(from_number(f64::INFINITY), json!("Infinity"));
        assert_eq!(from_number(f64::NEG_INFINITY), json!("-Infinity"));
        assert_eq!(from_number(f64::NAN), json!("NaN"));
        assert_eq!(from_number(2.0), json!(2.0));

        assert_eq!(to_number(&from_number(f64::NEG_INFINITY)), f64::NEG_INFINITY);
        assert!(to_number(&from_number(f64::NAN)).is_nan());
    }
}

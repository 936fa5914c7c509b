//! Model of arbitrary host values and their text rendering.
//!
//! Intercepted calls can receive anything. The browser runtime converts each
//! argument into a [`CapturedValue`] and [`serialize`] renders it to text.
//! Rendering never fails: values whose structured form could not be produced
//! carry a pre-computed fallback string.

use serde_json::Value as JsonValue;

/// A host value as seen by an interceptor.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedValue {
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// Boolean primitive
    Bool(bool),
    /// Number primitive
    Number(f64),
    /// BigInt primitive, already rendered as decimal digits
    BigInt(String),
    /// String primitive
    String(String),
    /// Symbol with its description
    Symbol(String),
    /// Function with its name, if any
    Function(Option<String>),
    /// Error-like object
    Error {
        /// Constructor name, e.g. `TypeError`
        name: String,
        /// Error message
        message: String,
    },
    /// Object or array with a structured (JSON) form
    Structured(JsonValue),
    /// Object whose structured form failed (cycles, throwing getters);
    /// holds the plain string cast
    Opaque(String),
}

impl CapturedValue {
    /// Shorthand for a string value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Shorthand for an error value.
    #[must_use]
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Check if the value is error-like.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<&str> for CapturedValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for CapturedValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for CapturedValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for CapturedValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<JsonValue> for CapturedValue {
    fn from(v: JsonValue) -> Self {
        Self::Structured(v)
    }
}

/// Render a value to text.
#[must_use]
pub fn serialize(value: &CapturedValue) -> String {
    match value {
        CapturedValue::Null => "null".to_string(),
        CapturedValue::Undefined => "undefined".to_string(),
        CapturedValue::Bool(b) => b.to_string(),
        CapturedValue::Number(n) => format_number(*n),
        CapturedValue::BigInt(digits) => digits.clone(),
        CapturedValue::String(s) => s.clone(),
        CapturedValue::Symbol(description) => format!("Symbol({description})"),
        CapturedValue::Function(Some(name)) if !name.is_empty() => format!("[Function: {name}]"),
        CapturedValue::Function(_) => "[Function (anonymous)]".to_string(),
        CapturedValue::Error { name, message } => {
            if message.is_empty() {
                name.clone()
            } else {
                format!("{name}: {message}")
            }
        }
        CapturedValue::Structured(json) => {
            serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string())
        }
        CapturedValue::Opaque(fallback) => fallback.clone(),
    }
}

/// Render every value of an argument list.
#[must_use]
pub fn serialize_all(values: &[CapturedValue]) -> Vec<String> {
    values.iter().map(serialize).collect()
}

/// Format a number the way a JS `String()` cast does.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.abs() >= 1e21 {
        let s = format!("{n:e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        };
    }
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_null_and_undefined() {
        assert_eq!(serialize(&CapturedValue::Null), "null");
        assert_eq!(serialize(&CapturedValue::Undefined), "undefined");
    }

    #[test]
    fn test_serialize_primitives() {
        assert_eq!(serialize(&CapturedValue::Number(42.0)), "42");
        assert_eq!(serialize(&CapturedValue::Number(1.5)), "1.5");
        assert_eq!(serialize(&CapturedValue::Number(-0.0)), "0");
        assert_eq!(serialize(&CapturedValue::Bool(true)), "true");
        assert_eq!(serialize(&"hello".into()), "hello");
        assert_eq!(serialize(&CapturedValue::BigInt("10".into())), "10");
        assert_eq!(serialize(&CapturedValue::Symbol("tag".into())), "Symbol(tag)");
    }

    #[test]
    fn test_serialize_special_numbers() {
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(123_456_789.0), "123456789");
    }

    #[test]
    fn test_serialize_error() {
        let text = serialize(&CapturedValue::error("Error", "x"));
        assert!(text.contains('x'));
        assert_eq!(text, "Error: x");
        assert_eq!(serialize(&CapturedValue::error("TypeError", "")), "TypeError");
    }

    #[test]
    fn test_serialize_structured_is_pretty() {
        let text = serialize(&json!({"a": 1}).into());
        assert_eq!(text, "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_serialize_opaque_uses_fallback() {
        let text = serialize(&CapturedValue::Opaque("[object Object]".into()));
        assert_eq!(text, "[object Object]");
    }

    #[test]
    fn test_serialize_functions() {
        assert_eq!(
            serialize(&CapturedValue::Function(Some("handler".into()))),
            "[Function: handler]"
        );
        assert_eq!(
            serialize(&CapturedValue::Function(None)),
            "[Function (anonymous)]"
        );
    }

    #[test]
    fn test_serialize_all() {
        let args = vec![CapturedValue::text("count"), CapturedValue::Number(3.0)];
        assert_eq!(serialize_all(&args), vec!["count", "3"]);
    }
}

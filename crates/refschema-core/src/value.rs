//! # JSON Data Types, Equality and Rendering
//!
//! JSON has a single number type, but JSON Schema distinguishes `integer`
//! from `number`. Inference here follows the mathematical value: any number
//! without a fractional part is an `integer`, whether it was written `1` or
//! `1.0`. Equality follows the same rule, so `const: 1` accepts `1.0`.
//!
//! Some producers serialize every scalar as a string. To tolerate them,
//! [`data_type_with_hint`] lets the caller say which type it is hoping for;
//! a string that reads as a boolean literal is then reported as `boolean`.

use std::fmt;
use std::str::FromStr;

use serde_json::{Number, Value};

use crate::error::UnknownTypeError;

/// The JSON Schema primitive type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
    Integer,
}

impl DataType {
    /// Every member of the vocabulary, in declaration order.
    pub const ALL: [DataType; 7] = [
        Self::Null,
        Self::Boolean,
        Self::Object,
        Self::Array,
        Self::Number,
        Self::String,
        Self::Integer,
    ];

    /// The keyword spelling of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Number => "number",
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = UnknownTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTypeError(s.to_string()))
    }
}

/// Infer the JSON Schema type of a value.
pub fn data_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) if is_integral(n) => DataType::Integer,
        Value::Number(_) => DataType::Number,
        Value::String(_) => DataType::String,
        Value::Array(_) => DataType::Array,
        Value::Object(_) => DataType::Object,
    }
}

/// Infer the type of a value, leaning towards `hint` where the value allows
/// it.
///
/// - a string under a `boolean` hint is `boolean` when it parses as a
///   boolean literal (see [`parse_bool`]);
/// - an integer under a `number` hint is `number`.
pub fn data_type_with_hint(value: &Value, hint: DataType) -> DataType {
    let inferred = data_type(value);
    match (inferred, hint, value) {
        (DataType::String, DataType::Boolean, Value::String(s)) if parse_bool(s).is_some() => {
            DataType::Boolean
        }
        (DataType::Integer, DataType::Number, _) => DataType::Number,
        _ => inferred,
    }
}

/// Parse the boolean literal forms accepted for textual booleans:
/// `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Deep structural equality with numeric normalization.
///
/// Numbers compare by value (`1 == 1.0`), objects ignore key order, arrays
/// compare element-wise in order.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| values_equal(l, r)))
        }
        _ => false,
    }
}

/// Render a value for inclusion in a validation message: compact JSON with
/// double quotes swapped for single quotes, cut to 17 characters plus `...`
/// when it is longer than 20.
pub fn invalid_value_string(value: &Value) -> String {
    let rendered = value.to_string().replace('"', "'");
    if rendered.chars().count() > 20 {
        let mut short: String = rendered.chars().take(17).collect();
        short.push_str("...");
        short
    } else {
        rendered
    }
}

fn is_integral(n: &Number) -> bool {
    if n.is_i64() || n.is_u64() {
        return true;
    }
    n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

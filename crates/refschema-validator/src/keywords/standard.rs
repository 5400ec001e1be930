//! # Value Assertions — `type`, `const`, `enum`, `required`
//!
//! Leaf keywords: they own no subschemas, so `register` and `resolve` keep
//! their no-op defaults.

use std::fmt;

use refschema_core::{data_type, data_type_with_hint, invalid_value_string, values_equal, DataType};
use serde_json::Value;

use crate::document::{Document, DocumentBuilder};
use crate::error::SchemaError;
use crate::keyword::Keyword;
use crate::validation::{KeyError, ValidationContext};

// ---------------------------------------------------------------------------
// type
// ---------------------------------------------------------------------------

/// `type`: the instance must be of one of the listed types.
///
/// Strings get a second chance against `boolean`: `"true"` and `"0"` count
/// as booleans. Integers always satisfy `number`.
#[derive(Debug, Clone)]
pub struct Type {
    types: Vec<DataType>,
    /// Declared as a bare string rather than an array.
    single: bool,
}

impl Type {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        let parse = |name: &Value| -> Result<DataType, SchemaError> {
            let name = name
                .as_str()
                .ok_or_else(|| builder.invalid("type names must be strings"))?;
            name.parse::<DataType>()
                .map_err(|e| builder.invalid(e.to_string()))
        };
        let keyword = match raw {
            Value::String(_) => Self {
                types: vec![parse(raw)?],
                single: true,
            },
            Value::Array(names) if names.is_empty() => {
                return Err(builder.invalid("type array must not be empty"))
            }
            Value::Array(names) => Self {
                types: names.iter().map(parse).collect::<Result<_, _>>()?,
                single: false,
            },
            _ => return Err(builder.invalid("type must be a string or an array of strings")),
        };
        Ok(Box::new(keyword))
    }

    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    /// True when `instance` satisfies at least one declared type.
    pub fn matches(&self, instance: &Value) -> bool {
        let inferred = data_type(instance);
        self.types.iter().any(|&declared| {
            declared == inferred
                || (declared == DataType::Number && inferred == DataType::Integer)
                || (inferred == DataType::String
                    && matches!(
                        declared,
                        DataType::Boolean | DataType::Number | DataType::Integer
                    )
                    && data_type_with_hint(instance, declared) == declared)
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.types.iter().map(DataType::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl Keyword for Type {
    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        if self.matches(cx.instance()) {
            return Ok(());
        }
        if self.types.len() == 1 {
            cx.add_error(errs, format!("type should be {self}"));
        } else {
            cx.add_error(errs, format!("type should be one of: {self}"));
        }
        Ok(())
    }

    fn to_value(&self, _document: &Document) -> Value {
        if self.single {
            return Value::String(self.types[0].as_str().to_string());
        }
        Value::Array(
            self.types
                .iter()
                .map(|t| Value::String(t.as_str().to_string()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// const
// ---------------------------------------------------------------------------

/// `const`: the instance must equal the value, numbers compared by value.
#[derive(Debug, Clone)]
pub struct Const(Value);

impl Const {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn construct(
        raw: &Value,
        _builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        Ok(Box::new(Self::new(raw.clone())))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl Keyword for Const {
    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        if !values_equal(&self.0, cx.instance()) {
            cx.add_error(errs, format!("must equal {}", invalid_value_string(&self.0)));
        }
        Ok(())
    }

    fn to_value(&self, _document: &Document) -> Value {
        self.0.clone()
    }
}

// ---------------------------------------------------------------------------
// enum
// ---------------------------------------------------------------------------

/// `enum`: the instance must equal one of the listed values.
#[derive(Debug, Clone)]
pub struct Enum(Vec<Value>);

impl Enum {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        match raw {
            Value::Array(values) if values.is_empty() => {
                Err(builder.invalid("enum must list at least one value"))
            }
            Value::Array(values) => Ok(Box::new(Self(values.clone()))),
            _ => Err(builder.invalid("enum must be an array")),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

/// Renders `[c1, c2, ...]` with each value in compact JSON.
impl fmt::Display for Enum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(Value::to_string).collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

impl Keyword for Enum {
    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        let instance = cx.instance();
        if !self.0.iter().any(|v| values_equal(v, instance)) {
            cx.add_error(errs, format!("should be one of {self}"));
        }
        Ok(())
    }

    fn to_value(&self, _document: &Document) -> Value {
        Value::Array(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// required
// ---------------------------------------------------------------------------

/// `required`: listed properties must be present on object instances.
#[derive(Debug, Clone)]
pub struct Required(Vec<String>);

impl Required {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        let Value::Array(names) = raw else {
            return Err(builder.invalid("required must be an array of strings"));
        };
        let names = names
            .iter()
            .map(|n| {
                n.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| builder.invalid("required must be an array of strings"))
            })
            .collect::<Result<_, _>>()?;
        Ok(Box::new(Self(names)))
    }
}

impl Keyword for Required {
    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        let Value::Object(map) = cx.instance() else {
            return Ok(());
        };
        for name in self.0.iter().filter(|n| !map.contains_key(n.as_str())) {
            cx.add_error(errs, format!("\"{name}\" value is required"));
        }
        Ok(())
    }

    fn to_value(&self, _document: &Document) -> Value {
        Value::Array(self.0.iter().cloned().map(Value::String).collect())
    }
}

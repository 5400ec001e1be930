//! Keywords that carry information but never constrain an instance.

use serde_json::Value;

use crate::document::{Document, DocumentBuilder};
use crate::error::SchemaError;
use crate::keyword::Keyword;
use crate::validation::{KeyError, ValidationContext};

/// Annotation keywords known to the standard catalog.
pub const ANNOTATIONS: [&str; 6] = [
    "$schema",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
];

/// An opaque keyword value, kept for serialization only. Also used for keys
/// the catalog does not know.
#[derive(Debug, Clone)]
pub struct Annotation(Value);

impl Annotation {
    pub fn construct(
        raw: &Value,
        _builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        Ok(Box::new(Self(raw.clone())))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl Keyword for Annotation {
    fn validate(
        &self,
        _cx: &mut ValidationContext<'_>,
        _errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        Ok(())
    }

    fn to_value(&self, _document: &Document) -> Value {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::validation::test_support::validate_value;
    use serde_json::json;

    #[test]
    fn annotations_never_fail() {
        let schema = json!({
            "title": "anything",
            "description": "goes",
            "default": 3,
            "x-unknown": {"type": "string"}
        });
        assert!(validate_value(schema, json!(12)).unwrap().is_empty());
    }
}

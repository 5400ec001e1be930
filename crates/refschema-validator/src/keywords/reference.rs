//! # Reference Keywords — `$ref`, `$defs`, `$id`, `$anchor`
//!
//! `$ref` is resolved when the document is linked, not when it is
//! validated. At validation time the keyword only reads its slot and hands
//! the target node to [`ValidationContext::validate_ref`], which switches
//! documents when the target lives elsewhere.

use std::sync::Arc;

use serde_json::{Map, Value};
use url::Url;

use crate::document::{Document, DocumentBuilder, NodeId, RefLocation, RefSlot};
use crate::error::SchemaError;
use crate::keyword::{Keyword, Registrar};
use crate::validation::{KeyError, ValidationContext};

/// `$ref`: evaluate the referenced schema against the same instance.
#[derive(Debug)]
pub struct Ref {
    reference: String,
    slot: Arc<RefSlot>,
}

impl Ref {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        let reference = raw
            .as_str()
            .ok_or_else(|| builder.invalid("$ref must be a string"))?;
        Ok(Box::new(Self {
            reference: reference.to_string(),
            slot: Arc::new(RefSlot::new()),
        }))
    }

    /// The reference as written.
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl Keyword for Ref {
    fn register(&self, uri: Option<&Url>, registrar: &mut Registrar) -> Result<(), SchemaError> {
        let location = RefLocation::parse(&self.reference, uri)?;
        registrar.reference(Arc::clone(&self.slot), location);
        Ok(())
    }

    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        let target = self
            .slot
            .target()
            .ok_or_else(|| SchemaError::UnresolvedReference {
                uri: self.reference.clone(),
            })?;
        cx.validate_ref(target, &self.reference, errs)
    }

    fn to_value(&self, _document: &Document) -> Value {
        Value::String(self.reference.clone())
    }
}

/// `$defs` and `definitions`: named subschemas addressable by pointer.
/// They never validate anything on their own.
#[derive(Debug, Clone)]
pub struct Defs(Vec<(String, NodeId)>);

impl Defs {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        let Value::Object(map) = raw else {
            return Err(builder.invalid("definitions must be an object"));
        };
        let mut defs = Vec::with_capacity(map.len());
        for (name, schema) in map {
            defs.push((name.clone(), builder.child(name, schema)?));
        }
        Ok(Box::new(Self(defs)))
    }
}

impl Keyword for Defs {
    fn register(&self, uri: Option<&Url>, registrar: &mut Registrar) -> Result<(), SchemaError> {
        for (_, node) in &self.0 {
            registrar.subschema(*node, uri);
        }
        Ok(())
    }

    fn resolve(&self, pointer: &[String], document: &Document) -> Option<NodeId> {
        let (name, rest) = pointer.split_first()?;
        let (_, node) = self.0.iter().find(|(n, _)| n == name)?;
        document.descend(*node, rest)
    }

    fn validate(
        &self,
        _cx: &mut ValidationContext<'_>,
        _errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        Ok(())
    }

    fn to_value(&self, document: &Document) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(name, node)| (name.clone(), document.node_value(*node)))
            .collect();
        Value::Object(map)
    }
}

/// `$id` and `$anchor`. The document reads both while computing base URIs;
/// the keyword only checks the value is a string and keeps it.
#[derive(Debug, Clone)]
pub struct Identifier(String);

impl Identifier {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        let value = raw
            .as_str()
            .ok_or_else(|| builder.invalid("identifier must be a string"))?;
        Ok(Box::new(Self(value.to_string())))
    }
}

impl Keyword for Identifier {
    fn validate(
        &self,
        _cx: &mut ValidationContext<'_>,
        _errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        Ok(())
    }

    fn to_value(&self, _document: &Document) -> Value {
        Value::String(self.0.clone())
    }
}

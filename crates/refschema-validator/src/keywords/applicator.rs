//! # Applicators — `allOf`, `anyOf`, `oneOf`, `not`, `properties`, `items`
//!
//! Keywords that apply subschemas, either to the same instance (the logic
//! combinators) or to parts of it (`properties`, `items`). Each owns node ids
//! in the document arena and registers them so that base URIs and anchors
//! inside them are known before linking.

use refschema_core::parse_index;
use serde_json::{Map, Value};
use url::Url;

use crate::document::{Document, DocumentBuilder, NodeId};
use crate::error::SchemaError;
use crate::keyword::{Keyword, Registrar};
use crate::validation::{KeyError, ValidationContext};

fn schema_list(raw: &Value, builder: &mut DocumentBuilder<'_>) -> Result<Vec<NodeId>, SchemaError> {
    let Value::Array(items) = raw else {
        return Err(builder.invalid("expected an array of schemas"));
    };
    if items.is_empty() {
        return Err(builder.invalid("schema array must not be empty"));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, schema)| builder.child(&i.to_string(), schema))
        .collect()
}

fn register_all(nodes: &[NodeId], uri: Option<&Url>, registrar: &mut Registrar) {
    for node in nodes {
        registrar.subschema(*node, uri);
    }
}

fn resolve_index(nodes: &[NodeId], pointer: &[String], document: &Document) -> Option<NodeId> {
    let (index, rest) = pointer.split_first()?;
    let node = *nodes.get(parse_index(index)?)?;
    document.descend(node, rest)
}

fn list_value(nodes: &[NodeId], document: &Document) -> Value {
    Value::Array(nodes.iter().map(|n| document.node_value(*n)).collect())
}

macro_rules! schema_list_keyword {
    ($name:ident) => {
        impl $name {
            pub fn construct(
                raw: &Value,
                builder: &mut DocumentBuilder<'_>,
            ) -> Result<Box<dyn Keyword>, SchemaError> {
                Ok(Box::new(Self(schema_list(raw, builder)?)))
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// `allOf`: every subschema applies; their failures are reported as is.
#[derive(Debug, Clone)]
pub struct AllOf(Vec<NodeId>);

/// `anyOf`: at least one subschema must accept the instance.
#[derive(Debug, Clone)]
pub struct AnyOf(Vec<NodeId>);

/// `oneOf`: exactly one subschema must accept the instance.
#[derive(Debug, Clone)]
pub struct OneOf(Vec<NodeId>);

schema_list_keyword!(AllOf);
schema_list_keyword!(AnyOf);
schema_list_keyword!(OneOf);

impl Keyword for AllOf {
    fn register(&self, uri: Option<&Url>, registrar: &mut Registrar) -> Result<(), SchemaError> {
        register_all(&self.0, uri, registrar);
        Ok(())
    }

    fn resolve(&self, pointer: &[String], document: &Document) -> Option<NodeId> {
        resolve_index(&self.0, pointer, document)
    }

    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        for node in &self.0 {
            cx.validate_node(*node, errs)?;
        }
        Ok(())
    }

    fn to_value(&self, document: &Document) -> Value {
        list_value(&self.0, document)
    }
}

impl Keyword for AnyOf {
    fn register(&self, uri: Option<&Url>, registrar: &mut Registrar) -> Result<(), SchemaError> {
        register_all(&self.0, uri, registrar);
        Ok(())
    }

    fn resolve(&self, pointer: &[String], document: &Document) -> Option<NodeId> {
        resolve_index(&self.0, pointer, document)
    }

    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        for node in &self.0 {
            if cx.is_valid(*node)? {
                return Ok(());
            }
        }
        cx.add_error(errs, "did not match any of the anyOf schemas");
        Ok(())
    }

    fn to_value(&self, document: &Document) -> Value {
        list_value(&self.0, document)
    }
}

impl Keyword for OneOf {
    fn register(&self, uri: Option<&Url>, registrar: &mut Registrar) -> Result<(), SchemaError> {
        register_all(&self.0, uri, registrar);
        Ok(())
    }

    fn resolve(&self, pointer: &[String], document: &Document) -> Option<NodeId> {
        resolve_index(&self.0, pointer, document)
    }

    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        let mut matched = 0;
        for node in &self.0 {
            if cx.is_valid(*node)? {
                matched += 1;
            }
        }
        match matched {
            1 => {}
            0 => cx.add_error(errs, "did not match any of the oneOf schemas"),
            _ => cx.add_error(errs, "matched more than one oneOf schema"),
        }
        Ok(())
    }

    fn to_value(&self, document: &Document) -> Value {
        list_value(&self.0, document)
    }
}

/// `not`: the subschema must reject the instance.
#[derive(Debug, Clone)]
pub struct Not(NodeId);

impl Not {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        Ok(Box::new(Self(builder.subschema(raw)?)))
    }
}

impl Keyword for Not {
    fn register(&self, uri: Option<&Url>, registrar: &mut Registrar) -> Result<(), SchemaError> {
        registrar.subschema(self.0, uri);
        Ok(())
    }

    fn resolve(&self, pointer: &[String], document: &Document) -> Option<NodeId> {
        document.descend(self.0, pointer)
    }

    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        if cx.is_valid(self.0)? {
            cx.add_error(errs, "must not match the not schema");
        }
        Ok(())
    }

    fn to_value(&self, document: &Document) -> Value {
        document.node_value(self.0)
    }
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// `properties`: each listed property present on an object instance is
/// validated against its subschema.
#[derive(Debug, Clone)]
pub struct Properties(Vec<(String, NodeId)>);

impl Properties {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        let Value::Object(map) = raw else {
            return Err(builder.invalid("properties must be an object"));
        };
        let mut properties = Vec::with_capacity(map.len());
        for (name, schema) in map {
            properties.push((name.clone(), builder.child(name, schema)?));
        }
        Ok(Box::new(Self(properties)))
    }
}

impl Keyword for Properties {
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
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        let Value::Object(map) = cx.instance() else {
            return Ok(());
        };
        for (name, node) in &self.0 {
            if let Some(value) = map.get(name) {
                cx.descend(name.as_str(), value).validate_node(*node, errs)?;
            }
        }
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

/// `items`: a single schema for every element, or one schema per position.
#[derive(Debug, Clone)]
pub enum Items {
    Single(NodeId),
    Tuple(Vec<NodeId>),
}

impl Items {
    pub fn construct(
        raw: &Value,
        builder: &mut DocumentBuilder<'_>,
    ) -> Result<Box<dyn Keyword>, SchemaError> {
        let items = match raw {
            Value::Array(schemas) => {
                let mut nodes = Vec::with_capacity(schemas.len());
                for (i, schema) in schemas.iter().enumerate() {
                    nodes.push(builder.child(&i.to_string(), schema)?);
                }
                Self::Tuple(nodes)
            }
            _ => Self::Single(builder.subschema(raw)?),
        };
        Ok(Box::new(items))
    }
}

impl Keyword for Items {
    fn register(&self, uri: Option<&Url>, registrar: &mut Registrar) -> Result<(), SchemaError> {
        match self {
            Self::Single(node) => registrar.subschema(*node, uri),
            Self::Tuple(nodes) => register_all(nodes, uri, registrar),
        }
        Ok(())
    }

    fn resolve(&self, pointer: &[String], document: &Document) -> Option<NodeId> {
        match self {
            Self::Single(node) => document.descend(*node, pointer),
            Self::Tuple(nodes) => resolve_index(nodes, pointer, document),
        }
    }

    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        let Value::Array(elements) = cx.instance() else {
            return Ok(());
        };
        for (i, element) in elements.iter().enumerate() {
            let node = match self {
                Self::Single(node) => *node,
                Self::Tuple(nodes) => match nodes.get(i) {
                    Some(node) => *node,
                    None => break,
                },
            };
            cx.descend(i.to_string(), element).validate_node(node, errs)?;
        }
        Ok(())
    }

    fn to_value(&self, document: &Document) -> Value {
        match self {
            Self::Single(node) => document.node_value(*node),
            Self::Tuple(nodes) => list_value(nodes, document),
        }
    }
}

//! # Keyword Capability
//!
//! Every schema constraint is a [`Keyword`]. A keyword is built once from its
//! raw JSON value by a [`KeywordConstructor`] looked up by name in a
//! [`KeywordCatalog`], and from then on is only reached through the four
//! operations of the trait:
//!
//! 1. **register**: after the whole document is built, announce the
//!    subschemas the keyword owns and any outbound `$ref`s, so the document
//!    can compute base URIs and the registry can link references.
//! 2. **resolve**: descend into the keyword's own structure for a JSON
//!    Pointer fragment such as `#/$defs/foo`.
//! 3. **validate**: check the current instance, appending
//!    [`KeyError`]s. Only structural failures are returned as `Err`.
//! 4. **to_value**: serialize back to JSON without loss.
//!
//! Subschemas are never owned by a keyword directly; they live in the
//! document's node arena and keywords hold [`NodeId`]s. That keeps
//! recursive schemas free of reference cycles.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use url::Url;

use crate::document::{Document, DocumentBuilder, NodeId, RefLocation, RefSlot};
use crate::error::SchemaError;
use crate::validation::{KeyError, ValidationContext};

/// A single schema constraint.
pub trait Keyword: fmt::Debug + Send + Sync {
    /// Announce owned subschemas and outbound references. `uri` is the base
    /// URI in effect for the node holding this keyword.
    fn register(&self, _uri: Option<&Url>, _registrar: &mut Registrar) -> Result<(), SchemaError> {
        Ok(())
    }

    /// Resolve the pointer tokens that follow this keyword's name to a
    /// subschema, if the keyword has one there.
    fn resolve(&self, _pointer: &[String], _document: &Document) -> Option<NodeId> {
        None
    }

    /// Evaluate the constraint against `cx.instance()`.
    fn validate(
        &self,
        cx: &mut ValidationContext<'_>,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError>;

    /// Serialize the keyword value.
    fn to_value(&self, document: &Document) -> Value;
}

/// Builds a keyword from its raw value. Subschemas are compiled through the
/// builder, which also produces located configuration errors.
pub type KeywordConstructor =
    fn(&Value, &mut DocumentBuilder<'_>) -> Result<Box<dyn Keyword>, SchemaError>;

/// Collects what keywords announce during [`Keyword::register`].
#[derive(Debug, Default)]
pub struct Registrar {
    pub(crate) subschemas: Vec<(NodeId, Option<Url>)>,
    pub(crate) references: Vec<(Arc<RefSlot>, RefLocation)>,
}

impl Registrar {
    /// Make `node` addressable and walk it with base URI `uri`.
    pub fn subschema(&mut self, node: NodeId, uri: Option<&Url>) {
        self.subschemas.push((node, uri.cloned()));
    }

    /// Record an outbound reference. The registry fills `slot` when the
    /// document is linked.
    pub fn reference(&mut self, slot: Arc<RefSlot>, location: RefLocation) {
        self.references.push((slot, location));
    }
}

/// Name → constructor table used while compiling documents.
///
/// Keys not present in the catalog are kept as opaque annotations: they are
/// serialized back out but never validated.
#[derive(Clone, Default)]
pub struct KeywordCatalog {
    constructors: HashMap<String, KeywordConstructor>,
}

static STANDARD: OnceLock<Arc<KeywordCatalog>> = OnceLock::new();

impl KeywordCatalog {
    /// A catalog with no keywords at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A fresh copy of the built-in keyword set.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        crate::keywords::register_standard(&mut catalog);
        catalog
    }

    /// The process-wide built-in catalog, built on first use.
    pub fn shared_standard() -> Arc<Self> {
        Arc::clone(STANDARD.get_or_init(|| Arc::new(Self::standard())))
    }

    /// Add or replace a keyword.
    pub fn register(&mut self, name: impl Into<String>, constructor: KeywordConstructor) -> &mut Self {
        self.constructors.insert(name.into(), constructor);
        self
    }

    /// Look up a constructor by keyword name.
    pub fn get(&self, name: &str) -> Option<KeywordConstructor> {
        self.constructors.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered keyword names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for KeywordCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordCatalog")
            .field("keywords", &self.names())
            .finish()
    }
}

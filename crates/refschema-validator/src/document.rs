//! # Schema Documents — Node Arena & Reference Slots
//!
//! A [`Document`] is one compiled JSON Schema resource: either the schema a
//! caller parsed, or a document fetched by URI while linking `$ref`s.
//!
//! ## Storage
//!
//! Every schema and subschema of a document is a [`SchemaNode`] in a flat
//! arena, addressed by [`NodeId`]. Keywords that own subschemas (`allOf`,
//! `properties`, `$defs`, ...) hold node ids instead of boxed children.
//! Recursive schemas (`{"properties": {"next": {"$ref": "#"}}}`) are
//! therefore plain index cycles and need no reference counting.
//!
//! ## Base URIs
//!
//! After the arena is built, a walk from the root calls
//! [`Keyword::register`](crate::keyword::Keyword::register) on every node.
//! `$id` re-bases a node and everything below it; `$anchor` names a node.
//! Both are recorded in the document's anchor table so that fragments and
//! embedded resources resolve locally without a fetch.
//!
//! ## References
//!
//! Each `$ref` owns an [`RefSlot`]. The slot is empty after compilation and
//! is filled exactly once when the owning registry links the document.
//! Targets in other documents are held weakly; the registry cache keeps
//! those documents alive.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use refschema_core::{data_type, JsonPointer};
use serde_json::{Map, Value};
use url::Url;

use crate::error::SchemaError;
use crate::keyword::{Keyword, KeywordCatalog, Registrar};
use crate::keywords::annotation::Annotation;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A schema or subschema: either a boolean schema or a set of keywords.
#[derive(Debug)]
pub struct SchemaNode {
    boolean: Option<bool>,
    keywords: Vec<(String, Box<dyn Keyword>)>,
    declared_id: Option<String>,
    anchor: Option<String>,
    base: Option<Url>,
}

impl SchemaNode {
    /// `Some` for the boolean schemas `true` and `false`.
    pub fn boolean(&self) -> Option<bool> {
        self.boolean
    }

    /// The keyword with the given name, if present.
    pub fn keyword(&self, name: &str) -> Option<&dyn Keyword> {
        self.keywords
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, k)| k.as_ref())
    }

    /// All keywords of the node, in the order the source object lists them.
    pub fn keywords(&self) -> impl Iterator<Item = (&str, &dyn Keyword)> {
        self.keywords.iter().map(|(n, k)| (n.as_str(), k.as_ref()))
    }

    /// The base URI in effect for this node.
    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// The raw `$id` of this node.
    pub fn declared_id(&self) -> Option<&str> {
        self.declared_id.as_deref()
    }

    /// The `$anchor` of this node.
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Where a linked reference points.
#[derive(Debug, Clone)]
pub enum Target {
    /// A node of the same document.
    Local(NodeId),
    /// A node of another document held by the registry.
    External {
        document: Weak<Document>,
        node: NodeId,
    },
}

/// Write-once cell holding a reference's resolved target.
#[derive(Debug, Default)]
pub struct RefSlot {
    target: OnceLock<Target>,
}

impl RefSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolved target, once linked.
    pub fn target(&self) -> Option<&Target> {
        self.target.get()
    }

    /// Fill the slot. If another linker got there first, its target wins and
    /// is returned.
    pub(crate) fn fill(&self, target: Target) -> &Target {
        self.target.get_or_init(|| target)
    }
}

/// An absolute `$ref` location: the resource (without fragment) and the
/// fragment, which is a JSON Pointer, an anchor name or empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefLocation {
    resource: Option<Url>,
    fragment: String,
}

impl RefLocation {
    /// Resolve `reference` against `base`.
    ///
    /// A reference made only of a fragment stays in the current resource. A
    /// relative reference with no base to resolve against is an error.
    pub fn parse(reference: &str, base: Option<&Url>) -> Result<Self, SchemaError> {
        if let Some(fragment) = reference.strip_prefix('#') {
            return Ok(Self {
                resource: base.cloned(),
                fragment: fragment.to_string(),
            });
        }
        let mut url = absolute_uri(reference, base)?;
        let fragment = url.fragment().unwrap_or_default().to_string();
        url.set_fragment(None);
        Ok(Self {
            resource: Some(url),
            fragment,
        })
    }

    /// The resource URI, or `None` for a fragment-only reference in a
    /// document that has no base URI.
    pub fn resource(&self) -> Option<&Url> {
        self.resource.as_ref()
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }
}

impl fmt::Display for RefLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(resource) = &self.resource {
            f.write_str(resource.as_str())?;
        }
        if !self.fragment.is_empty() || self.resource.is_none() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

/// An outbound reference of a document.
#[derive(Debug)]
pub struct Reference {
    owner: NodeId,
    location: RefLocation,
    slot: Arc<RefSlot>,
}

impl Reference {
    /// Node carrying the `$ref` keyword.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn location(&self) -> &RefLocation {
        &self.location
    }

    pub fn slot(&self) -> &RefSlot {
        &self.slot
    }
}

/// Resolve a URI reference to an absolute URI.
pub(crate) fn absolute_uri(reference: &str, base: Option<&Url>) -> Result<Url, SchemaError> {
    match Url::parse(reference) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(reference).map_err(|e| SchemaError::InvalidReference {
                reference: reference.to_string(),
                reason: e.to_string(),
            }),
            None => Err(SchemaError::InvalidReference {
                reference: reference.to_string(),
                reason: "relative reference without a base uri".to_string(),
            }),
        },
        Err(e) => Err(SchemaError::InvalidReference {
            reference: reference.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn anchor_key(base: Option<&Url>, name: &str) -> String {
    format!("{}#{}", base.map(Url::as_str).unwrap_or_default(), name)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Compiles raw JSON into arena nodes. Handed to every
/// [`KeywordConstructor`](crate::keyword::KeywordConstructor).
pub struct DocumentBuilder<'c> {
    catalog: &'c KeywordCatalog,
    nodes: Vec<SchemaNode>,
    location: JsonPointer,
}

impl<'c> DocumentBuilder<'c> {
    fn new(catalog: &'c KeywordCatalog) -> Self {
        Self {
            catalog,
            nodes: Vec::new(),
            location: JsonPointer::root(),
        }
    }

    /// Compile `value` as a schema at the current location.
    pub fn subschema(&mut self, value: &Value) -> Result<NodeId, SchemaError> {
        let node = match value {
            Value::Bool(b) => SchemaNode {
                boolean: Some(*b),
                keywords: Vec::new(),
                declared_id: None,
                anchor: None,
                base: None,
            },
            Value::Object(map) => {
                let mut keywords = Vec::with_capacity(map.len());
                for (name, raw) in map {
                    self.location.push(name.as_str());
                    let construct = self.catalog.get(name).unwrap_or(Annotation::construct);
                    let keyword = construct(raw, self)?;
                    self.location.pop();
                    keywords.push((name.clone(), keyword));
                }
                SchemaNode {
                    boolean: None,
                    keywords,
                    declared_id: map.get("$id").and_then(Value::as_str).map(str::to_string),
                    anchor: map.get("$anchor").and_then(Value::as_str).map(str::to_string),
                    base: None,
                }
            }
            other => {
                return Err(SchemaError::InvalidSchema {
                    location: self.location.to_string(),
                    found: data_type(other),
                })
            }
        };
        self.nodes.push(node);
        Ok(NodeId(self.nodes.len() - 1))
    }

    /// Compile `value` as the subschema under `token` of the current location.
    pub fn child(&mut self, token: &str, value: &Value) -> Result<NodeId, SchemaError> {
        self.location.push(token);
        let id = self.subschema(value)?;
        self.location.pop();
        Ok(id)
    }

    /// Location of the keyword currently being constructed.
    pub fn location(&self) -> &JsonPointer {
        &self.location
    }

    /// A configuration error located at the current keyword.
    pub fn invalid(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidKeyword {
            location: self.location.to_string(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A compiled schema document.
#[derive(Debug)]
pub struct Document {
    id: u64,
    uri: Option<Url>,
    root: NodeId,
    nodes: Vec<SchemaNode>,
    anchors: HashMap<String, NodeId>,
    references: Vec<Reference>,
    by_owner: HashMap<NodeId, usize>,
    linked: AtomicBool,
}

impl Document {
    /// Compile `value` into a document retrieved from `uri`.
    ///
    /// A root `$id` takes precedence over the retrieval URI as the document's
    /// base. References are recorded but not resolved.
    pub fn compile(
        value: &Value,
        uri: Option<Url>,
        catalog: &KeywordCatalog,
    ) -> Result<Self, SchemaError> {
        let mut builder = DocumentBuilder::new(catalog);
        let root = builder.subschema(value)?;
        let mut nodes = builder.nodes;

        let mut anchors = HashMap::new();
        let mut references = Vec::new();
        let mut by_owner = HashMap::new();
        let mut registrar = Registrar::default();
        let mut pending = vec![(root, uri.clone())];

        while let Some((id, inherited)) = pending.pop() {
            let node = &nodes[id.0];
            let base = match node.declared_id.as_deref() {
                // Draft-07 style plain-name id.
                Some(declared) if declared.starts_with('#') => {
                    anchors.insert(anchor_key(inherited.as_ref(), &declared[1..]), id);
                    inherited
                }
                Some(declared) => {
                    let mut resolved = absolute_uri(declared, inherited.as_ref())?;
                    resolved.set_fragment(None);
                    anchors.insert(resolved.as_str().to_string(), id);
                    Some(resolved)
                }
                None => inherited,
            };
            if let Some(name) = node.anchor.as_deref() {
                anchors.insert(anchor_key(base.as_ref(), name), id);
            }
            for (_, keyword) in &node.keywords {
                keyword.register(base.as_ref(), &mut registrar)?;
            }
            for (slot, location) in registrar.references.drain(..) {
                by_owner.insert(id, references.len());
                references.push(Reference {
                    owner: id,
                    location,
                    slot,
                });
            }
            pending.extend(registrar.subschemas.drain(..));
            nodes[id.0].base = base;
        }

        let uri = uri.or_else(|| nodes[root.0].base.clone());
        Ok(Self {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            uri,
            root,
            nodes,
            anchors,
            references,
            by_owner,
            linked: AtomicBool::new(false),
        })
    }

    /// Process-unique identity of this document.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The document's base URI.
    pub fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The node at `id`, or `None` for an id from another document.
    pub fn get(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    /// Ids handed out by this document are always in bounds.
    pub(crate) fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Outbound references, in registration order.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// The reference carried by `node`, if it has a `$ref`.
    pub fn reference_at(&self, node: NodeId) -> Option<&Reference> {
        self.by_owner.get(&node).map(|&i| &self.references[i])
    }

    /// Node registered under an embedded `$id` URI or a `uri#anchor` key.
    pub fn anchor(&self, key: &str) -> Option<NodeId> {
        self.anchors.get(key).copied()
    }

    /// Every embedded resource and anchor of the document.
    pub fn anchors(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.anchors.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Follow pointer tokens from `from` through keyword structure.
    pub fn descend(&self, from: NodeId, pointer: &[String]) -> Option<NodeId> {
        let Some((name, rest)) = pointer.split_first() else {
            return Some(from);
        };
        self.node(from).keyword(name)?.resolve(rest, self)
    }

    /// Apply a URI fragment relative to the resource rooted at `from`.
    ///
    /// An empty fragment is `from` itself, `/...` is a JSON Pointer, anything
    /// else is an anchor name.
    pub fn locate(&self, from: NodeId, fragment: &str) -> Result<Option<NodeId>, SchemaError> {
        if fragment.is_empty() {
            return Ok(Some(from));
        }
        if fragment.starts_with('/') {
            let pointer = JsonPointer::from_fragment(fragment)?;
            return Ok(self.descend(from, pointer.tokens()));
        }
        Ok(self.anchor(&anchor_key(self.node(from).base(), fragment)))
    }

    /// Serialize the whole document.
    pub fn to_value(&self) -> Value {
        self.node_value(self.root)
    }

    /// Serialize the subschema at `id`.
    pub fn node_value(&self, id: NodeId) -> Value {
        let node = self.node(id);
        if let Some(b) = node.boolean {
            return Value::Bool(b);
        }
        let map: Map<String, Value> = node
            .keywords
            .iter()
            .map(|(name, keyword)| (name.clone(), keyword.to_value(self)))
            .collect();
        Value::Object(map)
    }

    pub(crate) fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    pub(crate) fn mark_linked(&self) {
        self.linked.store(true, Ordering::Release);
    }
}

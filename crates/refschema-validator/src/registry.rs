//! # Schema Registry — Document Cache & `$ref` Linking
//!
//! The registry owns every external document reached through `$ref`, keyed
//! by absolute URI without fragment. It resolves a reference in this order:
//!
//! 1. the referring document itself (its own base URI, or a `$id` embedded
//!    in it);
//! 2. a document already in the cache, or a resource embedded in one;
//! 3. a fetch through the registry's [`LoaderRegistry`], after which the
//!    compiled document is cached.
//!
//! Schemas parsed through [`Schema::from_value_in`] and friends are added to
//! the cache under their root `$id` once they link successfully, so later
//! parses in the same registry can refer to them without a fetch.
//!
//! The fragment is then applied: a JSON Pointer descends through keyword
//! structure, a plain name looks up an `$anchor`.
//!
//! ## Cache Semantics
//!
//! Entries are never invalidated. Filling an entry is atomic per URI: the
//! first caller fetches while concurrent callers wait on the same cell, and
//! a failed fetch leaves the entry empty for the next caller to retry.
//!
//! ## Linking
//!
//! [`SchemaRegistry::link`] resolves every reference of a document and of
//! each document it reaches, using a worklist rather than recursion. Each
//! reference slot is filled once. Documents are flagged as linked only when
//! the whole run succeeds, so a failed parse leaves nothing half-trusted.
//! A chain of references that leads back to itself without ever reaching a
//! real constraint is rejected as circular.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;
use url::Url;

use crate::context::Context;
use crate::document::{Document, NodeId, RefLocation, Target};
use crate::error::SchemaError;
use crate::keyword::KeywordCatalog;
use crate::loader::{parse_fetch_uri, LoaderRegistry};
use crate::schema::Schema;

type DocumentCell = Arc<OnceCell<Arc<Document>>>;

/// Cache of external schema documents plus the loaders and keyword catalog
/// used to produce them.
pub struct SchemaRegistry {
    loaders: Arc<LoaderRegistry>,
    catalog: Arc<KeywordCatalog>,
    documents: Mutex<HashMap<String, DocumentCell>>,
    /// Resources embedded in cached documents via `$id`.
    embedded: RwLock<HashMap<String, (Arc<Document>, NodeId)>>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();

impl SchemaRegistry {
    /// A registry with the standard keyword catalog.
    pub fn new(loaders: Arc<LoaderRegistry>) -> Self {
        Self::with_catalog(loaders, KeywordCatalog::shared_standard())
    }

    /// A registry compiling documents with a custom keyword catalog.
    pub fn with_catalog(loaders: Arc<LoaderRegistry>, catalog: Arc<KeywordCatalog>) -> Self {
        Self {
            loaders,
            catalog,
            documents: Mutex::new(HashMap::new()),
            embedded: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry over [`LoaderRegistry::global`].
    pub fn global() -> Arc<Self> {
        Arc::clone(
            GLOBAL_REGISTRY.get_or_init(|| Arc::new(Self::new(LoaderRegistry::global()))),
        )
    }

    /// A fresh registry over a private copy of the global loaders.
    pub fn scoped() -> Self {
        Self::new(Arc::new(LoaderRegistry::global().copy()))
    }

    pub fn loaders(&self) -> &Arc<LoaderRegistry> {
        &self.loaders
    }

    pub fn catalog(&self) -> &Arc<KeywordCatalog> {
        &self.catalog
    }

    /// The cached document for `uri` (fragment ignored), or the document
    /// embedding it.
    pub fn cached(&self, uri: &str) -> Option<Arc<Document>> {
        let key = uri.split('#').next().unwrap_or_default();
        if let Some(document) = self.cached_document(key) {
            return Some(document);
        }
        self.embedded
            .read()
            .get(key)
            .map(|(document, _)| Arc::clone(document))
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.documents
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve an absolute URI, with optional fragment, to a schema.
    pub async fn get(self: &Arc<Self>, ctx: &Context, uri: &str) -> Result<Schema, SchemaError> {
        ctx.check()?;
        let location = RefLocation::parse(uri, None)?;
        let resource = location
            .resource()
            .ok_or_else(|| SchemaError::InvalidReference {
                reference: uri.to_string(),
                reason: "expected an absolute uri".to_string(),
            })?;
        let (document, node) = self.locate(ctx, resource, location.fragment()).await?;
        self.link(ctx, &document).await?;
        Ok(Schema::from_parts(Arc::clone(self), document, node))
    }

    /// Fetch the document at `uri` through this registry's loaders and
    /// compile it as a new schema whose base URI is `uri`. The result is not
    /// cached.
    pub async fn fetch_schema(
        self: &Arc<Self>,
        ctx: &Context,
        uri: &str,
    ) -> Result<Schema, SchemaError> {
        let mut url = parse_fetch_uri(uri)?;
        let value = self.loaders.fetch_url(ctx, &url).await?;
        url.set_fragment(None);
        Schema::compile_in(ctx, Arc::clone(self), &value, Some(url)).await
    }

    // -- resolution ---------------------------------------------------------

    fn cached_document(&self, key: &str) -> Option<Arc<Document>> {
        let cell = self.documents.lock().get(key).cloned()?;
        cell.get().cloned()
    }

    fn embedded_resource(&self, key: &str) -> Option<(Arc<Document>, NodeId)> {
        self.embedded.read().get(key).cloned()
    }

    /// Fetch and compile `resource` once. No linking happens here, so a
    /// document referring back to one still being filled cannot deadlock.
    async fn document(&self, ctx: &Context, resource: &Url) -> Result<Arc<Document>, SchemaError> {
        let key = resource.as_str().to_string();
        let cell = Arc::clone(self.documents.lock().entry(key.clone()).or_default());
        let document = cell
            .get_or_try_init(|| async {
                let value = self.loaders.fetch_url(ctx, resource).await?;
                let document = Arc::new(Document::compile(
                    &value,
                    Some(resource.clone()),
                    &self.catalog,
                )?);
                self.index_embedded(&document);
                tracing::debug!(uri = %key, nodes = document.len(), "cached external schema");
                Ok::<_, SchemaError>(document)
            })
            .await?;
        Ok(Arc::clone(document))
    }

    fn index_embedded(&self, document: &Arc<Document>) {
        let own = document.uri().map(Url::as_str);
        let mut embedded = self.embedded.write();
        for (key, node) in document.anchors() {
            if key.contains('#') || Some(key) == own {
                continue;
            }
            embedded
                .entry(key.to_string())
                .or_insert_with(|| (Arc::clone(document), node));
        }
    }

    /// Make a linked, caller-parsed document addressable by its `$id` and
    /// by the `$id`s embedded in it. A URI that already has a document keeps
    /// it.
    pub(crate) fn publish(&self, document: &Arc<Document>) {
        if let Some(uri) = document.uri() {
            let key = uri.as_str().to_string();
            let cell = Arc::clone(self.documents.lock().entry(key.clone()).or_default());
            if cell.set(Arc::clone(document)).is_ok() {
                tracing::debug!(uri = %key, "registered parsed schema");
            }
        }
        self.index_embedded(document);
    }

    /// Find the node for `resource#fragment` outside any referring document.
    async fn locate(
        &self,
        ctx: &Context,
        resource: &Url,
        fragment: &str,
    ) -> Result<(Arc<Document>, NodeId), SchemaError> {
        let key = resource.as_str();
        let (document, start) = if let Some(document) = self.cached_document(key) {
            tracing::debug!(uri = %key, "schema served from cache");
            let root = document.root();
            (document, root)
        } else if let Some(found) = self.embedded_resource(key) {
            tracing::debug!(uri = %key, "schema served from embedded resource");
            found
        } else {
            let document = self.document(ctx, resource).await?;
            let root = document.root();
            (document, root)
        };
        let node = document
            .locate(start, fragment)?
            .ok_or_else(|| SchemaError::FragmentNotFound {
                uri: key.to_string(),
                fragment: fragment.to_string(),
            })?;
        Ok((document, node))
    }

    async fn resolve(
        &self,
        ctx: &Context,
        document: &Arc<Document>,
        location: &RefLocation,
    ) -> Result<Target, SchemaError> {
        let fragment = location.fragment();
        if let Some(start) = local_start(document, location.resource()) {
            let node = document
                .locate(start, fragment)?
                .ok_or_else(|| SchemaError::FragmentNotFound {
                    uri: location.to_string(),
                    fragment: fragment.to_string(),
                })?;
            return Ok(Target::Local(node));
        }
        let resource = location
            .resource()
            .ok_or_else(|| SchemaError::UnresolvedReference {
                uri: location.to_string(),
            })?;
        let (target, node) = self.locate(ctx, resource, fragment).await?;
        if Arc::ptr_eq(&target, document) {
            return Ok(Target::Local(node));
        }
        Ok(Target::External {
            document: Arc::downgrade(&target),
            node,
        })
    }

    /// Resolve every reference reachable from `root`.
    pub(crate) async fn link(&self, ctx: &Context, root: &Arc<Document>) -> Result<(), SchemaError> {
        let mut pending = vec![Arc::clone(root)];
        let mut seen = HashSet::new();
        let mut visited = Vec::new();

        while let Some(document) = pending.pop() {
            if document.is_linked() || !seen.insert(document.id()) {
                continue;
            }
            for reference in document.references() {
                let target = match reference.slot().target() {
                    Some(target) => target.clone(),
                    None => {
                        let target = self.resolve(ctx, &document, reference.location()).await?;
                        reference.slot().fill(target).clone()
                    }
                };
                if let Target::External { document: next, .. } = target {
                    if let Some(next) = next.upgrade() {
                        pending.push(next);
                    }
                }
            }
            visited.push(document);
        }

        for document in &visited {
            check_chains(document)?;
        }
        for document in &visited {
            document.mark_linked();
        }
        if !visited.is_empty() {
            tracing::debug!(documents = visited.len(), "linked schema references");
        }
        Ok(())
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("loaders", &self.loaders)
            .field("documents", &self.len())
            .finish()
    }
}

/// Where a reference into `resource` starts inside `document`, if it stays
/// in that document.
fn local_start(document: &Document, resource: Option<&Url>) -> Option<NodeId> {
    match resource {
        None => Some(document.root()),
        Some(url) if document.uri() == Some(url) => Some(document.root()),
        Some(url) => document.anchor(url.as_str()),
    }
}

/// Follow each reference through nodes that are themselves bare hops to
/// another reference. Revisiting a node means the chain never reaches a
/// schema.
fn check_chains(document: &Arc<Document>) -> Result<(), SchemaError> {
    for reference in document.references() {
        let mut seen = HashSet::new();
        seen.insert((document.id(), reference.owner()));
        let mut slot_holder = Arc::clone(document);
        let mut current = reference.slot().target().cloned();

        while let Some(target) = current.take() {
            let (holder, node) = match target {
                Target::Local(node) => (Arc::clone(&slot_holder), node),
                Target::External { document, node } => match document.upgrade() {
                    Some(document) => (document, node),
                    None => break,
                },
            };
            if !seen.insert((holder.id(), node)) {
                return Err(SchemaError::CircularReference {
                    uri: reference.location().to_string(),
                });
            }
            current = holder
                .reference_at(node)
                .and_then(|next| next.slot().target().cloned());
            slot_holder = holder;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_with(scheme: &str, documents: Vec<(&'static str, Value)>) -> (Arc<SchemaRegistry>, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let documents: HashMap<String, Value> = documents
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let loaders = LoaderRegistry::new();
        loaders.register(scheme, move |_ctx: Context, uri: Url| {
            counter.fetch_add(1, Ordering::SeqCst);
            let found = documents.get(uri.as_str()).cloned();
            async move { found.ok_or_else(|| LoadError::custom(format!("no document at {uri}"))) }
        });
        (Arc::new(SchemaRegistry::new(Arc::new(loaders))), hits)
    }

    #[tokio::test]
    async fn external_document_is_fetched_once() {
        let (registry, hits) = registry_with(
            "mem",
            vec![("mem://defs/a.json", json!({"$defs": {"n": {"type": "integer"}}}))],
        );
        let ctx = Context::background();
        let source = json!({
            "properties": {
                "x": {"$ref": "mem://defs/a.json#/$defs/n"},
                "y": {"$ref": "mem://defs/a.json#/$defs/n"}
            }
        });
        let schema = Schema::from_value_in(&ctx, Arc::clone(&registry), &source).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.cached("mem://defs/a.json#/$defs/n").is_some());

        let errs = schema.validate(&ctx, &json!({"x": 1, "y": "no"})).unwrap();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].property_path, "/y");
    }

    #[tokio::test]
    async fn relative_refs_resolve_against_fetched_document() {
        let (registry, _) = registry_with(
            "mem",
            vec![
                ("mem://host/dir/a.json", json!({"$ref": "b.json#/$defs/s"})),
                ("mem://host/dir/b.json", json!({"$defs": {"s": {"type": "string"}}})),
            ],
        );
        let ctx = Context::background();
        let schema = registry.get(&ctx, "mem://host/dir/a.json").await.unwrap();
        assert_eq!(schema.validate(&ctx, &json!(1)).unwrap().len(), 1);
        assert!(schema.validate(&ctx, &json!("ok")).unwrap().is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn embedded_id_in_cached_document_avoids_fetch() {
        let (registry, hits) = registry_with(
            "mem",
            vec![(
                "mem://host/bundle.json",
                json!({"$defs": {"item": {"$id": "mem://host/item.json", "type": "boolean"}}}),
            )],
        );
        let ctx = Context::background();
        registry.get(&ctx, "mem://host/bundle.json").await.unwrap();
        let item = registry.get(&ctx, "mem://host/item.json").await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(item.top_level_type(), "boolean");
    }

    #[tokio::test]
    async fn failed_fetch_aborts_parse_and_leaves_cache_empty() {
        let (registry, hits) = registry_with("mem", vec![]);
        let ctx = Context::background();
        let source = json!({"$ref": "mem://missing.json"});
        let err = Schema::from_value_in(&ctx, Arc::clone(&registry), &source).await.unwrap_err();
        assert!(matches!(err, SchemaError::Fetch { .. }));
        assert!(registry.is_empty());

        Schema::from_value_in(&ctx, Arc::clone(&registry), &source).await.unwrap_err();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cross_document_cycle_is_rejected() {
        let (registry, _) = registry_with(
            "cyc",
            vec![
                ("cyc://a", json!({"$ref": "cyc://b"})),
                ("cyc://b", json!({"$ref": "cyc://a"})),
            ],
        );
        let err = Schema::from_value_in(
            &Context::background(),
            registry,
            &json!({"$ref": "cyc://a"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SchemaError::CircularReference { .. }));
    }

    #[tokio::test]
    async fn parsed_schema_is_addressable_by_id() {
        let registry = Arc::new(SchemaRegistry::new(Arc::new(LoaderRegistry::new())));
        let ctx = Context::background();
        Schema::from_value_in(
            &ctx,
            Arc::clone(&registry),
            &json!({
                "$id": "mem://lib/a.json",
                "$defs": {
                    "n": {"type": "integer"},
                    "flag": {"$id": "mem://lib/flag.json", "type": "boolean"}
                }
            }),
        )
        .await
        .unwrap();
        assert_eq!(registry.len(), 1);

        let schema = Schema::from_value_in(
            &ctx,
            Arc::clone(&registry),
            &json!({"properties": {
                "n": {"$ref": "mem://lib/a.json#/$defs/n"},
                "f": {"$ref": "mem://lib/flag.json"}
            }}),
        )
        .await
        .expect("resolved from the registry without a mem loader");
        let errs = schema.validate(&ctx, &json!({"n": "one", "f": 1})).unwrap();
        let paths: Vec<&str> = errs.iter().map(|e| e.property_path.as_str()).collect();
        assert_eq!(paths, ["/n", "/f"]);

        let n = registry.get(&ctx, "mem://lib/a.json#/$defs/n").await.unwrap();
        assert_eq!(n.top_level_type(), "integer");
    }

    #[tokio::test]
    async fn failed_parse_is_not_published() {
        let registry = Arc::new(SchemaRegistry::new(Arc::new(LoaderRegistry::new())));
        let ctx = Context::background();
        let err = Schema::from_value_in(
            &ctx,
            Arc::clone(&registry),
            &json!({"$id": "mem://lib/broken.json", "$ref": "mem://lib/elsewhere.json"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedScheme { .. }));
        assert!(registry.is_empty());
        assert!(registry.cached("mem://lib/broken.json").is_none());
    }

    #[tokio::test]
    async fn get_requires_absolute_uri() {
        let (registry, _) = registry_with("mem", vec![]);
        let err = registry.get(&Context::background(), "#/x").await.unwrap_err();
        assert!(matches!(err, SchemaError::InvalidReference { .. }));
    }
}

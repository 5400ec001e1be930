//! # Schema — Public Parse & Validate Surface
//!
//! A [`Schema`] is a compiled, fully linked schema: a node of a document
//! plus the registry that resolved its references. Parsing is async because
//! linking may fetch external documents; validation is synchronous because
//! every reference is already resolved by then.
//!
//! ## Example
//!
//! ```ignore
//! let ctx = Context::with_timeout(Duration::from_secs(10));
//! let schema = Schema::parse(&ctx, br#"{"type": "string"}"#, ScopePolicy::Scoped).await?;
//! let errs = schema.validate(&ctx, &serde_json::json!(42))?;
//! assert_eq!(errs[0].message, "type should be string");
//! ```

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::context::Context;
use crate::document::{Document, NodeId};
use crate::error::SchemaError;
use crate::registry::SchemaRegistry;
use crate::scope::ScopePolicy;
use crate::validation::{KeyError, ValidationContext};

/// A compiled and linked schema.
#[derive(Debug, Clone)]
pub struct Schema {
    registry: Arc<SchemaRegistry>,
    document: Arc<Document>,
    node: NodeId,
}

impl Schema {
    /// Parse JSON schema text, resolving references through the registry
    /// selected by `policy`.
    pub async fn parse(
        ctx: &Context,
        bytes: &[u8],
        policy: ScopePolicy,
    ) -> Result<Self, SchemaError> {
        Self::parse_in(ctx, policy.registry(), bytes).await
    }

    /// Compile an already decoded schema value.
    pub async fn from_value(
        ctx: &Context,
        value: &Value,
        policy: ScopePolicy,
    ) -> Result<Self, SchemaError> {
        Self::from_value_in(ctx, policy.registry(), value).await
    }

    /// Parse JSON schema text against a specific registry.
    pub async fn parse_in(
        ctx: &Context,
        registry: Arc<SchemaRegistry>,
        bytes: &[u8],
    ) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_slice(bytes).map_err(SchemaError::InvalidJson)?;
        Self::from_value_in(ctx, registry, &value).await
    }

    /// Compile a schema value against a specific registry. Once linked, a
    /// schema with a root `$id` is cached in the registry under that URI.
    pub async fn from_value_in(
        ctx: &Context,
        registry: Arc<SchemaRegistry>,
        value: &Value,
    ) -> Result<Self, SchemaError> {
        let schema = Self::compile_in(ctx, registry, value, None).await?;
        schema.registry.publish(&schema.document);
        Ok(schema)
    }

    pub(crate) async fn compile_in(
        ctx: &Context,
        registry: Arc<SchemaRegistry>,
        value: &Value,
        base: Option<Url>,
    ) -> Result<Self, SchemaError> {
        ctx.check()?;
        let document = Arc::new(Document::compile(value, base, registry.catalog())?);
        registry.link(ctx, &document).await?;
        let node = document.root();
        Ok(Self {
            registry,
            document,
            node,
        })
    }

    pub(crate) fn from_parts(
        registry: Arc<SchemaRegistry>,
        document: Arc<Document>,
        node: NodeId,
    ) -> Self {
        Self {
            registry,
            document,
            node,
        }
    }

    /// Validate `instance`. Non-conformance is returned as `Ok` with one
    /// [`KeyError`] per violation; `Err` means validation itself could not
    /// complete.
    pub fn validate(&self, ctx: &Context, instance: &Value) -> Result<Vec<KeyError>, SchemaError> {
        let mut guard = Default::default();
        let mut cx = ValidationContext::new(
            ctx,
            &self.registry,
            &self.document,
            instance,
            &mut guard,
        );
        let mut errs = Vec::new();
        cx.validate_node(self.node, &mut errs)?;
        Ok(errs)
    }

    /// Decode JSON instance text and validate it.
    pub fn validate_bytes(&self, ctx: &Context, bytes: &[u8]) -> Result<Vec<KeyError>, SchemaError> {
        let instance: Value = serde_json::from_slice(bytes).map_err(SchemaError::InvalidInstance)?;
        self.validate(ctx, &instance)
    }

    /// The registry that resolved this schema's references.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The serialized value of one top-level keyword.
    pub fn keyword_value(&self, name: &str) -> Option<Value> {
        self.document
            .node(self.node)
            .keyword(name)
            .map(|keyword| keyword.to_value(&self.document))
    }

    /// The declared top-level `type`: the name, the names joined with `,`
    /// for a set, or `unknown` when absent.
    pub fn top_level_type(&self) -> String {
        match self.keyword_value("type") {
            Some(Value::String(name)) => name,
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
            _ => "unknown".to_string(),
        }
    }

    /// Serialize the schema back to JSON.
    pub fn to_value(&self) -> Value {
        self.document.node_value(self.node)
    }
}

/// Fetch the document at `uri` with the global loaders and compile it as a
/// schema whose base URI is `uri`.
pub async fn fetch_schema(ctx: &Context, uri: &str) -> Result<Schema, SchemaError> {
    SchemaRegistry::global().fetch_schema(ctx, uri).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoaderRegistry;
    use serde_json::json;

    fn isolated() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::new(Arc::new(LoaderRegistry::new())))
    }

    #[tokio::test]
    async fn parse_rejects_invalid_json() {
        let err = Schema::parse_in(&Context::background(), isolated(), b"{not json")
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn validate_bytes_rejects_invalid_instance() {
        let ctx = Context::background();
        let schema = Schema::parse_in(&ctx, isolated(), b"true").await.unwrap();
        let err = schema.validate_bytes(&ctx, b"[1,").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidInstance(_)));
        assert!(schema.validate_bytes(&ctx, b"[1]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn top_level_type_forms() {
        let ctx = Context::background();
        for (source, expected) in [
            (json!({"type": "object"}), "object"),
            (json!({"type": ["string", "null"]}), "string,null"),
            (json!({"title": "untyped"}), "unknown"),
            (json!(true), "unknown"),
        ] {
            let schema = Schema::from_value_in(&ctx, isolated(), &source).await.unwrap();
            assert_eq!(schema.top_level_type(), expected);
        }
    }

    #[tokio::test]
    async fn keyword_value_and_round_trip() {
        let ctx = Context::background();
        let source = json!({"description": "d", "properties": {"a": {"enum": [1, "x"]}}});
        let schema = Schema::from_value_in(&ctx, isolated(), &source).await.unwrap();
        assert_eq!(schema.keyword_value("description"), Some(json!("d")));
        assert_eq!(schema.keyword_value("missing"), None);
        assert_eq!(schema.to_value(), source);
    }

    #[tokio::test]
    async fn literal_values_serialize_as_written() {
        let ctx = Context::background();
        let source = r#"{"title":"t","const":{"b":1,"a":2.50,"c":1e2},"enum":[{"z":1,"a":2},3]}"#;
        let schema = Schema::parse_in(&ctx, isolated(), source.as_bytes())
            .await
            .unwrap();
        assert_eq!(serde_json::to_string(&schema.to_value()).unwrap(), source);
    }

    #[tokio::test]
    async fn enum_message_renders_members_as_written() {
        let ctx = Context::background();
        let schema = Schema::parse_in(&ctx, isolated(), br#"{"enum":[{"z":1,"a":2},1.50]}"#)
            .await
            .unwrap();
        let errs = schema.validate(&ctx, &json!(0)).unwrap();
        assert_eq!(errs[0].message, r#"should be one of [{"z":1,"a":2}, 1.50]"#);
    }

    #[tokio::test]
    async fn errors_follow_keyword_order() {
        let ctx = Context::background();
        let schema = Schema::parse_in(
            &ctx,
            isolated(),
            br#"{
                "type": "string",
                "const": "x",
                "properties": {"z": {"type": "string"}, "a": {"type": "string"}}
            }"#,
        )
        .await
        .unwrap();
        let errs = schema.validate(&ctx, &json!({"a": 1, "z": 1})).unwrap();
        let rendered: Vec<String> = errs.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            [
                "/: type should be string",
                "/: must equal 'x'",
                "/z: type should be string",
                "/a: type should be string",
            ]
        );
    }

    #[tokio::test]
    async fn canceled_context_refuses_to_parse() {
        let ctx = Context::background();
        ctx.cancel();
        let err = Schema::from_value_in(&ctx, isolated(), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Canceled));
    }
}

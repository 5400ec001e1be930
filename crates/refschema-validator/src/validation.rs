//! # Validation Engine
//!
//! Validation walks the schema node arena and the instance in lock step.
//! A [`ValidationContext`] is the cursor: the instance value under test, its
//! path from the instance root, the document the current node lives in, and
//! the guard set shared by the whole call.
//!
//! ## Error Classes
//!
//! Non-conformance is reported as [`KeyError`]s appended to the caller's
//! list. Traversal always continues, so one call reports every violation.
//! Only structural failures stop a call: cancellation, an expired deadline
//! or a recursion cycle.
//!
//! ## Recursion Guard
//!
//! Following a `$ref` records `(document, node, instance path)`. Reaching the
//! same entry again before it is left means the schema recurses without
//! consuming any of the instance (`{"allOf": [{"$ref": "#"}]}`), which would
//! never terminate. That is reported as [`SchemaError::CircularReference`].
//! Recursion that moves deeper into the instance, such as a tree schema, is
//! unaffected.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use refschema_core::JsonPointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::document::{Document, NodeId, Target};
use crate::error::SchemaError;
use crate::registry::SchemaRegistry;

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyError {
    /// Pointer to the failing instance location; the root is `/`.
    pub property_path: String,
    /// The value found at that location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_value: Option<Value>,
    pub message: String,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property_path, self.message)
    }
}

pub(crate) type GuardKey = (u64, NodeId, JsonPointer);

/// Cursor over a schema node and an instance location.
pub struct ValidationContext<'a> {
    ctx: &'a Context,
    registry: &'a SchemaRegistry,
    document: &'a Document,
    instance: &'a Value,
    path: JsonPointer,
    guard: &'a mut HashSet<GuardKey>,
}

impl<'a> ValidationContext<'a> {
    pub(crate) fn new(
        ctx: &'a Context,
        registry: &'a SchemaRegistry,
        document: &'a Document,
        instance: &'a Value,
        guard: &'a mut HashSet<GuardKey>,
    ) -> Self {
        Self {
            ctx,
            registry,
            document,
            instance,
            path: JsonPointer::root(),
            guard,
        }
    }

    /// The instance value at the current location.
    pub fn instance(&self) -> &'a Value {
        self.instance
    }

    /// The current instance location.
    pub fn path(&self) -> &JsonPointer {
        &self.path
    }

    /// The document holding the node being evaluated.
    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// The caller's context.
    pub fn context(&self) -> &'a Context {
        self.ctx
    }

    /// A failure at the current location.
    pub fn error(&self, message: impl Into<String>) -> KeyError {
        KeyError {
            property_path: if self.path.is_root() {
                "/".to_string()
            } else {
                self.path.to_string()
            },
            invalid_value: Some(self.instance.clone()),
            message: message.into(),
        }
    }

    /// Append a failure at the current location to `errs`.
    pub fn add_error(&self, errs: &mut Vec<KeyError>, message: impl Into<String>) {
        errs.push(self.error(message));
    }

    /// A context for `instance`, found under `token` of the current
    /// location, in the same document.
    pub fn descend<'b>(
        &'b mut self,
        token: impl Into<String>,
        instance: &'b Value,
    ) -> ValidationContext<'b> {
        ValidationContext {
            ctx: self.ctx,
            registry: self.registry,
            document: self.document,
            instance,
            path: self.path.child(token),
            guard: &mut *self.guard,
        }
    }

    /// Run every keyword of `node` against the current instance.
    pub fn validate_node(
        &mut self,
        node: NodeId,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        self.ctx.check()?;
        let document = self.document;
        let schema = document.node(node);
        if let Some(allowed) = schema.boolean() {
            if !allowed {
                self.add_error(errs, "schema always fails validation");
            }
            return Ok(());
        }
        for (name, keyword) in schema.keywords() {
            tracing::debug!(keyword = name, path = %self.path, "validating keyword");
            keyword.validate(self, errs)?;
        }
        Ok(())
    }

    /// True when `node` accepts the current instance. Failures are
    /// discarded.
    pub fn is_valid(&mut self, node: NodeId) -> Result<bool, SchemaError> {
        let mut scratch = Vec::new();
        self.validate_node(node, &mut scratch)?;
        Ok(scratch.is_empty())
    }

    /// Evaluate a linked reference target against the current instance.
    /// `reference` names the `$ref` in errors.
    pub fn validate_ref(
        &mut self,
        target: &Target,
        reference: &str,
        errs: &mut Vec<KeyError>,
    ) -> Result<(), SchemaError> {
        let held: Arc<Document>;
        let (document, node) = match target {
            Target::Local(node) => (self.document, *node),
            Target::External { document, node } => {
                held = document
                    .upgrade()
                    .ok_or_else(|| SchemaError::UnresolvedReference {
                        uri: reference.to_string(),
                    })?;
                (&*held, *node)
            }
        };

        let key = (document.id(), node, self.path.clone());
        if !self.guard.insert(key.clone()) {
            return Err(SchemaError::CircularReference {
                uri: reference.to_string(),
            });
        }
        let mut next = ValidationContext {
            ctx: self.ctx,
            registry: self.registry,
            document,
            instance: self.instance,
            path: self.path.clone(),
            guard: &mut *self.guard,
        };
        let result = next.validate_node(node, errs);
        self.guard.remove(&key);
        result
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::Value;

    use super::KeyError;
    use crate::context::Context;
    use crate::error::SchemaError;
    use crate::loader::LoaderRegistry;
    use crate::registry::SchemaRegistry;
    use crate::schema::Schema;

    /// Compile `schema` in an isolated registry with no loaders and validate
    /// `instance` against it.
    pub(crate) fn validate_value(schema: Value, instance: Value) -> Result<Vec<KeyError>, SchemaError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let registry = Arc::new(SchemaRegistry::new(Arc::new(LoaderRegistry::new())));
        let ctx = Context::background();
        let schema = runtime.block_on(Schema::from_value_in(&ctx, registry, &schema))?;
        schema.validate(&ctx, &instance)
    }

    /// Messages of `validate_value`, panicking on structural errors.
    pub(crate) fn messages(schema: Value, instance: Value) -> Vec<String> {
        validate_value(schema, instance)
            .expect("validation")
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }
}

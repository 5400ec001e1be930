//! Registry scoping.
//!
//! By default every parse shares the global schema and loader registries, so
//! an external document is fetched once per process and later parses see the
//! cached copy even if the remote changed. [`ScopePolicy::Scoped`] gives a
//! parse its own schema registry over a private copy of the global loaders:
//! it fetches afresh, and loaders registered on it stay local to it.

use std::sync::Arc;

use crate::registry::SchemaRegistry;

/// Which registries a parse resolves references through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ScopePolicy {
    /// The global schema registry and global loaders.
    #[default]
    Unscoped,
    /// A fresh schema registry over a copy of the global loaders.
    Scoped,
}

impl ScopePolicy {
    /// The registry a parse under this policy uses. `Scoped` returns a new
    /// registry on every call.
    pub fn registry(self) -> Arc<SchemaRegistry> {
        match self {
            Self::Unscoped => SchemaRegistry::global(),
            Self::Scoped => Arc::new(SchemaRegistry::scoped()),
        }
    }

    pub fn is_scoped(self) -> bool {
        self == Self::Scoped
    }
}

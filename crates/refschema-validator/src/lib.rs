//! # refschema-validator — `$ref`-Resolving JSON Schema Engine
//!
//! Compiles JSON Schema documents, links their `$ref`s across local, file
//! and remote documents, and validates JSON instances against the result.
//!
//! ## Architecture
//!
//! ```text
//!  Schema::parse ──► Document::compile ──► SchemaRegistry::link ──► Schema
//!                        │                        │
//!                 KeywordCatalog           LoaderRegistry (http, https, file, custom)
//!
//!  Schema::validate ──► ValidationContext ──► Keyword::validate ──► Vec<KeyError>
//! ```
//!
//! - [`keyword`]: the keyword contract and the name → constructor catalog.
//! - [`keywords`]: the built-in keywords.
//! - [`document`]: compiled documents as node arenas, base URIs, anchors
//!   and reference slots.
//! - [`loader`]: per-scheme document loaders.
//! - [`registry`]: the document cache and reference linker.
//! - [`scope`]: global versus per-parse registries.
//! - [`validation`]: the validation cursor and [`KeyError`].
//! - [`schema`]: the public [`Schema`] handle.
//!
//! ## Errors
//!
//! Parse and validate calls return `Result<_, SchemaError>`. A validate call
//! that completes returns every violation as a [`KeyError`]; only
//! cancellation, deadlines and recursion cycles abort it.
//!
//! ## Logging
//!
//! The crate emits `tracing` events and installs no subscriber.

pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod keyword;
pub mod keywords;
pub mod loader;
pub mod registry;
pub mod schema;
pub mod scope;
pub mod validation;

pub use config::FetchConfig;
pub use context::Context;
pub use document::{Document, NodeId, SchemaNode};
pub use error::{LoadError, SchemaError};
pub use keyword::{Keyword, KeywordCatalog, KeywordConstructor, Registrar};
pub use loader::{FileLoader, HttpLoader, LoadFuture, Loader, LoaderRegistry};
pub use registry::SchemaRegistry;
pub use schema::{fetch_schema, Schema};
pub use scope::ScopePolicy;
pub use validation::{KeyError, ValidationContext};

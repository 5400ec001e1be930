//! # Error Types
//!
//! Two disjoint classes of failure come out of this crate:
//!
//! - [`SchemaError`]: the schema, the network or the caller's deadline is
//!   broken. Parsing or validation stops and the error is returned as the
//!   `Err` side of the call.
//! - [`KeyError`](crate::validation::KeyError): the data does not conform.
//!   These are collected into the `Ok` side of a validate call and never
//!   stop traversal.
//!
//! [`LoadError`] is the error a [`Loader`](crate::loader::Loader) reports;
//! the registry wraps it in [`SchemaError::Fetch`] together with the URI.

use refschema_core::PointerError;
use thiserror::Error;

/// A structural, configuration or fetch failure.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema document is not valid JSON.
    #[error("invalid schema json: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The instance document is not valid JSON.
    #[error("invalid instance json: {0}")]
    InvalidInstance(#[source] serde_json::Error),

    /// A schema (or subschema) is neither an object nor a boolean.
    #[error("schema at \"{location}\" must be an object or a boolean, found {found}")]
    InvalidSchema {
        /// Pointer to the offending subschema within its document.
        location: String,
        /// Type that was found instead.
        found: refschema_core::DataType,
    },

    /// A keyword value could not be parsed.
    #[error("invalid keyword at \"{location}\": {reason}")]
    InvalidKeyword {
        /// Pointer to the keyword within its document.
        location: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A URI or `$ref` value could not be turned into an absolute location.
    #[error("invalid reference \"{reference}\": {reason}")]
    InvalidReference {
        /// The reference as written.
        reference: String,
        /// Why it could not be resolved.
        reason: String,
    },

    /// The URI has no scheme, or no loader is registered for its scheme.
    #[error("{scheme} is not supported for uri: {uri}")]
    UnsupportedScheme {
        /// Scheme extracted from the URI (empty when absent).
        scheme: String,
        /// The full URI.
        uri: String,
    },

    /// A loader failed to produce a document.
    #[error("failed to load {uri}: {source}")]
    Fetch {
        /// URI that was being fetched.
        uri: String,
        /// The loader's error.
        #[source]
        source: LoadError,
    },

    /// A reference fragment names nothing inside the target document.
    #[error("\"{fragment}\" does not resolve to a schema in {uri}")]
    FragmentNotFound {
        /// Document the fragment was applied to.
        uri: String,
        /// The fragment as written.
        fragment: String,
    },

    /// A `$ref` chain or a recursive evaluation revisits itself.
    #[error("circular reference: {uri}")]
    CircularReference {
        /// The reference that closed the cycle.
        uri: String,
    },

    /// A `$ref` was reached before its target was linked.
    #[error("unresolved reference: {uri}")]
    UnresolvedReference {
        /// The reference as written.
        uri: String,
    },

    /// The caller canceled the operation.
    #[error("operation canceled")]
    Canceled,

    /// The caller's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A malformed JSON Pointer.
    #[error(transparent)]
    Pointer(#[from] PointerError),
}

/// Failure reported by a loader while producing a schema document.
#[derive(Error, Debug)]
pub enum LoadError {
    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The file does not exist.
    #[error("{path}: no such file or directory")]
    NotFound {
        /// Local path derived from the URI.
        path: String,
    },

    /// Any other I/O failure.
    #[error("io error reading {path}: {source}")]
    Io {
        /// Local path derived from the URI.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The fetched bytes are not a valid schema document.
    #[error("malformed schema document: {0}")]
    Malformed(String),

    /// The URI cannot be handled by this loader.
    #[error("unusable uri: {0}")]
    InvalidUri(String),

    /// Failure from a caller-provided loader.
    #[error("{0}")]
    Custom(String),

    /// The caller canceled the fetch.
    #[error("fetch canceled")]
    Canceled,

    /// The caller's deadline passed while fetching.
    #[error("fetch deadline exceeded")]
    DeadlineExceeded,
}

impl LoadError {
    /// Wrap an arbitrary displayable failure from a custom loader.
    pub fn custom(reason: impl std::fmt::Display) -> Self {
        Self::Custom(reason.to_string())
    }
}

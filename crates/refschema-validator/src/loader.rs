//! # Loader Registry — Scheme-Keyed Document Fetching
//!
//! A [`Loader`] turns an absolute URI into a raw schema document. Loaders are
//! registered per URI scheme in a [`LoaderRegistry`]; the schema registry
//! asks it for every external document a `$ref` reaches.
//!
//! ## Built-in Loaders
//!
//! | Scheme | Loader | Notes |
//! |---|---|---|
//! | `http`, `https` | [`HttpLoader`] | `reqwest`; non-2xx is an error |
//! | `file` | [`FileLoader`] | `tokio::fs`; `.yaml`/`.yml` parsed as YAML |
//!
//! ## Scoping
//!
//! [`LoaderRegistry::global`] is the process-wide registry. A scoped schema
//! registry works on a [`copy`](LoaderRegistry::copy) of it, so loaders
//! registered on the copy are invisible to everyone else.
//!
//! ## Custom Loaders
//!
//! Any `Fn(Context, Url) -> impl Future<Output = Result<Value, LoadError>>`
//! is a loader:
//!
//! ```ignore
//! registry.register("mem", |_ctx: Context, uri: Url| async move {
//!     Ok::<_, LoadError>(serde_json::json!({"$id": uri.as_str(), "type": "string"}))
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;
use url::Url;

use crate::config::FetchConfig;
use crate::context::Context;
use crate::error::{LoadError, SchemaError};

/// Boxed future returned by [`Loader::load`].
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Value, LoadError>> + Send + 'static>>;

/// Produces the schema document found at a URI.
pub trait Loader: Send + Sync {
    /// Load the document at `uri`. The registry enforces the context's
    /// cancellation and deadline around the returned future.
    fn load(&self, ctx: &Context, uri: &Url) -> LoadFuture;
}

impl<F, Fut> Loader for F
where
    F: Fn(Context, Url) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, LoadError>> + Send + 'static,
{
    fn load(&self, ctx: &Context, uri: &Url) -> LoadFuture {
        Box::pin(self(ctx.clone(), uri.clone()))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Scheme → loader table.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: RwLock<HashMap<String, Arc<dyn Loader>>>,
}

static GLOBAL_LOADERS: OnceLock<Arc<LoaderRegistry>> = OnceLock::new();

impl LoaderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `http`, `https` and `file` loaders installed.
    pub fn with_defaults(config: &FetchConfig) -> Self {
        let registry = Self::new();
        match HttpLoader::new(config) {
            Ok(http) => {
                let http: Arc<dyn Loader> = Arc::new(http);
                registry.register_arc("http", Arc::clone(&http));
                registry.register_arc("https", http);
            }
            Err(e) => {
                tracing::warn!(error = %e, "http loader unavailable; http and https refs will fail");
            }
        }
        registry.register("file", FileLoader);
        registry
    }

    /// The process-wide registry, built from [`FetchConfig::from_env`] on
    /// first use.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_LOADERS.get_or_init(|| {
            Arc::new(Self::with_defaults(&FetchConfig::from_env()))
        }))
    }

    /// Register `loader` for `scheme`, replacing any previous one.
    pub fn register(&self, scheme: impl AsRef<str>, loader: impl Loader + 'static) {
        self.register_arc(scheme, Arc::new(loader));
    }

    /// Register a shared loader for `scheme`, replacing any previous one.
    pub fn register_arc(&self, scheme: impl AsRef<str>, loader: Arc<dyn Loader>) {
        self.loaders
            .write()
            .insert(scheme.as_ref().to_ascii_lowercase(), loader);
    }

    /// The loader for `scheme`, if one is registered.
    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Loader>> {
        self.loaders.read().get(&scheme.to_ascii_lowercase()).cloned()
    }

    /// An independent registry with the same entries. Later registrations
    /// on either side do not affect the other.
    pub fn copy(&self) -> Self {
        Self {
            loaders: RwLock::new(self.loaders.read().clone()),
        }
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.loaders.read().keys().cloned().collect();
        schemes.sort_unstable();
        schemes
    }

    /// Fetch the document at `uri`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnsupportedScheme`] when `uri` has no scheme or no
    /// loader handles it; [`SchemaError::Fetch`] when the loader fails or the
    /// context is canceled or expires first.
    pub async fn fetch(&self, ctx: &Context, uri: &str) -> Result<Value, SchemaError> {
        let url = parse_fetch_uri(uri)?;
        self.fetch_url(ctx, &url).await
    }

    /// Fetch the document at an already parsed URI.
    pub async fn fetch_url(&self, ctx: &Context, uri: &Url) -> Result<Value, SchemaError> {
        let loader = self
            .get(uri.scheme())
            .ok_or_else(|| SchemaError::UnsupportedScheme {
                scheme: uri.scheme().to_string(),
                uri: uri.to_string(),
            })?;
        tracing::debug!(uri = %uri, "fetching schema document");
        ctx.run(loader.load(ctx, uri))
            .await
            .map_err(|source| SchemaError::Fetch {
                uri: uri.to_string(),
                source,
            })
    }
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

/// Parse a URI handed to a fetch. A relative URI has an empty scheme, which
/// no loader handles.
pub(crate) fn parse_fetch_uri(uri: &str) -> Result<Url, SchemaError> {
    match Url::parse(uri) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Err(SchemaError::UnsupportedScheme {
            scheme: String::new(),
            uri: uri.to_string(),
        }),
        Err(e) => Err(SchemaError::InvalidReference {
            reference: uri.to_string(),
            reason: e.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Built-in loaders
// ---------------------------------------------------------------------------

/// Fetches `http` and `https` documents.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    /// Build a loader with its own client.
    pub fn new(config: &FetchConfig) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            // Callers may fetch from several runtimes over the process
            // lifetime; pooled connections are bound to the one that opened
            // them.
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Loader for HttpLoader {
    fn load(&self, _ctx: &Context, uri: &Url) -> LoadFuture {
        let client = self.client.clone();
        let uri = uri.clone();
        Box::pin(async move {
            let response = client.get(uri).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::Status {
                    status: status.as_u16(),
                    body: status_body(response.text().await),
                });
            }
            let bytes = response.bytes().await?;
            parse_document(&bytes, DocumentFormat::Json)
        })
    }
}

/// Body text of a non-2xx response; a read failure is kept in place of it.
fn status_body<E: std::fmt::Display>(read: Result<String, E>) -> String {
    read.unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

/// Reads `file` documents from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl Loader for FileLoader {
    fn load(&self, _ctx: &Context, uri: &Url) -> LoadFuture {
        let uri = uri.clone();
        Box::pin(async move {
            let path = uri
                .to_file_path()
                .map_err(|()| LoadError::InvalidUri(uri.to_string()))?;
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                let shown = path.display().to_string();
                if e.kind() == std::io::ErrorKind::NotFound {
                    LoadError::NotFound { path: shown }
                } else {
                    LoadError::Io {
                        path: shown,
                        source: e,
                    }
                }
            })?;
            parse_document(&bytes, DocumentFormat::from_path(&path))
        })
    }
}

// ---------------------------------------------------------------------------
// Document formats
// ---------------------------------------------------------------------------

/// Serialization of a fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// YAML for `.yaml` and `.yml`, JSON otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Decode fetched bytes into a JSON value.
pub fn parse_document(bytes: &[u8], format: DocumentFormat) -> Result<Value, LoadError> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_slice(bytes).map_err(|e| LoadError::Malformed(e.to_string()))
        }
        DocumentFormat::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_slice(bytes)
                .map_err(|e| LoadError::Malformed(format!("invalid YAML: {e}")))?;
            yaml_to_json(&yaml).map_err(LoadError::Malformed)
        }
    }
}

/// Map a YAML tree onto JSON. Tags are dropped; scalar map keys become
/// their string form.
fn yaml_to_json(yaml: &serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                let f = n.as_f64().ok_or_else(|| format!("unsupported number {n}"))?;
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("{f} has no JSON representation"))?
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => {
            Value::Array(items.iter().map(yaml_to_json).collect::<Result<_, _>>()?)
        }
        Yaml::Mapping(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let key = match key {
                    Yaml::String(s) => s.clone(),
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => return Err(format!("map key {other:?} is not a scalar")),
                };
                object.insert(key, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value)?,
    })
}

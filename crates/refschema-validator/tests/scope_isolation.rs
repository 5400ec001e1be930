//! # Integration Tests for Registry Scoping
//!
//! A schema references a remote document whose content changes between two
//! parses. Under the global registry the second parse is served the cached
//! first version; under a scoped registry each parse fetches afresh. A
//! loader registered on a scoped registry must never leak into the global
//! loaders.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use refschema_validator::{
    Context, LoadError, LoaderRegistry, Schema, SchemaRegistry, ScopePolicy,
};
use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const INTEGER_DEFS: &str = r#"{"$defs": {"foo": {"type": "integer"}}}"#;
const STRING_DEFS: &str = r#"{"$defs": {"foo": {"type": "string"}}}"#;

/// Serves a body that the test can swap, counting requests.
#[derive(Clone)]
struct SwitchableSchema {
    body: Arc<Mutex<String>>,
    hits: Arc<AtomicUsize>,
}

impl SwitchableSchema {
    fn new(body: &str) -> Self {
        Self {
            body: Arc::new(Mutex::new(body.to_string())),
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set(&self, body: &str) {
        *self.body.lock() = body.to_string();
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Respond for SwitchableSchema {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.hits.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/json")
            .set_body_string(self.body.lock().clone())
    }
}

async fn serve(remote: &SwitchableSchema) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/valid_schema.json"))
        .respond_with(remote.clone())
        .mount(&server)
        .await;
    server
}

fn referencing(server: &MockServer) -> Value {
    json!({"allOf": [{"$ref": format!("{}/valid_schema.json#/$defs/foo", server.uri())}]})
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unscoped_parses_share_the_first_fetch() {
    let remote = SwitchableSchema::new(INTEGER_DEFS);
    let server = serve(&remote).await;
    let source = referencing(&server);
    let ctx = Context::background();

    let first = Schema::from_value(&ctx, &source, ScopePolicy::Unscoped)
        .await
        .expect("first parse");
    assert!(first.validate(&ctx, &json!(1)).unwrap().is_empty());

    remote.set(STRING_DEFS);
    let second = Schema::from_value(&ctx, &source, ScopePolicy::Unscoped)
        .await
        .expect("second parse");

    // Still the cached integer definition.
    let errs = second.validate(&ctx, &json!("1")).unwrap();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].message, "type should be integer");
    assert!(second.validate(&ctx, &json!(1)).unwrap().is_empty());
    assert_eq!(remote.hits(), 1);
    assert!(Arc::ptr_eq(first.registry(), &SchemaRegistry::global()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scoped_parses_fetch_fresh_content() {
    let remote = SwitchableSchema::new(INTEGER_DEFS);
    let server = serve(&remote).await;
    let source = referencing(&server);
    let ctx = Context::background();

    let first = Schema::from_value(&ctx, &source, ScopePolicy::Scoped)
        .await
        .expect("first parse");
    assert!(first.validate(&ctx, &json!(1)).unwrap().is_empty());

    remote.set(STRING_DEFS);
    let second = Schema::from_value(&ctx, &source, ScopePolicy::Scoped)
        .await
        .expect("second parse");

    assert!(second.validate(&ctx, &json!("1")).unwrap().is_empty());
    assert_eq!(second.validate(&ctx, &json!(1)).unwrap().len(), 1);
    // The first schema keeps the document it was linked against.
    assert!(first.validate(&ctx, &json!(1)).unwrap().is_empty());
    assert_eq!(remote.hits(), 2);
    assert!(!Arc::ptr_eq(first.registry(), second.registry()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scoped_loader_override_does_not_leak() {
    let global_hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&global_hits);
    LoaderRegistry::global().register("scope-override", move |_ctx: Context, _uri: Url| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, LoadError>(json!({"$defs": {"foo": {"type": "string"}}})) }
    });

    let source = br#"{"allOf": [{"$ref": "scope-override:///valid_schema.json#/$defs/foo"}]}"#;
    let ctx = Context::background();

    let registry = ScopePolicy::Scoped.registry();
    registry
        .loaders()
        .register("scope-override", |_ctx: Context, _uri: Url| async {
            Ok::<_, LoadError>(json!({"$defs": {"foo": {"type": "integer"}}}))
        });
    let local = Schema::parse_in(&ctx, registry, source).await.expect("scoped parse");
    assert!(local.validate(&ctx, &json!(1)).unwrap().is_empty());
    assert_eq!(global_hits.load(Ordering::SeqCst), 0);

    let fresh = Schema::parse(&ctx, source, ScopePolicy::Scoped)
        .await
        .expect("fresh scoped parse");
    assert!(fresh.validate(&ctx, &json!("1")).unwrap().is_empty());
    assert_eq!(global_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_fetches_once() {
    let remote = SwitchableSchema::new(INTEGER_DEFS);
    let server = serve(&remote).await;
    let source = Arc::new(referencing(&server));
    let registry = ScopePolicy::Scoped.registry();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let source = Arc::clone(&source);
        tasks.push(tokio::spawn(async move {
            let ctx = Context::background();
            let schema = Schema::from_value_in(&ctx, registry, &source).await?;
            schema.validate(&ctx, &json!(7))
        }));
    }
    for task in tasks {
        let errs = task.await.expect("join").expect("parse and validate");
        assert!(errs.is_empty());
    }
    assert_eq!(remote.hits(), 1);
    assert_eq!(registry.len(), 1);
}

//! # Integration Tests for Schema Fetching
//!
//! Exercises `fetch_schema` against every built-in loader (wiremock for
//! `http`, tempfile fixtures for `file`), custom loaders registered on the
//! global registry, and the context's deadline and cancellation.

use std::io::Write;
use std::time::Duration;

use refschema_validator::{
    fetch_schema, Context, LoadError, LoaderRegistry, SchemaError, SchemaRegistry,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VALID_SCHEMA: &str = r#"{
    "$schema": "https://json-schema.org/draft/2020-12/schema",
    "title": "Person",
    "description": "A person record",
    "type": "object",
    "properties": {
        "name": {"type": "string"},
        "age": {"type": "integer"}
    },
    "required": ["name"]
}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── http ────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_valid_schema() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/valid_schema.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VALID_SCHEMA))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = Context::background();
    let uri = format!("{}/valid_schema.json", server.uri());
    let schema = fetch_schema(&ctx, &uri).await.expect("fetch");

    assert_eq!(schema.top_level_type(), "object");
    assert_eq!(schema.keyword_value("title"), Some(json!("Person")));
    let errs = schema.validate(&ctx, &json!({"age": "old"})).unwrap();
    let rendered: Vec<String> = errs.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec!["/age: type should be integer", "/: \"name\" value is required"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_invalid_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invalid_schema.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid_schema\n"))
        .mount(&server)
        .await;

    let uri = format!("{}/invalid_schema.json", server.uri());
    let err = fetch_schema(&Context::background(), &uri).await.unwrap_err();
    match err {
        SchemaError::Fetch { uri: failed, source } => {
            assert_eq!(failed, uri);
            assert!(matches!(source, LoadError::Malformed(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.json"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let uri = format!("{}/gone.json", server.uri());
    let err = fetch_schema(&Context::background(), &uri).await.unwrap_err();
    match err {
        SchemaError::Fetch {
            source: LoadError::Status { status, body },
            ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(body, "not here");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_deadline_exceeded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(VALID_SCHEMA)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let ctx = Context::with_timeout(Duration::from_millis(100));
    let uri = format!("{}/slow.json", server.uri());
    let err = fetch_schema(&ctx, &uri).await.unwrap_err();
    assert!(matches!(
        err,
        SchemaError::Fetch {
            source: LoadError::DeadlineExceeded,
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_canceled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(VALID_SCHEMA)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let ctx = Context::background();
    let canceler = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceler.cancel();
    });
    let uri = format!("{}/slow.json", server.uri());
    let err = fetch_schema(&ctx, &uri).await.unwrap_err();
    assert!(matches!(
        err,
        SchemaError::Fetch {
            source: LoadError::Canceled,
            ..
        }
    ));
}

// ── file ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn file_valid_schema() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("tempfile");
    file.write_all(VALID_SCHEMA.as_bytes()).expect("write");

    let uri = Url::from_file_path(file.path()).expect("file uri");
    let schema = fetch_schema(&Context::background(), uri.as_str())
        .await
        .expect("fetch");
    assert_eq!(schema.top_level_type(), "object");
    assert_eq!(schema.document().uri(), Some(&uri));
}

#[tokio::test]
async fn file_yaml_schema_with_relative_ref() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("main.yaml"),
        "type: object\nproperties:\n  id:\n    $ref: defs.json#/$defs/id\n",
    )
    .expect("write main");
    std::fs::write(
        dir.path().join("defs.json"),
        r#"{"$defs": {"id": {"type": "string"}}}"#,
    )
    .expect("write defs");

    let ctx = Context::background();
    let uri = Url::from_file_path(dir.path().join("main.yaml")).expect("file uri");
    let schema = fetch_schema(&ctx, uri.as_str()).await.expect("fetch");
    assert!(schema.validate(&ctx, &json!({"id": "a1"})).unwrap().is_empty());
    let errs = schema.validate(&ctx, &json!({"id": 1})).unwrap();
    assert_eq!(errs[0].to_string(), "/id: type should be string");
}

#[tokio::test]
async fn file_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.json");
    let uri = Url::from_file_path(&missing).expect("file uri");
    let err = fetch_schema(&Context::background(), uri.as_str())
        .await
        .unwrap_err();
    match err {
        SchemaError::Fetch {
            source: LoadError::NotFound { path },
            ..
        } => assert_eq!(path, missing.display().to_string()),
        other => panic!("unexpected error: {other}"),
    }
}

// ── schemes ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_scheme() {
    let uri = "unknownscheme://resource.json#definitions/property";
    let err = fetch_schema(&Context::background(), uri).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknownscheme is not supported for uri: unknownscheme://resource.json#definitions/property"
    );
}

#[tokio::test]
async fn missing_scheme() {
    let err = fetch_schema(&Context::background(), "resource.json")
        .await
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedScheme { scheme, .. } if scheme.is_empty()));
}

#[tokio::test]
async fn custom_global_loader() {
    LoaderRegistry::global().register("fetch-test-protocol", |_ctx: Context, uri: Url| async move {
        Ok::<_, LoadError>(json!({
            "description": format!("loaded from {}", uri.path()),
            "type": ["string", "null"]
        }))
    });

    let schema = fetch_schema(&Context::background(), "fetch-test-protocol:///doc.json")
        .await
        .expect("fetch");
    assert_eq!(
        schema.keyword_value("description"),
        Some(json!("loaded from /doc.json"))
    );
    assert_eq!(schema.top_level_type(), "string,null");
    // Fetched schemas are compiled fresh, not cached.
    assert!(SchemaRegistry::global()
        .cached("fetch-test-protocol:///doc.json")
        .is_none());
}

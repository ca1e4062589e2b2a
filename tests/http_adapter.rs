//! End-to-end: HTTP adapter, generated routes and in-memory stores driven through axum.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use pretty_assertions::assert_eq;
use rest_protocols::controller::persist::revision_marker;
use rest_protocols::db::{CreateOptions, DbAdapter};
use rest_protocols::{
    create, downcast, AdapterSpec, DbRegistry, Flow, HttpAdapter, ImplementOptions, MemoryStore,
    Middleware, Overrides, ProtocolConfig, ProtocolOptions, RequestContext, RespondOptions, Verb,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> ProtocolConfig {
    let mut config = ProtocolConfig::default();
    config.environment = "test".into();
    config.view_dirs = vec![PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/views")];
    config
}

fn adapter_with(store: Arc<MemoryStore>, config: ProtocolConfig) -> HttpAdapter {
    HttpAdapter::new(ProtocolOptions {
        db: DbRegistry::new().with("example", store),
        config,
        save_revision: Some(revision_marker()),
        ..Default::default()
    })
    .unwrap()
}

fn app(store: Arc<MemoryStore>) -> Router {
    let adapter = adapter_with(store, test_config());
    adapter.implement_model("example").unwrap();
    adapter.router()
}

async fn seed(store: &MemoryStore, doc: Value) -> Value {
    store
        .create(CreateOptions {
            newdoc: doc,
            ..Default::default()
        })
        .await
        .unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, String) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, req).await;
    (status, serde_json::from_str(&body).unwrap())
}

fn json_body(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn create_then_show_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let router = app(store.clone());

    let (status, created) = send_json(&router, json_body(Method::POST, "/examples", json!({ "title": "First Post", "n": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["result"], "success");
    let newdoc = &created["data"]["newdoc"];
    assert_eq!(newdoc["name"], "first-post");
    assert_eq!(newdoc, &created["data"]["createresponse"]);
    let id = newdoc["_id"].as_str().unwrap().to_string();

    let (status, shown) = send_json(&router, get(&format!("/examples/{}?format=json", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["data"]["title"], "First Post");
    assert_eq!(shown["data"]["n"], 1);
    assert_eq!(shown["data"]["_id"], id.as_str());
    assert_eq!(shown["data"]["request"]["params"]["id"], id.as_str());
}

#[tokio::test]
async fn patch_update_keeps_siblings_and_revision() {
    let store = Arc::new(MemoryStore::new());
    let doc = seed(&store, json!({ "contact": { "first_name": "Distinct", "last_name": "Name" } })).await;
    let id = doc["_id"].as_str().unwrap();
    let router = app(store.clone());

    let (status, updated) = send_json(
        &router,
        json_body(
            Method::PUT,
            &format!("/examples/{}", id),
            json!({ "updatedoc": { "contact": { "last_name": "Updated" } }, "isPatch": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["updateresponse"]["contact"], json!({ "first_name": "Distinct", "last_name": "Updated" }));
    assert_eq!(store.revisions().len(), 1);
    assert_eq!(store.revisions()[0]["contact"]["last_name"], "Name");
}

#[tokio::test]
async fn form_update_redirects_to_model() {
    let store = Arc::new(MemoryStore::new());
    let doc = seed(&store, json!({ "title": "Form" })).await;
    let router = app(store.clone());
    let req = Request::builder()
        .method(Method::PUT)
        .uri(format!("/examples/{}", doc["_id"].as_str().unwrap()))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("updatedoc%5Btitle%5D=Renamed&isPatch=true"))
        .unwrap();
    let res = router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "/data/example/");
    assert_eq!(store.all()[0]["title"], "Renamed");
}

#[tokio::test]
async fn index_paginates_json() {
    let store = Arc::new(MemoryStore::new());
    for i in 0..5 {
        seed(&store, json!({ "title": format!("Example {}", i), "n": i })).await;
    }
    let router = app(store);

    let (status, body) = send_json(&router, get("/examples?format=json&limit=5&pagelength=2")).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["examples"]["documents"].as_array().unwrap().len(), 2);
    assert_eq!(data["examplescount"], 2);
    assert_eq!(data["examplestotal"], 5);
    assert_eq!(data["examplestotalpages"], 3);
    assert_eq!(data["examplepage_current"], 1);
    assert_eq!(data["examplepage_next"], 2);
    assert_eq!(data["examplepage_prev"], Value::Null);
    assert!(data.get("request").is_some());
}

#[tokio::test]
async fn index_renders_html_view() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, json!({ "title": "Only" })).await;
    let router = app(store);
    let (status, html) = send(&router, Request::get("/examples").header(header::ACCEPT, "text/html").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<h1>Examples</h1>"), "{}", html);
    assert!(html.contains("<p>1 shown</p>"), "{}", html);
}

#[tokio::test]
async fn delete_returns_removed_document() {
    let store = Arc::new(MemoryStore::new());
    let doc = seed(&store, json!({ "title": "Doomed" })).await;
    let router = app(store.clone());
    let req = Request::delete(format!("/examples/{}?format=json", doc["_id"].as_str().unwrap()))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Doomed");
    assert!(store.is_empty());
}

#[tokio::test]
async fn missing_document_is_invalid_request() {
    let router = app(Arc::new(MemoryStore::new()));
    let (status, body) = send_json(&router, get("/examples/nope?format=json")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Invalid Request");
}

#[tokio::test]
async fn jsonp_callback_wraps_show() {
    let store = Arc::new(MemoryStore::new());
    let doc = seed(&store, json!({ "title": "Padded" })).await;
    let router = app(store);
    let res = router
        .clone()
        .oneshot(get(&format!("/examples/{}?format=json&callback=cb", doc["_id"].as_str().unwrap())))
        .await
        .unwrap();
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/javascript; charset=utf-8");
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("/**/ typeof cb === 'function' && cb("));
    assert!(text.contains("Padded"));
}

#[tokio::test]
async fn exception_page_is_redacted() {
    let mut config = test_config();
    config.exception_message = Some("Hello World".into());
    let adapter = adapter_with(Arc::new(MemoryStore::new()), config);
    adapter.implement_model("example").unwrap();
    let router = adapter.router();

    // A non-object document fails in the store.
    let (status, html) = send(
        &router,
        Request::post("/examples")
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::ACCEPT, "text/html")
            .body(Body::from("[1, 2]"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(html.contains(r#"<p class="message">Hello World</p>"#), "{}", html);
    assert!(!html.contains("JSON object"));

    let req = Request::post("/examples")
        .header(header::CONTENT_TYPE, "text/plain")
        .header("x-requested-with", "XMLHttpRequest")
        .body(Body::from("[1, 2]"))
        .unwrap();
    let (status, body) = send_json(&router, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "result": "error", "data": { "error": "Hello World" } }));
}

#[tokio::test]
async fn missing_view_uses_exception_page() {
    let router = app(Arc::new(MemoryStore::new()));
    let (status, html) = send(&router, get("/examples/new")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(html.contains("view not found: example/new.html"), "{}", html);
}

#[tokio::test]
async fn skip_default_props_omits_request() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, json!({ "title": "Plain" })).await;
    let adapter = adapter_with(store, test_config());
    let mut opts = ImplementOptions::new("example");
    opts.controller.skip_default_props = true;
    adapter.implement(opts).unwrap();
    let router = Router::new().nest("/v1", adapter.router());
    let (status, body) = send_json(&router, get("/v1/examples?format=json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("request").is_none());
    assert_eq!(body["data"]["examplescount"], 1);
}

#[tokio::test]
async fn show_override_is_used_verbatim() {
    let store = Arc::new(MemoryStore::new());
    let doc = seed(&store, json!({ "title": "Overridden" })).await;
    let adapter = adapter_with(store, test_config());
    let teapot = Middleware::new("teapot", |_req: RequestContext| async move {
        Flow::Done(StatusCode::IM_A_TEAPOT.into_response())
    });
    let mut opts = ImplementOptions::new("example");
    opts.overrides = Overrides::new().verb(Verb::Show, teapot.clone());
    let controller = adapter.implement(opts).unwrap();
    assert!(Middleware::ptr_eq(&controller.show, &teapot));

    let router = adapter.router();
    let (status, _) = send(&router, get(&format!("/examples/{}", doc["_id"].as_str().unwrap()))).await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);
}

#[tokio::test]
async fn response_data_returns_the_envelope() {
    let adapter = adapter_with(Arc::new(MemoryStore::new()), test_config());
    let req = RequestContext::new(Method::GET, "/examples?x=1");
    let data = adapter
        .response_data(&req, RespondOptions::data(json!({ "a": 1 })))
        .await
        .unwrap();
    assert_eq!(data["result"], "success");
    assert_eq!(data["data"]["a"], 1);
    assert_eq!(data["data"]["request"]["query"], json!({ "x": "1" }));
}

#[tokio::test]
async fn registry_builds_a_usable_http_adapter() {
    let protocol = create(ProtocolOptions {
        adapter: Some(AdapterSpec::named("http")),
        db: DbRegistry::new().with("person", Arc::new(MemoryStore::new())),
        config: test_config(),
        ..Default::default()
    })
    .unwrap();
    let adapter = downcast::<HttpAdapter>(protocol).unwrap();
    adapter.implement(ImplementOptions::new("person")).unwrap();
    let router = adapter.router();
    let (status, body) = send_json(&router, json_body(Method::POST, "/people", json!({ "name": "ada" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["newdoc"]["name"], "ada");
    assert_eq!(
        adapter.controller("person").map(|c| c.load.name().to_string()),
        Some("person.load".to_string())
    );
}

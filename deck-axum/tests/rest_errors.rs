use std::sync::Arc;

use axum::body::Body;
use axum::http::HeaderValue;
use axum::http::Request;
use deck_axum::axum;
use deck_core::errors::DeckError;
use deck_core::{DeckApp, DeckService, RequestContext, ServiceCapabilities, ServiceMethodKind};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct ConflictOnCreate;

#[async_trait::async_trait]
impl DeckService<Value, ()> for ConflictOnCreate {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::from_methods(vec![ServiceMethodKind::Create])
    }

    async fn create(&self, _ctx: &RequestContext, _data: Value, _params: ()) -> anyhow::Result<Value> {
        Err(DeckError::conflict("Design is still referenced")
            .with_errors(json!({"name": ["in use"]}))
            .into_anyhow())
    }
}

struct BoomOnCreate;

#[async_trait::async_trait]
impl DeckService<Value, ()> for BoomOnCreate {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::from_methods(vec![ServiceMethodKind::Create])
    }

    async fn create(&self, _ctx: &RequestContext, _data: Value, _params: ()) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("disk on fire at /var/lib/cards"))
    }
}

/// Echoes the body and the request id it was called with.
struct Echo;

#[async_trait::async_trait]
impl DeckService<Value, ()> for Echo {
    fn capabilities(&self) -> ServiceCapabilities {
        use ServiceMethodKind::*;
        ServiceCapabilities::from_methods(vec![Create, Get])
    }

    async fn create(&self, ctx: &RequestContext, data: Value, _params: ()) -> anyhow::Result<Value> {
        Ok(json!({ "data": data, "requestId": ctx.request_id }))
    }

    async fn get(&self, _ctx: &RequestContext, id: &str, _params: ()) -> anyhow::Result<Value> {
        Ok(json!({ "id": id }))
    }
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn malformed_json_returns_bad_request() {
    let app: DeckApp<Value, ()> = DeckApp::new();
    let router = axum(app).use_service("/cards", Arc::new(BoomOnCreate)).into_router();

    let res = router.oneshot(post_json("/cards", "{\"name\":\"x\"")).await.unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["name"], "BadRequest");
    assert_eq!(body["code"], 400);
    assert_eq!(body["className"], "bad-request");
    assert!(body["errors"]["_schema"].is_array());
}

#[tokio::test]
async fn request_id_is_preserved_and_reaches_the_service() {
    let app: DeckApp<Value, ()> = DeckApp::new();
    let router = axum(app).use_service("/echo", Arc::new(Echo)).into_router();

    let provided = HeaderValue::from_static("req-test-123");
    let mut req = post_json("/echo", "{\"name\":\"ok\"}");
    req.headers_mut().insert("x-request-id", provided.clone());

    let res = router.oneshot(req).await.unwrap();

    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
    let body = json_body(res).await;
    assert_eq!(body["requestId"], "req-test-123");
}

#[tokio::test]
async fn create_answers_201() {
    let app: DeckApp<Value, ()> = DeckApp::new();
    let router = axum(app).use_service("/echo", Arc::new(Echo)).into_router();

    let res = router.oneshot(post_json("/echo", "{\"name\":\"Fire\"}")).await.unwrap();

    assert_eq!(res.status().as_u16(), 201);
    let body = json_body(res).await;
    assert_eq!(body["data"], json!({"name": "Fire"}));
}

#[tokio::test]
async fn deck_error_keeps_its_status_and_shape() {
    let app: DeckApp<Value, ()> = DeckApp::new();
    let router = axum(app).use_service("/cards", Arc::new(ConflictOnCreate)).into_router();

    let res = router.oneshot(post_json("/cards", "{\"name\":\"\"}")).await.unwrap();

    assert_eq!(res.status().as_u16(), 409);
    let body = json_body(res).await;
    assert_eq!(body["name"], "Conflict");
    assert_eq!(body["code"], 409);
    assert_eq!(body["className"], "conflict");
    assert_eq!(body["message"], "Design is still referenced");
    assert_eq!(body["errors"], json!({"name": ["in use"]}));
}

#[tokio::test]
async fn unknown_errors_are_sanitized_500s() {
    let app: DeckApp<Value, ()> = DeckApp::new();
    let router = axum(app).use_service("/cards", Arc::new(BoomOnCreate)).into_router();

    let res = router.oneshot(post_json("/cards", "{}")).await.unwrap();

    assert_eq!(res.status().as_u16(), 500);
    let body = json_body(res).await;
    assert_eq!(body["name"], "GeneralError");
    assert_eq!(body["message"], "Internal server error");
    assert!(!body.to_string().contains("/var/lib/cards"));
}

#[tokio::test]
async fn methods_outside_capabilities_answer_405() {
    let app: DeckApp<Value, ()> = DeckApp::new();
    let router = axum(app).use_service("/echo", Arc::new(Echo)).into_router();

    let res = router
        .oneshot(Request::builder().method("DELETE").uri("/echo/1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 405);
    let body = json_body(res).await;
    assert_eq!(body["name"], "MethodNotAllowed");
}

#[tokio::test]
async fn get_by_id_reads_the_path() {
    let app: DeckApp<Value, ()> = DeckApp::new();
    let router = axum(app).use_service("/echo", Arc::new(Echo)).into_router();

    let res = router
        .oneshot(Request::builder().uri("/echo/abc-1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(json_body(res).await, json!({"id": "abc-1"}));
}

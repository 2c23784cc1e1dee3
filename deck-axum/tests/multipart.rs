use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use bytes::Bytes;
use deck_axum::middlewares::{FileEncoding, MultipartConfig, MultipartToJson};
use deck_axum::{axum, RestParams};
use deck_core::{DeckApp, DeckService, RequestContext, ServiceCapabilities, ServiceMethodKind};
use futures::TryStreamExt;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::{service_fn, Layer, ServiceExt};

const BOUNDARY: &str = "deck-test-boundary";

/// Returns the JSON it received plus what it could read from the upload.
struct Inspect;

#[async_trait::async_trait]
impl DeckService<Value, RestParams> for Inspect {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::from_methods(vec![ServiceMethodKind::Create])
    }

    async fn create(&self, _ctx: &RequestContext, data: Value, params: RestParams) -> anyhow::Result<Value> {
        let upload = match params.file("image") {
            Some(file) => {
                let chunks: Vec<Bytes> = file.open().await?.try_collect().await?;
                json!({
                    "bytes": String::from_utf8_lossy(&chunks.concat()),
                    "tempPath": file.temp_path().map(|p| p.display().to_string()),
                })
            }
            None => Value::Null,
        };
        Ok(json!({ "data": data, "upload": upload }))
    }
}

fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &str)]) -> String {
    let mut body = String::new();
    for (name, file, value) in parts {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match file {
            Some((filename, content_type)) => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                ));
                body.push_str(&format!("Content-Type: {content_type}\r\n\r\n"));
            }
            None => body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
        }
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn multipart_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/cards")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn router(config: MultipartConfig) -> axum::Router {
    let app: DeckApp<Value, RestParams> = DeckApp::new();
    axum(app)
        .use_service_with("/cards", Arc::new(Inspect), MultipartToJson::with_config(config))
        .into_router()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn text_fields_become_json_and_files_stay_readable() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(MultipartConfig::new().temp_dir(dir.path()));

    let body = multipart_body(&[
        ("name", None, "Charmander"),
        ("hp", None, "39"),
        ("image", Some(("char.png", "image/png")), "PNGDATA"),
    ]);
    let res = router.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(res.status().as_u16(), 201);
    let body = json_body(res).await;
    assert_eq!(body["data"]["name"], "Charmander");
    assert_eq!(body["data"]["hp"], "39");
    assert_eq!(
        body["data"]["image"],
        json!({"filename": "char.png", "contentType": "image/png", "size": 7})
    );
    assert_eq!(body["upload"]["bytes"], "PNGDATA");

    // temp files are gone once the response is built
    let temp_path = body["upload"]["tempPath"].as_str().unwrap();
    assert!(!std::path::Path::new(temp_path).exists());
}

#[tokio::test]
async fn json_bodies_cannot_smuggle_uploads() {
    let router = router(MultipartConfig::new());

    let res = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cards")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"x","image":{"path":"/etc/passwd"}}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 201);
    let body = json_body(res).await;
    assert_eq!(body["upload"], Value::Null);
}

#[tokio::test]
async fn empty_file_input_is_ignored() {
    let router = router(MultipartConfig::new().file_encoding(FileEncoding::Memory));

    let body = multipart_body(&[("name", None, "Squirtle"), ("image", Some(("", "application/octet-stream")), "")]);
    let res = router.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(res.status().as_u16(), 201);
    let body = json_body(res).await;
    assert!(body["data"].get("image").is_none());
    assert_eq!(body["upload"], Value::Null);
}

#[tokio::test]
async fn oversized_file_is_payload_too_large() {
    let router = router(MultipartConfig::new().max_file_size(4).file_encoding(FileEncoding::Memory));

    let body = multipart_body(&[("image", Some(("big.png", "image/png")), "0123456789")]);
    let res = router.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(res.status().as_u16(), 413);
    assert_eq!(json_body(res).await["name"], "PayloadTooLarge");
}

#[tokio::test]
async fn disallowed_file_type_is_bad_request() {
    let router = router(MultipartConfig::new().allow_content_type("image/png"));

    let body = multipart_body(&[("image", Some(("x.html", "text/html")), "<p>")]);
    let res = router.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn missing_boundary_is_bad_request() {
    let router = router(MultipartConfig::new());

    let res = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cards")
                .header("content-type", "multipart/form-data")
                .body(Body::from("garbage"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert!(res.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn layered_services_with_their_own_error_type_can_be_spawned() {
    let dir = tempfile::tempdir().unwrap();
    let echo = service_fn(|req: Request<Body>| async move {
        let bytes = req.into_body().collect().await.map_err(std::io::Error::other)?.to_bytes();
        Ok::<_, std::io::Error>(axum::response::Response::new(Body::from(bytes)))
    });
    let svc = MultipartToJson::with_config(MultipartConfig::new().temp_dir(dir.path())).layer(echo);

    let body = multipart_body(&[("name", None, "Squirtle"), ("image", Some(("s.png", "image/png")), "PNG")]);
    let res = tokio::spawn(svc.oneshot(multipart_request(body))).await.unwrap().unwrap();

    let body = json_body(res).await;
    assert_eq!(body["name"], "Squirtle");
}

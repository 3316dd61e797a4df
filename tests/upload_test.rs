use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use upload_guard::config::ServerConfig;
use upload_guard::{AppState, create_app};

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

struct Part<'a> {
    field: &'a str,
    filename: Option<&'a str>,
    content_type: Option<&'a str>,
    body: Vec<u8>,
}

fn file_part<'a>(field: &'a str, filename: &'a str, content_type: &'a str, body: &[u8]) -> Part<'a> {
    Part {
        field,
        filename: Some(filename),
        content_type: Some(content_type),
        body: body.to_vec(),
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.field, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.field).as_bytes(),
            ),
        }
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.body);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn setup(configure: impl FnOnce(&mut ServerConfig)) -> (Router, AppState, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::default();
    config.temp_dir = temp_dir.path().to_path_buf();
    config.allowed_mime_types = vec!["image/png".to_string()];
    config.max_size_mib = None;
    configure(&mut config);

    let state = AppState::from_config(&config).unwrap();
    (create_app(state.clone()), state, temp_dir)
}

async fn post_upload(app: &Router, parts: &[Part<'_>]) -> (StatusCode, Value) {
    post_raw(app, multipart_body(parts)).await
}

async fn post_raw(app: &Router, body: Vec<u8>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

fn error_kinds(json: &Value) -> Vec<String> {
    json["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_single_file_accepted() {
    let (app, _state, _dir) = setup(|_| {});

    let (status, json) = post_upload(
        &app,
        &[file_part("file", "photo.png", "image/png", &[0x89, 0x50, 0x4E, 0x47])],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["field_present"], true);
    assert_eq!(json["files"][0]["name"], "photo.png");
    assert_eq!(json["files"][0]["mime_type"], "image/png");
    assert_eq!(json["files"][0]["size"], 4);
    assert!(json["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_type_rejected() {
    let (app, _state, _dir) = setup(|_| {});

    let (status, json) = post_upload(
        &app,
        &[file_part("file", "anim.gif", "image/gif", b"GIF89a")],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["success"], false);
    assert_eq!(error_kinds(&json), vec!["TYPE"]);
    assert_eq!(json["errors"][0]["code"], 1);
    assert!(json["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_file_rejected() {
    let (app, _state, _dir) = setup(|config| config.max_size_mib = Some(1));

    let content = vec![0u8; 1024 * 1024 + 1024];
    let (status, json) = post_upload(
        &app,
        &[file_part("file", "big.png", "image/png", &content)],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_kinds(&json), vec!["SIZE"]);
}

#[tokio::test]
async fn test_transport_limit_marks_not_uploaded() {
    let (app, _state, _dir) = setup(|config| config.transport_max_file_size = 8);

    let (status, json) = post_upload(
        &app,
        &[file_part("file", "photo.png", "image/png", b"more than eight bytes")],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_kinds(&json), vec!["NOT_UPLOADED"]);
}

#[tokio::test]
async fn test_truncated_file_part_marks_not_uploaded() {
    let (app, state, dir) = setup(|_| {});

    // No closing boundary: the body ends inside the file part.
    let body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\nhalf-a-file",
        BOUNDARY
    );
    let (status, json) = post_raw(&app, body.into_bytes()).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["field_present"], true);
    assert_eq!(error_kinds(&json), vec!["NOT_UPLOADED"]);
    assert!(json["files"].as_array().unwrap().is_empty());
    assert!(state.stager.registry().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_temp_dir_marks_not_uploaded() {
    let (app, _state, _dir) =
        setup(|config| config.temp_dir = "/nonexistent/upload-guard/staging".into());

    let (status, json) = post_upload(
        &app,
        &[file_part("file", "photo.png", "image/png", b"png")],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_kinds(&json), vec!["NOT_UPLOADED"]);
    assert_eq!(json["errors"][0]["code"], 0);
}

#[tokio::test]
async fn test_malformed_body_error_shape() {
    let (app, _state, _dir) = setup(|_| {});

    let (status, json) = post_raw(&app, b"not a multipart body".to_vec()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Malformed multipart body"));
}

#[tokio::test]
async fn test_empty_file_input_marks_not_uploaded() {
    let (app, _state, _dir) = setup(|_| {});

    let (status, json) = post_upload(
        &app,
        &[file_part("file", "", "application/octet-stream", b"")],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_kinds(&json), vec!["NOT_UPLOADED"]);
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let (app, _state, _dir) = setup(|_| {});

    let (status, json) = post_upload(
        &app,
        &[
            file_part("avatar", "photo.png", "image/png", b"png"),
            Part {
                field: "file",
                filename: None,
                content_type: None,
                body: b"just text".to_vec(),
            },
        ],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field_present"], false);
    assert_eq!(json["success"], false);
    assert!(json["errors"].as_array().unwrap().is_empty());
    assert!(json["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_multiple_files_partial_failure() {
    let (app, _state, _dir) = setup(|config| config.allow_multiple = true);

    let (status, json) = post_upload(
        &app,
        &[
            file_part("file[]", "one.png", "image/png", b"one"),
            file_part("file[]", "two.gif", "image/gif", b"two"),
            file_part("file[]", "three.png", "image/png", b"three"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let names: Vec<&str> = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["one.png", "three.png"]);
    assert_eq!(error_kinds(&json), vec!["TYPE"]);
}

#[tokio::test]
async fn test_multiple_files_all_valid() {
    let (app, _state, _dir) = setup(|config| config.allow_multiple = true);

    let (status, json) = post_upload(
        &app,
        &[
            file_part("file[]", "one.png", "image/png", b"one"),
            file_part("file[]", "two.png", "image/png", b"two"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["files"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_multiple_files_into_single_field() {
    let (app, _state, _dir) = setup(|_| {});

    let (status, json) = post_upload(
        &app,
        &[
            file_part("file[]", "one.png", "image/png", b"one"),
            file_part("file[]", "two.png", "image/png", b"two"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_kinds(&json), vec!["MULTIPLE"]);
    assert_eq!(json["errors"][0]["code"], 3);
    assert!(json["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_staged_files_released_after_request() {
    let (app, state, dir) = setup(|_| {});

    let (status, _json) = post_upload(
        &app,
        &[file_part("file", "photo.png", "image/png", b"png")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(state.stager.registry().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_malformed_multipart_is_bad_request() {
    let (app, _state, _dir) = setup(|_| {});

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_request_id() {
    let (app, _state, _dir) = setup(|_| {});

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["field_name"], "file");
    assert_eq!(json["staged_uploads"], 0);
}

#[tokio::test]
async fn test_openapi_documents_both_bad_request_shapes() {
    let (app, _state, _dir) = setup(|_| {});

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let doc: Value = serde_json::from_slice(&body).unwrap();

    let bad_request = &doc["paths"]["/upload"]["post"]["responses"]["400"];
    assert_eq!(
        bad_request["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/BadRequestBody"
    );

    let variants: Vec<&str> = doc["components"]["schemas"]["BadRequestBody"]["oneOf"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["$ref"].as_str().unwrap())
        .collect();
    assert_eq!(
        variants,
        vec![
            "#/components/schemas/UploadReport",
            "#/components/schemas/ErrorResponse"
        ]
    );

    let health = &doc["components"]["schemas"]["HealthResponse"]["properties"];
    assert!(health.get("field_name").is_some());
    assert!(health.get("staged_uploads").is_some());
}

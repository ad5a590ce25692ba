#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use doujinshelf_api::config::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES, UPLOADS_URL_PREFIX};
use doujinshelf_api::router::build_app_router;
use doujinshelf_api::state::AppState;
use doujinshelf_core::cover::LocalCoverStore;
use doujinshelf_core::work::DEFAULT_MAX_PRICE;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----doujinshelf-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(upload_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: String::new(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        max_price: DEFAULT_MAX_PRICE,
    }
}

/// The application router plus the temporary upload directory backing it.
pub struct TestApp {
    router: Router,
    uploads: TempDir,
}

impl TestApp {
    /// A fresh handle to the router, consumed by one request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.uploads.path().to_path_buf()
    }

    /// Number of files currently stored as covers.
    pub fn stored_covers(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, |_| {})
}

/// Like [`build_test_app`], with a hook to adjust the configuration.
pub fn build_test_app_with(pool: PgPool, adjust: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = test_config(uploads.path());
    adjust(&mut config);

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        covers: Arc::new(LocalCoverStore::new(uploads.path(), UPLOADS_URL_PREFIX)),
    };

    TestApp {
        router: build_app_router(state, &config),
        uploads,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// A cover file attached to a multipart request.
pub struct Cover<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

/// Send a `multipart/form-data` request with text `fields` and an optional
/// `cover` part.
pub async fn send_form(
    app: Router,
    method: Method,
    uri: &str,
    fields: &[(&str, &str)],
    cover: Option<Cover<'_>>,
) -> Response<Body> {
    let body = multipart_body(fields, cover);
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_form(app: Router, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
    send_form(app, Method::POST, uri, fields, None).await
}

pub async fn put_form(app: Router, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
    send_form(app, Method::PUT, uri, fields, None).await
}

pub fn multipart_body(fields: &[(&str, &str)], cover: Option<Cover<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(cover) = cover {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"cover\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                cover.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(cover.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

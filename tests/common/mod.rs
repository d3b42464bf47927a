#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use khanqah_backend::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    repository::RepositoryState, storage::StorageState,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const BOUNDARY: &str = "khanqah-test-boundary";

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];
/// A Windows executable header.
pub const EXE_BYTES: &[u8] = b"MZ\x90\x00\x03\x00\x00\x00\x04\x00\x00\x00\xff\xff\x00\x00";

/// TestApp
///
/// A router wired to in-memory services. The media root lives in a temporary directory
/// removed when the app is dropped.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
    pub media_dir: TempDir,
    pub admin_id: Uuid,
    pub editor_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(mut config: AppConfig) -> Self {
        let media_dir = tempfile::tempdir().expect("temp media root");
        config.media_root = media_dir.path().to_path_buf();

        let repo = Arc::new(InMemoryRepository::new());
        let admin_id = repo.add_user("admin@khanqah.test", "admin").await;
        let editor_id = repo.add_user("editor@khanqah.test", "editor").await;

        let storage = MockStorageService::new();
        let state = AppState::new(
            repo.clone() as RepositoryState,
            Arc::new(storage.clone()) as StorageState,
            config,
        )
        .expect("app state");

        TestApp {
            router: create_router(state),
            repo,
            storage,
            media_dir,
            admin_id,
            editor_id,
        }
    }

    /// Writes a file under the media root.
    pub fn write_media(&self, relative: &str, contents: &[u8]) {
        let path = self.media_dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_as(&self, uri: &str, user_id: Uuid) -> Response<Body> {
        self.send(
            Request::get(uri)
                .header("x-user-id", user_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// One multipart part: a text field when `filename` is `None`, a file otherwise.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub body: &'a [u8],
}

pub fn text<'a>(name: &'a str, value: &'a str) -> Part<'a> {
    Part {
        name,
        filename: None,
        body: value.as_bytes(),
    }
}

pub fn file<'a>(name: &'a str, filename: &'a str, body: &'a [u8]) -> Part<'a> {
    Part {
        name,
        filename: Some(filename),
        body,
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(part.body);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, user_id: Option<Uuid>, parts: &[Part<'_>]) -> Request<Body> {
    multipart_request_with("POST", uri, user_id, parts)
}

pub fn multipart_request_with(
    method: &str,
    uri: &str,
    user_id: Option<Uuid>,
    parts: &[Part<'_>],
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(
        "content-type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

pub fn json_request(
    method: &str,
    uri: &str,
    user_id: Option<Uuid>,
    payload: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

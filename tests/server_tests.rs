use khanqah_backend::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    repository::RepositoryState, storage::StorageState,
};
use std::{net::SocketAddr, sync::Arc};
use tempfile::TempDir;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestServer {
    pub address: String,
    pub media_dir: TempDir,
}

/// Serves the full application on an ephemeral port, the same way `main` does.
async fn spawn_app() -> TestServer {
    let media_dir = tempfile::tempdir().expect("temp media root");
    let config = AppConfig {
        media_root: media_dir.path().to_path_buf(),
        ..AppConfig::default()
    };

    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let state = AppState::new(repo, storage, config).expect("app state");
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer { address, media_dir }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::get(format!("{}/health", app.address))
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_media_over_the_wire() {
    let app = spawn_app().await;
    std::fs::create_dir_all(app.media_dir.path().join("publications")).unwrap();
    std::fs::write(
        app.media_dir.path().join("publications/book.pdf"),
        b"%PDF-1.7\n%%EOF\n",
    )
    .unwrap();

    let response = reqwest::get(format!("{}/media/publications/book.pdf", app.address))
        .await
        .expect("req fail");
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"%PDF-1.7\n%%EOF\n");

    let missing = reqwest::get(format!("{}/media/publications/nope.pdf", app.address))
        .await
        .expect("req fail");
    assert_eq!(missing.status(), 404);
    let body: serde_json::Value = missing.json().await.unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let response = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .expect("req fail");
    assert_eq!(response.status(), 200);

    let doc: serde_json::Value = response.json().await.unwrap();
    assert!(doc["paths"]["/api/publications/publications/"].is_object());
    assert!(doc["paths"]["/contact/send-message/"]["post"].is_object());
}

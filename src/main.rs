use khanqah_backend::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{LocalStorage, S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, storage, then the HTTP server.
/// Startup failures are fatal and reported before the process exits.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    // 2. Logging
    // RUST_LOG wins; otherwise debug for this crate and request logs from tower_http.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "khanqah_backend=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to connect to Postgres. Check DATABASE_URL.");
            std::process::exit(1);
        });

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!(error = %e, "Database migrations failed");
        std::process::exit(1);
    }

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Storage
    // S3-compatible when fully configured, otherwise files live under the media root.
    let storage: StorageState = match &config.s3 {
        Some(s3) => {
            tracing::info!(bucket = %s3.bucket, endpoint = %s3.endpoint, "Using S3 storage");
            Arc::new(S3StorageClient::new(s3))
        }
        None => {
            tracing::info!(root = %config.media_root.display(), "Using local media storage");
            Arc::new(LocalStorage::new(&config.media_root, &config.public_base_url))
        }
    };

    if let Err(e) = storage.ensure_bucket_exists().await {
        tracing::warn!(error = %e, "Storage backend is not ready; uploads may fail");
    }

    // 5. State and router
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(repo, storage, config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Media root is not usable");
        std::process::exit(1);
    });
    let app = create_router(app_state);

    // 6. Server
    let listener = TcpListener::bind(&bind_addr).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, addr = %bind_addr, "Failed to bind listener");
        std::process::exit(1);
    });

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    // Connect info feeds the client address into media access logs and the throttle.
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!(error = %e, "Server terminated");
    }
}

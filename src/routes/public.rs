use crate::{AppState, handlers, media};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints outside `/api/` that never require credentials.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /contact/send-message/
        // Validated, persisted contact form. Never cached.
        .route(
            "/contact/send-message/",
            post(handlers::send_contact_message),
        )
        // GET|HEAD /media/{*file_path}
        // Uploaded files, served only through the gatekeeper. Any refusal is a uniform 404.
        .route("/media/{*file_path}", get(media::serve_media_file))
}

use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// API Router Module
///
/// Content endpoints under `/api/`. Paths keep their trailing slash. `GET` is public;
/// every write method is admin-only and enforces that in the handler. `PUT` and `PATCH`
/// share a handler, which reads the method to decide between full and partial updates.
///
/// `max_upload_bytes` raises the body limit for the multipart upload routes above axum's
/// 2 MB default. Per-file ceilings are enforced by the upload policies.
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // --- About ---
        .route("/api/about/sections/", get(handlers::list_about_sections))
        .route("/api/about/sections/{id}/", get(handlers::get_about_section))
        .route(
            "/api/about/current-nasheen/",
            get(handlers::get_current_nasheen),
        )
        .route(
            "/api/about/previous-nasheen/",
            get(handlers::list_previous_nasheen),
        )
        // --- Events ---
        .route("/api/events/", get(handlers::list_events))
        .route("/api/events/{id}/", get(handlers::get_event))
        // --- Publications ---
        .route(
            "/api/publications/publications/",
            get(handlers::list_publications).post(handlers::create_publication),
        )
        .route(
            "/api/publications/publications/{id}/",
            get(handlers::get_publication)
                .put(handlers::update_publication)
                .patch(handlers::update_publication)
                .delete(handlers::delete_publication),
        )
        // --- Gallery ---
        .route(
            "/api/gallery/",
            get(handlers::list_gallery_collections).post(handlers::create_gallery_collection),
        )
        .route(
            "/api/gallery/{id}/",
            get(handlers::get_gallery_collection)
                .put(handlers::update_gallery_collection)
                .patch(handlers::update_gallery_collection)
                .delete(handlers::delete_gallery_collection),
        )
        .route(
            "/api/gallery/{id}/images/",
            post(handlers::upload_gallery_image),
        )
        // --- Photos ---
        .route(
            "/api/photos/collections/",
            get(handlers::list_photo_collections).post(handlers::create_photo_collection),
        )
        .route(
            "/api/photos/collections/{id}/",
            get(handlers::get_photo_collection)
                .put(handlers::update_photo_collection)
                .patch(handlers::update_photo_collection)
                .delete(handlers::delete_photo_collection),
        )
        .route(
            "/api/photos/photos/",
            get(handlers::list_photos).post(handlers::create_photo),
        )
        .route(
            "/api/photos/photos/{id}/",
            get(handlers::get_photo)
                .put(handlers::update_photo)
                .patch(handlers::update_photo)
                .delete(handlers::delete_photo),
        )
        // --- Audio / Video ---
        .route(
            "/api/video-audios/audios/",
            get(handlers::list_audios).post(handlers::create_audio),
        )
        .route(
            "/api/video-audios/videos/",
            get(handlers::list_videos).post(handlers::create_video),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

use std::{io, sync::Arc};

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Upload and media security core.
pub mod cache;
pub mod cors;
pub mod media;
pub mod response;
pub mod sanitize;
pub mod security_headers;
pub mod throttle;
pub mod validation;

// Application services.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;
pub mod uploads;

pub mod routes;
use routes::{api, public};

// --- Public Re-exports ---

pub use cache::CachePolicy;
pub use config::AppConfig;
pub use media::MediaGatekeeper;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use security_headers::SecurityHeaders;
pub use storage::{LocalStorage, MockStorageService, S3StorageClient, StorageState};
pub use throttle::Throttle;

/// ApiDoc
///
/// OpenAPI document served at `/api-docs/openapi.json`. Every documented response body is
/// wrapped in the `{status, message, data}` envelope.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_about_sections, handlers::get_about_section,
        handlers::get_current_nasheen, handlers::list_previous_nasheen,
        handlers::list_events, handlers::get_event,
        handlers::list_publications, handlers::get_publication,
        handlers::create_publication, handlers::update_publication,
        handlers::delete_publication,
        handlers::list_gallery_collections, handlers::get_gallery_collection,
        handlers::create_gallery_collection, handlers::update_gallery_collection,
        handlers::upload_gallery_image, handlers::delete_gallery_collection,
        handlers::list_photo_collections, handlers::get_photo_collection,
        handlers::create_photo_collection, handlers::update_photo_collection,
        handlers::delete_photo_collection, handlers::list_photos, handlers::get_photo,
        handlers::create_photo, handlers::update_photo, handlers::delete_photo,
        handlers::list_audios, handlers::create_audio,
        handlers::list_videos, handlers::create_video,
        handlers::send_contact_message,
    ),
    components(
        schemas(
            models::Bilingual, models::AboutSectionResponse, models::AboutSubsection,
            models::CurrentNasheenResponse, models::PreviousNasheen, models::EventResponse,
            models::PublicationResponse, models::PublicationForm, models::PublicationUpdateForm,
            models::GalleryCollectionResponse, models::ImageResponse, models::ImageForm,
            models::CreateCollectionRequest, models::PhotoCollectionResponse,
            models::CreatePhotoCollectionRequest, models::UpdateCollectionRequest,
            models::PhotoForm, models::PhotoUpdateForm,
            models::AudioResponse, models::AudioForm, models::Video, models::CreateVideoRequest,
            models::ContactMessageRequest,
        )
    ),
    tags(
        (name = "khanqah", description = "Khanqah CMS content API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, immutable container for every service a handler or middleware may need.
/// Cloned per request; the heavy parts sit behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
    pub media: Arc<MediaGatekeeper>,
    pub cache: Arc<CachePolicy>,
    pub security: Arc<SecurityHeaders>,
    pub throttle: Arc<Throttle>,
}

impl AppState {
    /// new
    ///
    /// Builds the state around the given persistence and storage backends. The media root
    /// from the configuration is created if missing and canonicalized once here.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> io::Result<Self> {
        let media = MediaGatekeeper::new(&config.media_root)?;
        let security = SecurityHeaders::from_config(&config);
        let throttle = Throttle::from_config(&config.throttle);
        Ok(Self {
            repo,
            storage,
            media: Arc::new(media),
            cache: Arc::new(CachePolicy::default()),
            security: Arc::new(security),
            throttle: Arc::new(throttle),
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Arc<MediaGatekeeper> {
    fn from_ref(app_state: &AppState) -> Arc<MediaGatekeeper> {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for Arc<CachePolicy> {
    fn from_ref(app_state: &AppState) -> Arc<CachePolicy> {
        app_state.cache.clone()
    }
}

impl FromRef<AppState> for Arc<SecurityHeaders> {
    fn from_ref(app_state: &AppState) -> Arc<SecurityHeaders> {
        app_state.security.clone()
    }
}

impl FromRef<AppState> for Arc<Throttle> {
    fn from_ref(app_state: &AppState) -> Arc<Throttle> {
        app_state.throttle.clone()
    }
}

/// create_router
///
/// Assembles the documented routes and hands them to [`apply_middleware`].
pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    let routes = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(api::api_routes(max_upload_bytes));

    apply_middleware(routes, state)
}

/// apply_middleware
///
/// Adds the fallbacks and the middleware stack to `routes` and binds the state.
///
/// Layer order, outermost first: CORS, request id, tracing, request id propagation,
/// security headers, cache policy, throttling, panic capture. Envelopes produced for panics,
/// 404, 405 and 429 therefore still carry the security headers.
pub fn apply_middleware(routes: Router<AppState>, state: AppState) -> Router {
    let cors = cors::cors_layer(&state.config);
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = routes
        .fallback(response::not_found_fallback)
        .method_not_allowed_fallback(response::method_not_allowed_fallback)
        .layer(CatchPanicLayer::custom(response::handle_panic))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            throttle::throttle_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            cache::cache_control_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers::security_headers_middleware,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`, carrying the generated `x-request-id` so every log line of a
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

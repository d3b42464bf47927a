use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::AppConfig;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// cors_layer
///
/// Cross-origin policy for the frontend. Only the configured origins are echoed back unless
/// `cors_allow_all` is set. Origins that are not valid header values are skipped with a
/// warning.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = if config.cors_allow_all {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed_origins(&config.cors_allowed_origins))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(PREFLIGHT_MAX_AGE)
}

fn allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};

use crate::{auth::AuthUser, response::ApiError};

/// CacheHeaders
///
/// Headers the cache policy asks to set on a response. `pragma` and `expires` are only
/// present for the no-store directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeaders {
    pub cache_control: String,
    pub pragma: Option<&'static str>,
    pub expires: Option<&'static str>,
}

impl CacheHeaders {
    fn no_store() -> Self {
        Self {
            cache_control: "no-cache, no-store, must-revalidate".to_string(),
            pragma: Some("no-cache"),
            expires: Some("0"),
        }
    }

    fn control(value: String) -> Self {
        Self {
            cache_control: value,
            pragma: None,
            expires: None,
        }
    }
}

/// CachePolicy
///
/// Path-prefix table deciding how long clients and proxies may keep a response.
/// Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// `(prefix, max-age seconds)`. The longest matching prefix wins.
    pub durations: Vec<(String, u64)>,
    /// Prefixes that must never be stored.
    pub no_cache: Vec<String>,
    /// Max-age for `/api/` paths with no table entry.
    pub api_default: u64,
    /// Max-age for `/api/` responses to authenticated requests.
    pub authenticated_max_age: u64,
}

/// Durations of one hour or more are marked `public`.
const PUBLIC_THRESHOLD: u64 = 3600;

impl Default for CachePolicy {
    fn default() -> Self {
        let durations = [
            ("/api/about/", 3600),
            ("/api/publications/", 3600),
            ("/api/photos/collections/", 3600),
            ("/api/gallery/", 3600),
            ("/media/", 86_400),
            ("/admin/", 0),
            ("/swagger-ui/", 3600),
            ("/api-docs/", 3600),
        ];
        let no_cache = [
            "/admin/",
            "/contact/send-message/",
            "/api/token/",
            "/api/token/refresh/",
        ];

        Self {
            durations: durations
                .into_iter()
                .map(|(prefix, secs)| (prefix.to_string(), secs))
                .collect(),
            no_cache: no_cache.into_iter().map(str::to_string).collect(),
            api_default: 300,
            authenticated_max_age: 60,
        }
    }
}

impl CachePolicy {
    /// headers_for
    ///
    /// Decides the cache headers for a response. Only `200` and `304` are ever decorated;
    /// `None` leaves the response untouched.
    ///
    /// Precedence: authenticated API responses get a short private lifetime, then the
    /// no-cache set, then the longest table prefix, then the `/api/` default.
    pub fn headers_for(
        &self,
        path: &str,
        authenticated: bool,
        status: StatusCode,
    ) -> Option<CacheHeaders> {
        if status != StatusCode::OK && status != StatusCode::NOT_MODIFIED {
            return None;
        }

        let is_api = path.starts_with("/api/");
        let never_store = self.no_cache.iter().any(|prefix| path.starts_with(prefix.as_str()));

        if authenticated && is_api && !never_store {
            return Some(CacheHeaders::control(format!(
                "private, max-age={}",
                self.authenticated_max_age
            )));
        }

        if never_store {
            return Some(CacheHeaders::no_store());
        }

        let max_age = self
            .durations
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, secs)| *secs)
            .or(is_api.then_some(self.api_default))?;

        let value = match max_age {
            0 => "no-cache, must-revalidate".to_string(),
            secs if secs >= PUBLIC_THRESHOLD => format!("public, max-age={secs}, must-revalidate"),
            secs => format!("private, max-age={secs}, must-revalidate"),
        };
        Some(CacheHeaders::control(value))
    }
}

/// cache_control_middleware
///
/// Applies [`CachePolicy::headers_for`] to every response. A request counts as authenticated
/// when its credentials satisfy the `AuthUser` extractor.
pub async fn cache_control_middleware(
    State(policy): State<Arc<CachePolicy>>,
    user: Result<AuthUser, ApiError>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    let Some(headers) = policy.headers_for(&path, user.is_ok(), response.status()) else {
        return response;
    };

    let map = response.headers_mut();
    match HeaderValue::from_str(&headers.cache_control) {
        Ok(value) => {
            map.insert(header::CACHE_CONTROL, value);
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid Cache-Control value");
            return response;
        }
    }
    if let Some(pragma) = headers.pragma {
        map.insert(header::PRAGMA, HeaderValue::from_static(pragma));
    }
    if let Some(expires) = headers.expires {
        map.insert(header::EXPIRES, HeaderValue::from_static(expires));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(path: &str, authenticated: bool) -> Option<String> {
        CachePolicy::default()
            .headers_for(path, authenticated, StatusCode::OK)
            .map(|h| h.cache_control)
    }

    #[test]
    fn long_lived_content_is_public() {
        assert_eq!(
            control("/api/about/sections/", false).as_deref(),
            Some("public, max-age=3600, must-revalidate")
        );
        assert_eq!(
            control("/media/publications/book.pdf", false).as_deref(),
            Some("public, max-age=86400, must-revalidate")
        );
    }

    #[test]
    fn other_api_paths_get_the_short_default() {
        assert_eq!(
            control("/api/events/", false).as_deref(),
            Some("private, max-age=300, must-revalidate")
        );
    }

    #[test]
    fn no_cache_set_forbids_storage() {
        let headers = CachePolicy::default()
            .headers_for("/contact/send-message/", false, StatusCode::OK)
            .unwrap();
        assert_eq!(headers.cache_control, "no-cache, no-store, must-revalidate");
        assert_eq!(headers.pragma, Some("no-cache"));
        assert_eq!(headers.expires, Some("0"));

        assert_eq!(
            control("/admin/dashboard/", false).as_deref(),
            Some("no-cache, no-store, must-revalidate")
        );
    }

    #[test]
    fn authenticated_api_requests_are_private() {
        assert_eq!(
            control("/api/publications/publications/", true).as_deref(),
            Some("private, max-age=60")
        );
        assert_eq!(
            control("/api/token/refresh/", true).as_deref(),
            Some("no-cache, no-store, must-revalidate")
        );
        assert_eq!(
            control("/media/x.png", true).as_deref(),
            Some("public, max-age=86400, must-revalidate")
        );
    }

    #[test]
    fn only_ok_and_not_modified_are_decorated() {
        let policy = CachePolicy::default();
        assert!(policy.headers_for("/api/about/", false, StatusCode::NOT_MODIFIED).is_some());
        for status in [StatusCode::CREATED, StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR] {
            assert!(policy.headers_for("/api/about/", false, status).is_none());
        }
    }

    #[test]
    fn unmatched_non_api_paths_are_untouched() {
        assert_eq!(control("/health", false), None);
    }

    #[test]
    fn longest_prefix_wins_and_zero_means_revalidate() {
        let policy = CachePolicy {
            durations: vec![("/api/".into(), 600), ("/api/live/".into(), 0)],
            no_cache: vec![],
            api_default: 300,
            authenticated_max_age: 60,
        };
        let value = |path| policy.headers_for(path, false, StatusCode::OK).unwrap().cache_control;
        assert_eq!(value("/api/live/feed"), "no-cache, must-revalidate");
        assert_eq!(value("/api/other"), "private, max-age=600, must-revalidate");
    }
}

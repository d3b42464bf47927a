use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::config::{AppConfig, Env};

const PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=(), payment=(), usb=()";

/// SecurityHeaders
///
/// Header values precomputed from the configuration at startup.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    referrer_policy: Option<HeaderValue>,
    hsts: Option<HeaderValue>,
    frame_options: Option<HeaderValue>,
    content_security_policy: Option<HeaderValue>,
}

impl SecurityHeaders {
    pub fn from_config(config: &AppConfig) -> Self {
        let hsts = (config.env == Env::Production).then(|| {
            format!(
                "max-age={}; includeSubDomains; preload",
                config.hsts_seconds
            )
        });

        let csp: Vec<String> = config
            .csp
            .directives()
            .into_iter()
            .filter_map(|(directive, value)| value.map(|v| format!("{directive} {v}")))
            .collect();

        Self {
            referrer_policy: header_value(&config.referrer_policy),
            hsts: hsts.as_deref().and_then(header_value),
            frame_options: config.x_frame_options.as_deref().and_then(header_value),
            content_security_policy: (!csp.is_empty())
                .then(|| csp.join("; "))
                .as_deref()
                .and_then(header_value),
        }
    }

    /// apply
    ///
    /// Writes the headers for a response to `path`. Media is exempt from the CSP and from
    /// `X-Frame-Options` so that it can be embedded by the frontend.
    pub fn apply(&self, path: &str, headers: &mut HeaderMap) {
        headers.insert(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        );
        headers.insert(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static(PERMISSIONS_POLICY),
        );
        if let Some(value) = &self.referrer_policy {
            headers.insert(HeaderName::from_static("referrer-policy"), value.clone());
        }
        if let Some(value) = &self.hsts {
            headers.insert(
                HeaderName::from_static("strict-transport-security"),
                value.clone(),
            );
        }
        if path.starts_with("/media/") {
            return;
        }
        if let Some(value) = &self.frame_options {
            headers.insert(HeaderName::from_static("x-frame-options"), value.clone());
        }
        if let Some(value) = &self.content_security_policy {
            headers.insert(
                HeaderName::from_static("content-security-policy"),
                value.clone(),
            );
        }
    }
}

fn header_value(value: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(value) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(value, error = %e, "Ignoring invalid security header value");
            None
        }
    }
}

/// security_headers_middleware
///
/// Decorates every response with the configured security headers.
pub async fn security_headers_middleware(
    State(headers): State<Arc<SecurityHeaders>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;
    headers.apply(&path, response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CspConfig;

    #[test]
    fn local_headers_skip_hsts() {
        let headers = SecurityHeaders::from_config(&AppConfig::default());
        let mut map = HeaderMap::new();
        headers.apply("/api/events/", &mut map);

        assert_eq!(map["x-content-type-options"], "nosniff");
        assert_eq!(map["x-xss-protection"], "1; mode=block");
        assert_eq!(map["referrer-policy"], "strict-origin-when-cross-origin");
        assert_eq!(map["permissions-policy"], PERMISSIONS_POLICY);
        assert_eq!(map["x-frame-options"], "SAMEORIGIN");
        assert_eq!(
            map["content-security-policy"],
            "default-src 'self'; script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; \
             font-src 'self' data:; connect-src 'self'; \
             frame-src 'self' https://www.youtube.com https://www.google.com; \
             frame-ancestors 'none'"
        );
        assert!(map.get("strict-transport-security").is_none());
    }

    #[test]
    fn production_adds_hsts() {
        let config = AppConfig {
            env: Env::Production,
            hsts_seconds: 600,
            ..AppConfig::default()
        };
        let mut map = HeaderMap::new();
        SecurityHeaders::from_config(&config).apply("/", &mut map);
        assert_eq!(
            map["strict-transport-security"],
            "max-age=600; includeSubDomains; preload"
        );
    }

    #[test]
    fn media_is_exempt_from_csp_and_frame_options() {
        let headers = SecurityHeaders::from_config(&AppConfig::default());
        let mut map = HeaderMap::new();
        headers.apply("/media/gallery/a.png", &mut map);
        assert!(map.get("content-security-policy").is_none());
        assert!(map.get("x-frame-options").is_none());
        assert_eq!(map["x-content-type-options"], "nosniff");
    }

    #[test]
    fn unset_directives_are_left_out() {
        let config = AppConfig {
            csp: CspConfig {
                script_src: None,
                style_src: None,
                img_src: None,
                font_src: None,
                connect_src: None,
                frame_src: None,
                ..CspConfig::default()
            },
            x_frame_options: Some("DENY".into()),
            ..AppConfig::default()
        };
        let mut map = HeaderMap::new();
        SecurityHeaders::from_config(&config).apply("/api/events/", &mut map);
        assert_eq!(
            map["content-security-policy"],
            "default-src 'self'; frame-ancestors 'none'"
        );
        assert_eq!(map["x-frame-options"], "DENY");
    }

    #[test]
    fn csp_omitted_when_unconfigured() {
        let config = AppConfig {
            csp: CspConfig {
                default_src: None,
                script_src: None,
                style_src: None,
                img_src: None,
                font_src: None,
                connect_src: None,
                frame_src: None,
                frame_ancestors: None,
            },
            x_frame_options: None,
            ..AppConfig::default()
        };
        let mut map = HeaderMap::new();
        SecurityHeaders::from_config(&config).apply("/api/about/", &mut map);
        assert!(map.get("content-security-policy").is_none());
        assert!(map.get("x-frame-options").is_none());
    }
}

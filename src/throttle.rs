use std::{num::NonZeroU32, sync::Arc};

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
};

use crate::{auth::AuthUser, config::ThrottleConfig, media::ClientAddr, response::ApiError};

pub const CONTACT_PATH: &str = "/contact/send-message/";

/// Keys kept per limiter before idle entries are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Scope
///
/// Which limiter a request is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Anonymous,
    User,
    Contact,
}

/// scope_for
///
/// Contact submissions have their own per-address budget and are not counted against the
/// general one. Everything else under `/api/` is counted per user when authenticated and
/// per address otherwise. Media, health and docs are never throttled.
pub fn scope_for(method: &Method, path: &str, authenticated: bool) -> Option<Scope> {
    if path == CONTACT_PATH {
        return (*method == Method::POST).then_some(Scope::Contact);
    }
    if !path.starts_with("/api/") {
        return None;
    }
    Some(if authenticated {
        Scope::User
    } else {
        Scope::Anonymous
    })
}

/// Throttle
///
/// Hourly request budgets backed by `governor` keyed limiters. A zero rate disables the
/// matching limiter.
pub struct Throttle {
    anonymous: Option<KeyedLimiter>,
    user: Option<KeyedLimiter>,
    contact: Option<KeyedLimiter>,
    clock: DefaultClock,
}

fn hourly(per_hour: u32) -> Option<KeyedLimiter> {
    NonZeroU32::new(per_hour).map(|n| RateLimiter::keyed(Quota::per_hour(n)))
}

impl Throttle {
    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self {
            anonymous: hourly(config.anon_per_hour),
            user: hourly(config.user_per_hour),
            contact: hourly(config.contact_per_hour),
            clock: DefaultClock::default(),
        }
    }

    /// check
    ///
    /// Counts one request for `key` in `scope`.
    ///
    /// # Errors
    /// [`ApiError::TooManyRequests`] with the whole seconds until the next request is allowed.
    pub fn check(&self, scope: Scope, key: &str) -> Result<(), ApiError> {
        let limiter = match scope {
            Scope::Anonymous => &self.anonymous,
            Scope::User => &self.user,
            Scope::Contact => &self.contact,
        };
        let Some(limiter) = limiter else {
            return Ok(());
        };

        if limiter.len() > PRUNE_THRESHOLD {
            limiter.retain_recent();
        }

        limiter.check_key(&key.to_string()).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            let mut retry_after = wait.as_secs();
            if wait.subsec_nanos() > 0 || retry_after == 0 {
                retry_after += 1;
            }
            ApiError::TooManyRequests { retry_after }
        })
    }
}

/// throttle_middleware
///
/// Rejects requests over their hourly budget with the 429 envelope and a `Retry-After`
/// header.
pub async fn throttle_middleware(
    State(throttle): State<Arc<Throttle>>,
    user: Result<AuthUser, ApiError>,
    ClientAddr(client): ClientAddr,
    request: Request,
    next: Next,
) -> Response {
    let user = user.ok();
    let Some(scope) = scope_for(request.method(), request.uri().path(), user.is_some()) else {
        return next.run(request).await;
    };

    let key = match (&scope, &user) {
        (Scope::User, Some(user)) => user.id.to_string(),
        _ => client,
    };

    match throttle.check(scope, &key) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(scope = ?scope, key = %key, path = %request.uri().path(), "Request throttled");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(anon: u32, user: u32, contact: u32) -> Throttle {
        Throttle::from_config(&ThrottleConfig {
            anon_per_hour: anon,
            user_per_hour: user,
            contact_per_hour: contact,
        })
    }

    #[test]
    fn scopes_by_path_and_identity() {
        assert_eq!(
            scope_for(&Method::POST, CONTACT_PATH, false),
            Some(Scope::Contact)
        );
        assert_eq!(scope_for(&Method::POST, CONTACT_PATH, true), Some(Scope::Contact));
        assert_eq!(scope_for(&Method::OPTIONS, CONTACT_PATH, false), None);
        assert_eq!(scope_for(&Method::GET, "/api/events/", false), Some(Scope::Anonymous));
        assert_eq!(scope_for(&Method::GET, "/api/events/", true), Some(Scope::User));
        assert_eq!(scope_for(&Method::GET, "/media/a.pdf", false), None);
        assert_eq!(scope_for(&Method::GET, "/health", false), None);
    }

    #[test]
    fn budget_is_per_key() {
        let throttle = throttle(0, 0, 2);
        assert!(throttle.check(Scope::Contact, "10.0.0.1").is_ok());
        assert!(throttle.check(Scope::Contact, "10.0.0.1").is_ok());
        match throttle.check(Scope::Contact, "10.0.0.1") {
            Err(ApiError::TooManyRequests { retry_after }) => {
                assert!(retry_after > 0 && retry_after <= 1800, "{retry_after}");
            }
            other => panic!("expected throttling, got {other:?}"),
        }
        assert!(throttle.check(Scope::Contact, "10.0.0.2").is_ok());
    }

    #[test]
    fn zero_rate_disables_a_limiter() {
        let throttle = throttle(0, 1, 1);
        for _ in 0..50 {
            assert!(throttle.check(Scope::Anonymous, "10.0.0.1").is_ok());
        }
        assert!(throttle.check(Scope::User, "u").is_ok());
        assert!(throttle.check(Scope::User, "u").is_err());
    }
}

//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Steady-state login attempts per second per IP.
const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();

/// Login attempts allowed in a burst per IP.
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

#[derive(Clone)]
pub struct RateLimitConfig {
    pub login: Arc<IpLimiter>,
    /// Header carrying the client IP when running behind a proxy.
    pub ip_header: Option<String>,
}

impl RateLimitConfig {
    pub fn new(ip_header: Option<String>) -> Self {
        Self::with_quota(
            Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            ip_header,
        )
    }

    pub fn with_quota(quota: Quota, ip_header: Option<String>) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(quota)),
            ip_header,
        }
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = extract_client_ip(&request, config.ip_header.as_deref()) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}

/// HTTP-level rate limiting
///
/// Coarse global quotas in front of every route. The per-account login and
/// OTP throttles live in the abuse-guard policy, not here.
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute across all unauthenticated traffic
    pub unauthenticated_rpm: u32,
    /// Requests per minute across all authenticated traffic
    pub authenticated_rpm: u32,
    /// Burst size
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            unauthenticated_rpm: 600,
            authenticated_rpm: 3000,
            burst_size: 50,
        }
    }
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    authenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    unauthenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let auth_quota = Quota::per_minute(
            NonZeroU32::new(config.authenticated_rpm).unwrap_or(NonZeroU32::new(3000).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::new(50).unwrap()));

        let unauth_quota = Quota::per_minute(
            NonZeroU32::new(config.unauthenticated_rpm).unwrap_or(NonZeroU32::new(600).unwrap()),
        )
        .allow_burst(
            NonZeroU32::new(config.burst_size / 5).unwrap_or(NonZeroU32::new(10).unwrap()),
        );

        Self {
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
        }
    }

    /// Check rate limit for authenticated traffic
    pub fn check_authenticated(&self) -> ApiResult<()> {
        match self.authenticated.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(ApiError::RateLimited {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }

    /// Check rate limit for unauthenticated traffic
    pub fn check_unauthenticated(&self) -> ApiResult<()> {
        match self.unauthenticated.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(ApiError::RateLimited {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !ctx.config.rate_limit.enabled {
        return Ok(next.run(request).await);
    }

    let has_auth_header = request.headers().get("authorization").is_some();

    let rate_limit_result = if has_auth_header {
        ctx.rate_limiter.check_authenticated()
    } else {
        ctx.rate_limiter.check_unauthenticated()
    };

    match rate_limit_result {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => Err(StatusCode::TOO_MANY_REQUESTS),
    }
}

//! Global request rate limiting.

use axum::{extract::Request, middleware::Next, response::Response};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;

/// Shared rate limiter type.
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a rate limiter allowing `requests_per_minute` across all clients.
///
/// A quota of zero is raised to one request per minute.
pub fn create_rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Rejects the request with 429 once the quota is spent.
pub async fn rate_limit(
    limiter: SharedRateLimiter,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if limiter.check().is_err() {
        debug!(uri = %request.uri(), "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded);
    }
    Ok(next.run(request).await)
}

use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Allow `requests_per_minute` requests per IP, refilled evenly over the minute.
pub fn create_ip_rate_limiter(requests_per_minute: u32) -> IpRateLimiter {
    let per_minute = NonZeroU32::new(requests_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::dashmap(Quota::per_minute(per_minute)))
}

/// Resolve the caller IP: first `x-forwarded-for` hop, else the socket peer.
fn client_ip(request: &Request) -> Option<IpAddr> {
    let forwarded_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded_ip.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ip) = client_ip(&request) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    match limiter.check_key(&ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(negative) => {
            let wait_time = negative.wait_time_from(DefaultClock::default().now());
            tracing::warn!(ip = %ip, retry_after = wait_time.as_secs(), "Rate limit exceeded");
            Err(AppError::TooManyRequests(
                "Too many requests. Please try again later.".to_string(),
                Some(wait_time.as_secs().max(1)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn request_from(ip: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_after_quota_per_ip() {
        let limiter = create_ip_rate_limiter(2);
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, ip_rate_limit_middleware));

        for _ in 0..2 {
            let res = app.clone().oneshot(request_from("10.0.0.1")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app.clone().oneshot(request_from("10.0.0.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key("retry-after"));

        let other = app.oneshot(request_from("10.0.0.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }
}

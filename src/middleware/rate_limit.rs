use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use http::{header, HeaderValue};

use crate::error::AppError;

/// Only the JSON API is limited; uploads and health checks are not.
const LIMITED_PREFIX: &str = "/api/";

pub type IpRateLimiter = DefaultKeyedRateLimiter<IpAddr>;

/// `requests` per `window_secs` for each client IP, all of it usable as a burst.
/// None when either number is zero.
pub fn ip_rate_limiter(requests: u32, window_secs: u64) -> Option<IpRateLimiter> {
    let burst = NonZeroU32::new(requests)?;
    let quota = Quota::with_period(Duration::from_secs(window_secs) / requests)?.allow_burst(burst);
    Some(RateLimiter::keyed(quota))
}

/// Peer address set by `into_make_service_with_connect_info`. Forwarded-for
/// headers are client-controlled and ignored.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn enforce_rate_limit(
    State(limiter): State<Arc<IpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if !request.uri().path().starts_with(LIMITED_PREFIX) {
        return next.run(request).await;
    }

    let ip = client_ip(&request);
    match limiter.check_key(&ip) {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            tracing::warn!("Rate limit exceeded for {}, retry in {:?}", ip, wait);
            let mut response = AppError::RateLimited.into_response();
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(wait.as_secs().max(1)),
            );
            response
        }
    }
}

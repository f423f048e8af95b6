//! Token-bucket rate limiting.
//!
//! [`RateLimiter`] is keyed by anything hashable. The router uses one keyed
//! by client IP for all requests; the auth gateway uses a much stricter one
//! keyed by email address so passcodes cannot be used to spam an inbox.

use std::collections::HashMap;
use std::hash::Hash;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ServerError;

/// Sustained refill rate plus the burst a fresh key starts with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    per_second: f64,
    burst: f64,
}

impl Quota {
    pub fn per_second(n: f64, burst: u32) -> Self {
        Self {
            per_second: n,
            burst: f64::from(burst),
        }
    }

    pub fn per_minute(n: f64, burst: u32) -> Self {
        Self::per_second(n / 60.0, burst)
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    touched: Instant,
}

impl Bucket {
    /// Refill for the time elapsed since the last touch, then take one
    /// token. On refusal, returns how long until a token is available.
    fn take(&mut self, quota: Quota, now: Instant) -> Result<(), Duration> {
        let idle = now.saturating_duration_since(self.touched).as_secs_f64();
        self.touched = now;
        self.tokens = (self.tokens + idle * quota.per_second).min(quota.burst);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64(
                (1.0 - self.tokens) / quota.per_second,
            ))
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter<K = IpAddr> {
    buckets: Arc<Mutex<HashMap<K, Bucket>>>,
    quota: Quota,
}

impl<K: Eq + Hash> RateLimiter<K> {
    pub fn new(quota: Quota) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            quota,
        }
    }

    /// Spend one token for `key`, or report how long to wait.
    pub async fn check(&self, key: K) -> Result<(), Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(key)
            .or_insert_with(|| Bucket {
                tokens: self.quota.burst,
                touched: now,
            })
            .take(self.quota, now)
    }

    /// Forget keys untouched for longer than `max_idle`.
    pub async fn purge_stale(&self, max_idle: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.touched) < max_idle);
        let purged = before - buckets.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = buckets.len(), "rate limiter buckets purged");
        }
    }
}

impl Default for RateLimiter<IpAddr> {
    /// 10 req/s sustained, burst of 30.
    fn default() -> Self {
        Self::new(Quota::per_second(10.0, 30))
    }
}

/// Per-email passcode throttle: three sends, then one more per minute.
pub fn otp_throttle() -> RateLimiter<String> {
    RateLimiter::new(Quota::per_minute(1.0, 3))
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ServerError> {
    if let Some(ip) = client_ip(&req) {
        if let Err(wait) = limiter.check(ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            return Err(ServerError::RateLimited(format!(
                "retry in {} ms",
                wait.as_millis().max(1)
            )));
        }
    }

    Ok(next.run(req).await)
}

/// Peer address when the server was started with connect info, otherwise
/// the first hop of `X-Forwarded-For` or `X-Real-IP`.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }

    ["x-forwarded-for", "x-real-ip"].iter().find_map(|name| {
        req.headers()
            .get(*name)?
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse()
            .ok()
    })
}

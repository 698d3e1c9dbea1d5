//! Per-IP fixed-window rate limiting as an interceptor.
//!
//! Applies a per-minute request cap keyed on the client IP, extracted from
//! `X-Forwarded-For` → `X-Real-IP` → `"unknown"` in that order. Each endpoint
//! that carries a [`RateLimit`] gets its own budget; share one limiter across
//! endpoints by cloning it (clones share their buckets).
//!
//! When the limit is exceeded the interceptor commits HTTP 429 with a
//! `Retry-After` header, which ends the pipeline before the handler runs.
//!
//! A limit of `0` disables rate limiting entirely.
//!
//! Proxy headers are taken at face value, so the key is only meaningful
//! behind a reverse proxy that overwrites them. Buckets whose window has
//! passed are swept once per window, and at most [`MAX_TRACKED`] clients get
//! their own bucket; beyond that, new clients share one overflow bucket.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use spectree_wire::{ErrorBody, ErrorEnvelope};

use super::Interceptor;
use crate::{error::BoxError, exchange::Exchange};

/// `msg` of the 429 envelope.
pub const RATE_LIMITED_MSG: &str = "Rate limit exceeded";

/// Most clients tracked with a bucket of their own.
pub const MAX_TRACKED: usize = 10_000;

const OVERFLOW_KEY: &str = "\u{0}overflow";

/// Fixed-window per-IP rate limiter. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct RateLimit {
    state: Arc<RwLock<Buckets>>,
    max_per_window: u32,
    window: Duration,
}

struct Buckets {
    by_client: HashMap<String, Bucket>,
    last_sweep: Instant,
}

struct Bucket {
    count: u32,
    window_start: Instant,
}

impl RateLimit {
    /// Create a new rate limiter with the given per-minute limit.
    ///
    /// Pass `0` to disable rate limiting.
    pub fn per_minute(max_per_minute: u32) -> Self {
        Self::new(max_per_minute, Duration::from_secs(60))
    }

    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(Buckets {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            max_per_window,
            window,
        }
    }

    /// Check whether a request from `ip_key` is within the limit.
    ///
    /// Returns `Ok(())` if the request is allowed, or `Err(retry_after_secs)`
    /// if the limit is exceeded.
    pub fn check(&self, ip_key: &str) -> Result<(), u64> {
        if self.max_per_window == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());

        if now.duration_since(state.last_sweep) >= self.window {
            let window = self.window;
            state
                .by_client
                .retain(|_, b| now.duration_since(b.window_start) < window);
            state.last_sweep = now;
        }

        let key = if state.by_client.len() >= MAX_TRACKED
            && !state.by_client.contains_key(ip_key)
        {
            OVERFLOW_KEY
        } else {
            ip_key
        };

        let bucket = state.by_client.entry(key.to_string()).or_insert_with(|| Bucket {
            count: 0,
            window_start: now,
        });

        let elapsed = now.duration_since(bucket.window_start);

        if elapsed >= self.window {
            bucket.count = 1;
            bucket.window_start = now;
            return Ok(());
        }

        if bucket.count >= self.max_per_window {
            let retry_after = (self.window.saturating_sub(elapsed)).as_secs().max(1);
            return Err(retry_after);
        }

        bucket.count += 1;
        Ok(())
    }

    /// Number of buckets currently held.
    pub fn tracked(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        state.by_client.len()
    }
}

#[async_trait]
impl Interceptor for RateLimit {
    async fn intercept(&self, exchange: &mut Exchange) -> Result<(), BoxError> {
        let ip_key = client_ip(&exchange.request().headers);

        if let Err(retry_after) = self.check(&ip_key) {
            tracing::debug!(ip = %ip_key, retry_after, "rate limit exceeded");
            let body = ErrorEnvelope::from(ErrorBody::custom(RATE_LIMITED_MSG, None));
            let mut resp = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
                resp.headers_mut().insert("retry-after", v);
            }
            exchange.commit(resp);
        }
        Ok(())
    }
}

/// Extract the client IP from common proxy headers, falling back to `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    // X-Forwarded-For: client, proxy1, proxy2; the leftmost entry is the client.
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
    {
        return ip.to_string();
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::Request};

    #[test]
    fn zero_limit_always_passes() {
        let rl = RateLimit::per_minute(0);
        for _ in 0..1000 {
            assert!(rl.check("1.2.3.4").is_ok());
        }
    }

    #[test]
    fn exceeding_limit_returns_retry_after() {
        let rl = RateLimit::per_minute(3);
        for _ in 0..3 {
            assert!(rl.check("1.2.3.4").is_ok());
        }
        let err = rl.check("1.2.3.4").unwrap_err();
        assert!(err > 0 && err <= 60, "retry-after should be 1–60s, got {err}");
    }

    #[test]
    fn clones_share_buckets() {
        let rl = RateLimit::per_minute(1);
        let other = rl.clone();
        assert!(rl.check("1.1.1.1").is_ok());
        assert!(other.check("1.1.1.1").is_err());
        assert!(other.check("2.2.2.2").is_ok()); // different IP, own bucket
    }

    #[test]
    fn expired_buckets_are_evicted() {
        let rl = RateLimit::new(1, Duration::from_millis(100));
        assert!(rl.check("1.1.1.1").is_ok());
        assert!(rl.check("2.2.2.2").is_ok());
        assert_eq!(rl.tracked(), 2);

        std::thread::sleep(Duration::from_millis(150));
        assert!(rl.check("3.3.3.3").is_ok());
        assert_eq!(rl.tracked(), 1);
    }

    #[test]
    fn spoofed_clients_share_the_overflow_bucket() {
        let rl = RateLimit::per_minute(1);
        let allowed = (0..MAX_TRACKED + 100)
            .filter(|i| rl.check(&format!("10.0.{}.{}", i / 256, i % 256)).is_ok())
            .count();
        assert_eq!(allowed, MAX_TRACKED + 1);
        assert_eq!(rl.tracked(), MAX_TRACKED + 1);
    }

    #[test]
    fn ip_extraction_order() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_ip(&headers), "9.9.9.9");
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 1.2.3.4, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "1.2.3.4");
    }

    #[tokio::test]
    async fn commits_429_once_exhausted() {
        let rl = RateLimit::per_minute(1);
        let request = || {
            Request::builder()
                .uri("/x")
                .header("x-real-ip", "5.5.5.5")
                .body(Body::empty())
                .unwrap()
        };

        let mut first = Exchange::from_request(request()).await;
        rl.intercept(&mut first).await.unwrap();
        assert!(!first.is_committed());

        let mut second = Exchange::from_request(request()).await;
        rl.intercept(&mut second).await.unwrap();
        let resp = second.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("retry-after"));
    }
}

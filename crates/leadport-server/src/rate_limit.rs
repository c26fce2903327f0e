//! In-memory sliding-window rate limiting, keyed by client IP and route
//! bucket. State is per process and lost on restart.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Tracked clients above which idle entries are swept on insert.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Auth,
    Checkout,
    Default,
}

impl Bucket {
    /// `None` exempts the path. Stripe delivers webhooks from a shared
    /// pool of addresses and each delivery is signature-checked, so a
    /// per-IP limit would only drop paid events.
    pub fn for_path(path: &str) -> Option<Self> {
        match path {
            "/api/stripe/webhook" => None,
            "/api/auth/login" | "/api/auth/register" => Some(Bucket::Auth),
            "/api/stripe/checkout" => Some(Bucket::Checkout),
            _ => Some(Bucket::Default),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Limit {
    pub max_requests: usize,
    pub window: Duration,
}

impl Limit {
    pub const fn per_minute(max_requests: usize) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth: Limit,
    pub checkout: Limit,
    pub default: Limit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: Limit::per_minute(10),
            checkout: Limit::per_minute(20),
            default: Limit::per_minute(300),
        }
    }
}

impl RateLimitConfig {
    fn limit(&self, bucket: Bucket) -> Limit {
        match bucket {
            Bucket::Auth => self.auth,
            Bucket::Checkout => self.checkout,
            Bucket::Default => self.default,
        }
    }

    fn longest_window(&self) -> Duration {
        self.auth
            .window
            .max(self.checkout.window)
            .max(self.default.window)
    }
}

/// Sliding-window log: one timestamp per admitted request.
pub struct RateLimiter {
    config: RateLimitConfig,
    hits: Mutex<HashMap<(String, Bucket), VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request. On rejection returns how long until
    /// the oldest hit leaves the window.
    pub fn check(&self, client: &str, bucket: Bucket) -> Result<(), Duration> {
        self.check_at(client, bucket, Instant::now())
    }

    fn check_at(&self, client: &str, bucket: Bucket, now: Instant) -> Result<(), Duration> {
        if !self.config.enabled {
            return Ok(());
        }
        let limit = self.config.limit(bucket);

        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        if hits.len() > SWEEP_THRESHOLD {
            let horizon = self.config.longest_window();
            hits.retain(|_, log| log.back().is_some_and(|t| now.duration_since(*t) < horizon));
        }

        let log = hits.entry((client.to_string(), bucket)).or_default();
        while log
            .front()
            .is_some_and(|t| now.duration_since(*t) >= limit.window)
        {
            log.pop_front();
        }

        if log.len() >= limit.max_requests {
            let retry_after = log
                .front()
                .map(|oldest| limit.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(limit.window);
            return Err(retry_after);
        }

        log.push_back(now);
        Ok(())
    }

    /// Drop clients with no hits inside any window.
    pub fn prune(&self) {
        let now = Instant::now();
        let horizon = self.config.longest_window();
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        hits.retain(|_, log| log.back().is_some_and(|t| now.duration_since(*t) < horizon));
    }
}

/// First `X-Forwarded-For` hop, else the peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".into())
}

pub async fn enforce(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(bucket) = Bucket::for_path(req.uri().path()) else {
        return next.run(req).await;
    };
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(req.headers(), peer);

    match state.rate_limiter.check(&client, bucket) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            warn!(client = %client, bucket = ?bucket, path = %req.uri().path(), "Rate limit exceeded");
            ApiError::rate_limited(retry_after).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            auth: Limit::per_minute(max),
            ..Default::default()
        })
    }

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let limiter = limiter(3);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at("1.2.3.4", Bucket::Auth, now).is_ok());
        }
        let retry = limiter.check_at("1.2.3.4", Bucket::Auth, now).unwrap_err();
        assert_eq!(retry, Duration::from_secs(60));
    }

    #[test]
    fn window_slides() {
        let limiter = limiter(2);
        let start = Instant::now();
        limiter.check_at("c", Bucket::Auth, start).unwrap();
        limiter
            .check_at("c", Bucket::Auth, start + Duration::from_secs(30))
            .unwrap();

        let blocked = limiter
            .check_at("c", Bucket::Auth, start + Duration::from_secs(45))
            .unwrap_err();
        assert_eq!(blocked, Duration::from_secs(15));

        // The first hit has left the window; the second has not.
        assert!(
            limiter
                .check_at("c", Bucket::Auth, start + Duration::from_secs(61))
                .is_ok()
        );
        assert!(
            limiter
                .check_at("c", Bucket::Auth, start + Duration::from_secs(62))
                .is_err()
        );
    }

    #[test]
    fn clients_and_buckets_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();
        limiter.check_at("a", Bucket::Auth, now).unwrap();
        assert!(limiter.check_at("b", Bucket::Auth, now).is_ok());
        assert!(limiter.check_at("a", Bucket::Default, now).is_ok());
        assert!(limiter.check_at("a", Bucket::Auth, now).is_err());
    }

    #[test]
    fn disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            auth: Limit::per_minute(0),
            ..Default::default()
        });
        assert!(limiter.check("a", Bucket::Auth).is_ok());
    }

    #[test]
    fn buckets_follow_paths() {
        assert_eq!(Bucket::for_path("/api/auth/login"), Some(Bucket::Auth));
        assert_eq!(Bucket::for_path("/api/stripe/checkout"), Some(Bucket::Checkout));
        assert_eq!(Bucket::for_path("/api/stripe/webhook"), None);
        assert_eq!(Bucket::for_path("/api/leads"), Some(Bucket::Default));
    }

    #[test]
    fn client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_key(&headers, None), "unknown");

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");
    }
}
